//! Event bus capability. Components receive the bus through their
//! constructors and publish cross-component notifications on it instead
//! of calling each other directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    FeedbackIngested,
    DriftDetected,
    ForecastApproved,
    ForecastRejected,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::FeedbackIngested => "feedback_ingested",
            Topic::DriftDetected => "drift_detected",
            Topic::ForecastApproved => "forecast_approved",
            Topic::ForecastRejected => "forecast_rejected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub topic: Topic,
    pub payload: serde_json::Value,
    pub emitted_at: DateTime<Utc>,
}

/// Non-blocking publish capability.
pub trait EventBus: Send + Sync {
    fn emit(&self, topic: Topic, payload: serde_json::Value);
}

/// In-process bus over a tokio broadcast channel. Emission never blocks;
/// if no subscriber is listening the event is dropped.
pub struct BroadcastBus {
    tx: broadcast::Sender<Event>,
}

impl BroadcastBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventBus for BroadcastBus {
    fn emit(&self, topic: Topic, payload: serde_json::Value) {
        let event = Event {
            topic,
            payload,
            emitted_at: Utc::now(),
        };
        if self.tx.send(event).is_err() {
            debug!(topic = topic.as_str(), "no subscribers for event");
        }
    }
}

/// Bus that drops everything; used in tests that don't observe events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBus;

impl EventBus for NoopBus {
    fn emit(&self, _topic: Topic, _payload: serde_json::Value) {}
}

pub type SharedBus = Arc<dyn EventBus>;
