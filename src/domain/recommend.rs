use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// ABC class by cumulative annual consumption value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbcClass {
    A,
    B,
    C,
}

impl AbcClass {
    /// Service-level z-score for the class (99 / 95 / 90 percent).
    pub fn z_score(&self) -> f64 {
        match self {
            AbcClass::A => 2.33,
            AbcClass::B => 1.65,
            AbcClass::C => 1.28,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AbcClass::A => "A",
            AbcClass::B => "B",
            AbcClass::C => "C",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationStatus {
    Pending,
    Accepted,
    Dismissed,
}

/// A service-level replenishment recommendation, produced on demand by
/// the policy engine and persisted in `pending` state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub recommendation_id: Uuid,
    pub item_code: String,
    pub class: AbcClass,
    pub annual_value: Decimal,
    pub recommended_qty: u64,
    pub reorder_point: f64,
    pub safety_stock: f64,
    pub current_stock: f64,
    pub reason: String,
    pub status: RecommendationStatus,
    pub created_at: DateTime<Utc>,
}
