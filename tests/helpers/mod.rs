//! Shared fixtures for the integration suites.
#![allow(dead_code)]

use chrono::{Duration, NaiveDate, Utc};
use std::sync::Arc;

use inventory_ops::config::Config;
use inventory_ops::domain::{Item, PriceRecord, UsagePoint};
use inventory_ops::events::BroadcastBus;
use inventory_ops::health::{Audit, AuditReport};
use inventory_ops::metrics::NoopMetrics;
use inventory_ops::service::InventoryOps;
use inventory_ops::storage::MemoryStore;
use inventory_ops::{Actor, Role, RoleMatrix};

pub fn owner(id: &str) -> Actor {
    Actor::new(id, Role::Owner)
}

pub fn finance(id: &str) -> Actor {
    Actor::new(id, Role::Finance)
}

pub fn ops(id: &str) -> Actor {
    Actor::new(id, Role::Ops)
}

pub fn readonly(id: &str) -> Actor {
    Actor::new(id, Role::ReadOnly)
}

pub fn item(code: &str) -> Item {
    Item {
        code: code.to_string(),
        name: code.to_string(),
        category: "produce".to_string(),
        unit: "kg".to_string(),
        storage_location: "walk-in".to_string(),
        par_level: 0.0,
        current_stock: 0.0,
        lead_time_days: None,
        active: true,
    }
}

pub fn usd_price(org: &str, sku: &str, price: &str) -> PriceRecord {
    PriceRecord {
        org: org.to_string(),
        sku: sku.to_string(),
        vendor: "acme".to_string(),
        price: price.parse().unwrap(),
        currency: "USD".to_string(),
        effective_from: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
        effective_to: None,
    }
}

/// Seed `days` of flat daily consumption ending today.
pub async fn seed_flat_history(store: &MemoryStore, code: &str, qty: f64, days: u32) {
    let today = Utc::now().date_naive();
    let points: Vec<UsagePoint> = (0..days)
        .map(|i| UsagePoint::new(today - Duration::days(i as i64), qty))
        .collect();
    store.seed_history(code, points).await;
}

/// Audit stub that always reports a healthy system.
pub struct HealthyAudit;

#[async_trait::async_trait]
impl Audit for HealthyAudit {
    async fn run(&self) -> inventory_ops::Result<AuditReport> {
        Ok(AuditReport {
            health_score: 100.0,
            status: "ok".to_string(),
            issues: vec![],
            fixed_mutations: 0,
            stockout_risk_count: 0,
            should_retrain: 0,
        })
    }
}

/// A fully wired service over a fresh in-memory store.
pub fn service_over(store: Arc<MemoryStore>) -> InventoryOps {
    InventoryOps::new(
        store,
        Arc::new(BroadcastBus::default()),
        Arc::new(NoopMetrics),
        Arc::new(RoleMatrix),
        Arc::new(HealthyAudit),
        Config::default(),
    )
}
