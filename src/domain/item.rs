use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Inventory item master record, as the forecast core sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Item code, unique within a tenant
    pub code: String,

    pub name: String,

    /// Category used for reporting breakdowns (e.g. "produce", "dairy")
    pub category: String,

    /// Unit of measure ("kg", "case", "each")
    pub unit: String,

    /// Storage location label
    pub storage_location: String,

    /// Par level from the item master; 0 when none configured
    #[serde(default)]
    pub par_level: f64,

    /// Stock on hand at the time the snapshot was taken
    #[serde(default)]
    pub current_stock: f64,

    /// Vendor lead time; falls back to the engine default when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_time_days: Option<u32>,

    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// One day of reconciled consumption for an item. Missing days are simply
/// absent from the series, never zero-padded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UsagePoint {
    pub date: NaiveDate,
    pub qty: f64,
}

impl UsagePoint {
    pub fn new(date: NaiveDate, qty: f64) -> Self {
        Self { date, qty }
    }
}
