use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Where a resolved price came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    PreferredVendor,
    FallbackVendor,
    MissingPrice,
}

/// A vendor price row with its validity window. An open `effective_to`
/// means the price is valid indefinitely.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceRecord {
    pub org: String,
    pub sku: String,
    pub vendor: String,
    pub price: Decimal,
    pub currency: String,
    pub effective_from: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_to: Option<NaiveDate>,
}

impl PriceRecord {
    pub fn is_valid_at(&self, date: NaiveDate) -> bool {
        self.effective_from <= date && self.effective_to.map_or(true, |to| date <= to)
    }
}

/// Resolved price for a sku at a date.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectivePrice {
    pub price: Decimal,
    pub vendor: String,
    pub currency: String,
    pub source: PriceSource,
}

/// A recipe whose cost the resolver prices out ingredient by ingredient.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub name: String,
    pub yield_qty: f64,
    /// Percent, e.g. 5.0 for five percent preparation loss
    pub prep_loss_pct: f64,
    pub ingredients: Vec<RecipeIngredient>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeIngredient {
    pub sku: String,
    pub qty: f64,
}

/// One priced ingredient line in a recipe cost breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngredientCost {
    pub sku: String,
    pub qty: f64,
    pub unit_price: Decimal,
    pub cost: Decimal,
    pub source: PriceSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeCostResult {
    pub recipe: String,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
    pub ingredients: Vec<IngredientCost>,
}
