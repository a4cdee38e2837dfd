//! Effective-price and recipe-cost resolution.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::debug;

use crate::domain::{
    EffectivePrice, IngredientCost, InventoryOpsError, PriceSource, Recipe,
    RecipeCostResult, Result,
};
use crate::storage::SharedStore;

pub struct PriceResolver {
    store: SharedStore,
}

impl PriceResolver {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Resolve the effective vendor price for a sku at a date.
    ///
    /// Resolution order: the org's preferred vendor first, then any
    /// vendor with a currently valid price. Ties break on the latest
    /// `effective_from`.
    pub async fn effective_price(
        &self,
        org: &str,
        sku: &str,
        date: NaiveDate,
    ) -> Result<EffectivePrice> {
        let rows = self.store.query_prices(org, sku).await?;
        let valid: Vec<_> = rows.into_iter().filter(|p| p.is_valid_at(date)).collect();

        if valid.is_empty() {
            return Err(InventoryOpsError::NoPriceFound {
                sku: sku.to_string(),
                date: date.to_string(),
            });
        }

        let preferred = self.store.preferred_vendor(org).await?;

        if let Some(vendor) = preferred.as_deref() {
            if let Some(row) = valid
                .iter()
                .filter(|p| p.vendor == vendor)
                .max_by_key(|p| p.effective_from)
            {
                return Ok(EffectivePrice {
                    price: row.price,
                    vendor: row.vendor.clone(),
                    currency: row.currency.clone(),
                    source: PriceSource::PreferredVendor,
                });
            }
        }

        let row = valid
            .iter()
            .max_by_key(|p| p.effective_from)
            .ok_or_else(|| InventoryOpsError::NoPriceFound {
                sku: sku.to_string(),
                date: date.to_string(),
            })?;

        Ok(EffectivePrice {
            price: row.price,
            vendor: row.vendor.clone(),
            currency: row.currency.clone(),
            source: PriceSource::FallbackVendor,
        })
    }

    /// Price out a recipe at a fixed date.
    ///
    /// Ingredients with no resolvable price become zero-cost lines
    /// tagged `missing_price`; the sum still completes. Preparation
    /// loss is a percentage; the total then divides by the yield.
    pub async fn recipe_cost(
        &self,
        org: &str,
        recipe: &Recipe,
        date: NaiveDate,
    ) -> Result<RecipeCostResult> {
        if recipe.yield_qty <= 0.0 {
            return Err(InventoryOpsError::InvalidArgument(format!(
                "recipe {} has non-positive yield",
                recipe.name
            )));
        }
        if !(0.0..=100.0).contains(&recipe.prep_loss_pct) {
            return Err(InventoryOpsError::InvalidArgument(format!(
                "recipe {} prep loss must be a percentage in [0, 100]",
                recipe.name
            )));
        }

        let mut ingredients = Vec::with_capacity(recipe.ingredients.len());
        let mut raw_total = Decimal::ZERO;

        for ingredient in &recipe.ingredients {
            let qty = decimal_from(ingredient.qty)?;
            match self.effective_price(org, &ingredient.sku, date).await {
                Ok(resolved) => {
                    let cost = resolved.price * qty;
                    raw_total += cost;
                    ingredients.push(IngredientCost {
                        sku: ingredient.sku.clone(),
                        qty: ingredient.qty,
                        unit_price: resolved.price,
                        cost,
                        source: resolved.source,
                    });
                }
                Err(InventoryOpsError::NoPriceFound { .. }) => {
                    debug!(sku = %ingredient.sku, recipe = %recipe.name, "no price, zero-cost line");
                    ingredients.push(IngredientCost {
                        sku: ingredient.sku.clone(),
                        qty: ingredient.qty,
                        unit_price: Decimal::ZERO,
                        cost: Decimal::ZERO,
                        source: PriceSource::MissingPrice,
                    });
                }
                Err(other) => return Err(other),
            }
        }

        let loss_factor = Decimal::ONE + decimal_from(recipe.prep_loss_pct / 100.0)?;
        let total_cost = raw_total * loss_factor;
        let unit_cost = total_cost / decimal_from(recipe.yield_qty)?;

        Ok(RecipeCostResult {
            recipe: recipe.name.clone(),
            unit_cost,
            total_cost,
            ingredients,
        })
    }
}

fn decimal_from(value: f64) -> Result<Decimal> {
    Decimal::try_from(value).map_err(|_| {
        InventoryOpsError::InvalidArgument(format!("value {} is not a valid decimal", value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PriceRecord, RecipeIngredient};
    use crate::storage::MemoryStore;
    use std::sync::Arc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn price(vendor: &str, price: &str, from: NaiveDate, to: Option<NaiveDate>) -> PriceRecord {
        PriceRecord {
            org: "org-1".into(),
            sku: "TOM-01".into(),
            vendor: vendor.into(),
            price: price.parse().unwrap(),
            currency: "USD".into(),
            effective_from: from,
            effective_to: to,
        }
    }

    async fn resolver_with(prices: Vec<PriceRecord>, preferred: Option<&str>) -> PriceResolver {
        let store = MemoryStore::new();
        for p in prices {
            store.seed_price(p).await;
        }
        if let Some(vendor) = preferred {
            store.set_preferred_vendor("org-1", vendor).await;
        }
        PriceResolver::new(Arc::new(store))
    }

    #[tokio::test]
    async fn test_preferred_vendor_wins() {
        let resolver = resolver_with(
            vec![
                price("acme", "2.00", date(2025, 1, 1), None),
                price("fresh-co", "1.50", date(2025, 1, 1), None),
            ],
            Some("fresh-co"),
        )
        .await;

        let resolved = resolver
            .effective_price("org-1", "TOM-01", date(2025, 6, 1))
            .await
            .unwrap();
        assert_eq!(resolved.vendor, "fresh-co");
        assert_eq!(resolved.source, PriceSource::PreferredVendor);
    }

    #[tokio::test]
    async fn test_fallback_when_preferred_has_no_valid_price() {
        let resolver = resolver_with(
            vec![
                price("acme", "2.00", date(2025, 1, 1), None),
                price("fresh-co", "1.50", date(2024, 1, 1), Some(date(2024, 12, 31))),
            ],
            Some("fresh-co"),
        )
        .await;

        let resolved = resolver
            .effective_price("org-1", "TOM-01", date(2025, 6, 1))
            .await
            .unwrap();
        assert_eq!(resolved.vendor, "acme");
        assert_eq!(resolved.source, PriceSource::FallbackVendor);
    }

    #[tokio::test]
    async fn test_tie_breaks_on_latest_effective_from() {
        let resolver = resolver_with(
            vec![
                price("acme", "2.00", date(2025, 1, 1), None),
                price("acme", "2.40", date(2025, 5, 1), None),
            ],
            None,
        )
        .await;

        let resolved = resolver
            .effective_price("org-1", "TOM-01", date(2025, 6, 1))
            .await
            .unwrap();
        assert_eq!(resolved.price, "2.40".parse().unwrap());
    }

    #[tokio::test]
    async fn test_no_price_found() {
        let resolver = resolver_with(vec![], None).await;
        let err = resolver
            .effective_price("org-1", "TOM-01", date(2025, 6, 1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "no_price_found");
    }

    #[tokio::test]
    async fn test_recipe_cost_with_missing_ingredient() {
        let store = MemoryStore::new();
        store
            .seed_price(price("acme", "2.00", date(2025, 1, 1), None))
            .await;
        let resolver = PriceResolver::new(Arc::new(store));

        let recipe = Recipe {
            name: "salsa".into(),
            yield_qty: 10.0,
            prep_loss_pct: 10.0,
            ingredients: vec![
                RecipeIngredient {
                    sku: "TOM-01".into(),
                    qty: 5.0,
                },
                RecipeIngredient {
                    sku: "CIL-02".into(),
                    qty: 1.0,
                },
            ],
        };

        let result = resolver
            .recipe_cost("org-1", &recipe, date(2025, 6, 1))
            .await
            .unwrap();

        // 5 kg x 2.00 = 10.00, x 1.1 prep loss = 11.00, / 10 yield = 1.10
        assert_eq!(result.total_cost, "11.00".parse().unwrap());
        assert_eq!(result.unit_cost, "1.10".parse().unwrap());
        assert_eq!(result.ingredients.len(), 2);
        assert_eq!(result.ingredients[1].source, PriceSource::MissingPrice);
        assert_eq!(result.ingredients[1].cost, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_recipe_rejects_out_of_range_loss() {
        let resolver = resolver_with(vec![], None).await;
        let recipe = Recipe {
            name: "salsa".into(),
            yield_qty: 10.0,
            prep_loss_pct: -0.05,
            ingredients: vec![],
        };
        let err = resolver
            .recipe_cost("org-1", &recipe, date(2025, 6, 1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_argument");
    }

    #[tokio::test]
    async fn test_recipe_rejects_zero_yield() {
        let resolver = resolver_with(vec![], None).await;
        let recipe = Recipe {
            name: "salsa".into(),
            yield_qty: 0.0,
            prep_loss_pct: 5.0,
            ingredients: vec![],
        };
        assert!(resolver
            .recipe_cost("org-1", &recipe, date(2025, 6, 1))
            .await
            .is_err());
    }
}
