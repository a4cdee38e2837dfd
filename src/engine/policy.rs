//! Order-quantity policy: safety stock, reorder point, recommended
//! quantity, and the reason behind each recommendation.

use crate::domain::OrderReason;

/// Outcome of the per-item order policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderDecision {
    pub order_qty: u64,
    pub reorder_point: f64,
    pub safety_stock: f64,
    pub reason: OrderReason,
}

/// Decide how much to order for one item.
///
/// `safety_pct` is a fraction of the prediction. The target when stock
/// falls below the reorder point is the par level, or twice the
/// prediction for items without one.
pub fn order_quantity(
    predicted_usage: f64,
    current_stock: f64,
    par_level: f64,
    lead_time_days: u32,
    safety_pct: f64,
) -> OrderDecision {
    let safety_stock = predicted_usage * safety_pct;
    let reorder_point = predicted_usage * lead_time_days as f64 / 7.0 + safety_stock;

    if current_stock < reorder_point {
        let target = if par_level > 0.0 {
            par_level
        } else {
            2.0 * predicted_usage
        };
        let order_qty = (target - current_stock + safety_stock).max(0.0).ceil() as u64;
        return OrderDecision {
            order_qty,
            reorder_point,
            safety_stock,
            reason: OrderReason::BelowReorderPoint,
        };
    }

    if par_level > 0.0 && current_stock < 0.8 * par_level {
        let order_qty = (par_level - current_stock).max(0.0).ceil() as u64;
        return OrderDecision {
            order_qty,
            reorder_point,
            safety_stock,
            reason: OrderReason::BelowParLevel,
        };
    }

    OrderDecision {
        order_qty: 0,
        reorder_point,
        safety_stock,
        reason: OrderReason::SufficientStock,
    }
}
