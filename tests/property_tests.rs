//! Property checks over the pure core: weight normalization, bounded
//! steps, confidence bounds, policy monotonicity, and ABC partitioning.

use proptest::prelude::*;
use rust_decimal::Decimal;

use inventory_ops::domain::{AbcClass, SignalKind, WeightVector, MAX_WEIGHT_STEP};
use inventory_ops::engine::{confidence_score, holt_forecast, order_quantity};
use inventory_ops::policy::classify_abc;

fn arb_weights() -> impl Strategy<Value = WeightVector> {
    (0.01f64..10.0, 0.01f64..10.0, 0.01f64..10.0, 0.01f64..10.0, 0.01f64..10.0).prop_map(
        |(a, b, c, d, e)| {
            WeightVector {
                usage_history: a,
                population: b,
                menu_rotation: c,
                par_level: d,
                seasonality: e,
            }
            .renormalized()
        },
    )
}

fn arb_deltas() -> impl Strategy<Value = Vec<(SignalKind, f64)>> {
    prop::collection::vec(
        (0usize..5, -0.5f64..0.5).prop_map(|(idx, delta)| (SignalKind::ALL[idx], delta)),
        0..4,
    )
}

proptest! {
    // After any application, weights sum to 1 and stay in [0, 1]
    #[test]
    fn weights_stay_normalized(start in arb_weights(), deltas in arb_deltas()) {
        let updated = start.apply_deltas(&deltas);
        prop_assert!((updated.sum() - 1.0).abs() <= 1e-9);
        for kind in SignalKind::ALL {
            let w = updated.get(kind);
            prop_assert!((0.0..=1.0).contains(&w), "{:?} = {}", kind, w);
        }
    }

    // No single application moves any weight more than the step bound
    #[test]
    fn weight_step_is_bounded(start in arb_weights(), deltas in arb_deltas()) {
        let updated = start.apply_deltas(&deltas);
        for kind in SignalKind::ALL {
            let change = (updated.get(kind) - start.get(kind)).abs();
            prop_assert!(
                change <= MAX_WEIGHT_STEP + 1e-9,
                "{:?} moved {}",
                kind,
                change
            );
        }
    }

    // Confidence is always calibrated into [0.1, 1.0]
    #[test]
    fn confidence_stays_in_bounds(history in prop::collection::vec(0.0f64..500.0, 0..40)) {
        let score = confidence_score(&history);
        prop_assert!((0.1..=1.0).contains(&score), "score {}", score);
    }

    // Predictions never go negative, whatever the history shape
    #[test]
    fn forecast_is_non_negative(
        history in prop::collection::vec(0.0f64..500.0, 0..40),
        horizon in 1u32..60,
    ) {
        prop_assert!(holt_forecast(&history, horizon) >= 0.0);
    }

    // Holding everything else fixed, more stock never means a bigger order
    #[test]
    fn order_qty_monotone_in_stock(
        pred in 0.0f64..200.0,
        par in 0.0f64..300.0,
        lead in 1u32..15,
        stocks in prop::collection::vec(0.0f64..400.0, 2..20),
    ) {
        let mut stocks = stocks;
        stocks.sort_by(|a, b| a.partial_cmp(b).unwrap());

        let mut last = u64::MAX;
        for stock in stocks {
            let qty = order_quantity(pred, stock, par, lead, 0.20).order_qty;
            prop_assert!(qty <= last, "qty rose to {} at stock {}", qty, stock);
            last = qty;
        }
    }

    // ABC classes cleanly partition the input, ordered A then B then C
    #[test]
    fn abc_partitions_cleanly(values in prop::collection::vec(0u64..100_000, 1..50)) {
        let input: Vec<(String, Decimal)> = values
            .iter()
            .enumerate()
            .map(|(i, v)| (format!("item-{}", i), Decimal::from(*v)))
            .collect();
        let n = input.len();

        let classified = classify_abc(input);
        prop_assert_eq!(classified.len(), n);

        // Descending by value, and no class regresses from C back to B or A
        let mut last_value = Decimal::MAX;
        let mut last_rank = 0u8;
        for (_, value, class) in &classified {
            prop_assert!(*value <= last_value);
            last_value = *value;

            let rank = match class {
                AbcClass::A => 0,
                AbcClass::B => 1,
                AbcClass::C => 2,
            };
            prop_assert!(rank >= last_rank, "class order regressed");
            last_rank = rank;
        }
    }
}
