use criterion::{black_box, criterion_group, criterion_main, Criterion};

use inventory_ops::domain::WeightVector;
use inventory_ops::engine::{confidence_score, fuse_prediction, holt_forecast};
use inventory_ops::signals::SignalBundle;

fn bench_holt_forecast(c: &mut Criterion) {
    let history: Vec<f64> = (0..30).map(|i| 10.0 + (i as f64 * 0.3).sin() * 2.0).collect();

    c.bench_function("holt_forecast_30d", |b| {
        b.iter(|| holt_forecast(black_box(&history), black_box(7)))
    });
}

fn bench_confidence(c: &mut Criterion) {
    let history: Vec<f64> = (0..30).map(|i| 10.0 + (i % 5) as f64).collect();

    c.bench_function("confidence_score_30d", |b| {
        b.iter(|| confidence_score(black_box(&history)))
    });
}

fn bench_fusion(c: &mut Criterion) {
    let weights = WeightVector::default();
    let signals = SignalBundle {
        history: vec![],
        population_factor: 1.2,
        menu_factor: 1.5,
        par_level: 20.0,
        seasonality_factor: 1.0,
    };

    c.bench_function("fuse_prediction", |b| {
        b.iter(|| fuse_prediction(black_box(12.5), black_box(&weights), black_box(&signals)))
    });
}

criterion_group!(benches, bench_holt_forecast, bench_confidence, bench_fusion);
criterion_main!(benches);
