//! Criterion benchmarks for forest training and per-pixel classification.

use criterion::{Criterion, criterion_group, criterion_main};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use landcover_rf::RandomForestConfig;

/// Nine-band vectors whose first three bands carry the class signal.
fn make_pixels(n: usize, seed: u64) -> (Vec<Vec<f64>>, Vec<usize>, Vec<String>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut samples = Vec::with_capacity(n);
    let mut labels = Vec::with_capacity(n);
    for i in 0..n {
        let class = i % 5;
        labels.push(class);
        samples.push(
            (0..9)
                .map(|b| {
                    let signal = if b < 3 { class as f64 * 400.0 } else { 0.0 };
                    signal + rng.r#gen::<f64>() * 300.0
                })
                .collect(),
        );
    }
    let names = (0..9).map(|b| format!("B{b}")).collect();
    (samples, labels, names)
}

fn bench_train(c: &mut Criterion) {
    let (samples, labels, names) = make_pixels(1000, 42);
    let config = RandomForestConfig::new(100).unwrap();
    c.bench_function("train_1000x9_100trees", |b| {
        b.iter(|| config.fit(&samples, &labels, &names).unwrap());
    });
}

fn bench_classify(c: &mut Criterion) {
    let (samples, labels, names) = make_pixels(1000, 42);
    let forest = RandomForestConfig::new(100)
        .unwrap()
        .fit(&samples, &labels, &names)
        .unwrap()
        .into_forest();
    let (pixels, _, _) = make_pixels(10_000, 7);
    c.bench_function("classify_10000_pixels_100trees", |b| {
        b.iter(|| forest.predict_batch(&pixels).unwrap());
    });
}

criterion_group!(benches, bench_train, bench_classify);
criterion_main!(benches);
