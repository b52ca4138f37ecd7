//! Accuracy regression tests on synthetic nine-band spectra.
//!
//! Guards against algorithmic changes that quietly degrade classification
//! quality on a deterministic dataset shaped like Sentinel-2 reflectances.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use landcover_rf::{ConfusionMatrix, OobMode, RandomForestConfig};

const BANDS: [&str; 9] = ["B2", "B3", "B4", "B5", "B6", "B7", "B8", "B11", "B12"];

/// Class-mean reflectance for water, built-up, bare land, cropland, vegetation.
const CLASS_MEANS: [[f64; 9]; 5] = [
    [900.0, 800.0, 600.0, 500.0, 400.0, 380.0, 300.0, 150.0, 100.0],
    [1400.0, 1450.0, 1550.0, 1650.0, 1750.0, 1800.0, 1850.0, 2300.0, 2100.0],
    [1200.0, 1500.0, 1900.0, 2100.0, 2300.0, 2400.0, 2500.0, 3100.0, 2800.0],
    [500.0, 750.0, 650.0, 1100.0, 2000.0, 2400.0, 2600.0, 1900.0, 1100.0],
    [300.0, 550.0, 350.0, 900.0, 2600.0, 3200.0, 3500.0, 1500.0, 700.0],
];

/// 400 samples, round-robin across the five classes, ±120 uniform noise.
fn make_spectra(seed: u64) -> (Vec<Vec<f64>>, Vec<usize>, Vec<String>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut samples = Vec::with_capacity(400);
    let mut labels = Vec::with_capacity(400);
    for i in 0..400 {
        let class = i % 5;
        let row = CLASS_MEANS[class]
            .iter()
            .map(|&mean| mean + (rng.r#gen::<f64>() - 0.5) * 240.0)
            .collect();
        samples.push(row);
        labels.push(class);
    }
    let names = BANDS.iter().map(|b| b.to_string()).collect();
    (samples, labels, names)
}

#[test]
fn held_out_accuracy_above_threshold() {
    let (train, train_labels, names) = make_spectra(42);
    let (test, test_labels, _) = make_spectra(7);
    let result = RandomForestConfig::new(100)
        .unwrap()
        .with_n_classes(Some(5))
        .fit(&train, &train_labels, &names)
        .unwrap();

    let predicted = result.forest().predict_batch(&test).unwrap();
    let cm = ConfusionMatrix::from_labels(&test_labels, &predicted, 5).unwrap();
    assert_eq!(cm.total(), test.len());
    let accuracy = cm.accuracy().unwrap();
    assert!(accuracy > 0.95, "held-out accuracy {accuracy} <= 0.95");
    for (class, pa) in cm.producers_accuracy().iter().enumerate() {
        assert!(pa.unwrap() > 0.85, "producer's accuracy for class {class}: {pa:?}");
    }
}

#[test]
fn oob_accuracy_above_threshold() {
    let (samples, labels, names) = make_spectra(42);
    let result = RandomForestConfig::new(100)
        .unwrap()
        .with_oob_mode(OobMode::Enabled)
        .fit(&samples, &labels, &names)
        .unwrap();
    let oob = result.oob_score().expect("OOB enabled");
    assert!(oob.accuracy > 0.9, "oob accuracy {} <= 0.9", oob.accuracy);
    assert_eq!(oob.confusion_matrix.total(), oob.n_oob_samples);
}

#[test]
fn same_seed_same_map() {
    let (samples, labels, names) = make_spectra(42);
    let config = RandomForestConfig::new(30).unwrap().with_seed(2021);
    let a = config.fit(&samples, &labels, &names).unwrap();
    let b = config.fit(&samples, &labels, &names).unwrap();
    assert_eq!(
        a.forest().predict_batch(&samples).unwrap(),
        b.forest().predict_batch(&samples).unwrap()
    );
}

#[test]
fn every_band_ranked_once() {
    let (samples, labels, names) = make_spectra(42);
    let result = RandomForestConfig::new(50).unwrap().fit(&samples, &labels, &names).unwrap();
    let ranks: Vec<usize> = result.importances().iter().map(|b| b.rank).collect();
    assert_eq!(ranks, (1..=9).collect::<Vec<_>>());
    assert_eq!(result.metadata().n_features, 9);
    assert_eq!(result.metadata().max_features_resolved, 3);
}
