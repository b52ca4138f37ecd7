//! Random forest training with parallel tree construction.

use std::collections::BTreeMap;

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::{debug, info, instrument};

use crate::config::{MaxFeatures, OobMode, RandomForestConfig};
use crate::error::ClassifierError;
use crate::importance::aggregate_importances;
use crate::oob::compute_oob;
use crate::result::{RandomForestResult, TrainingMetadata};
use crate::tree::{DecisionTree, DecisionTreeConfig, resolve_n_classes, validate_rows};

/// A fitted random forest.
///
/// Read-only once trained: the same forest classifies the held-out test
/// samples and every pixel of the composite.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RandomForest {
    pub(crate) trees: Vec<DecisionTree>,
    pub(crate) n_features: usize,
    pub(crate) n_classes: usize,
    pub(crate) band_names: Vec<String>,
}

/// Resolve `MaxFeatures` to a concrete count.
pub(crate) fn resolve_max_features(
    max_features: MaxFeatures,
    n_features: usize,
) -> Result<usize, ClassifierError> {
    let resolved = match max_features {
        MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
        MaxFeatures::Log2 => (n_features as f64).log2().ceil().max(1.0) as usize,
        MaxFeatures::Fraction(f) => (n_features as f64 * f).ceil() as usize,
        MaxFeatures::Fixed(n) => n,
        MaxFeatures::All => n_features,
    };
    if resolved == 0 || resolved > n_features {
        return Err(ClassifierError::InvalidMaxFeatures {
            max_features: resolved,
            n_features,
        });
    }
    Ok(resolved)
}

/// Draw a bag with replacement; returns the bag and the out-of-bag indices.
fn bootstrap_sample(
    n_samples: usize,
    draw_count: usize,
    rng: &mut impl Rng,
) -> (Vec<usize>, Vec<usize>) {
    let mut in_bag = vec![false; n_samples];
    let mut bag = Vec::with_capacity(draw_count);
    for _ in 0..draw_count {
        let idx = rng.gen_range(0..n_samples);
        bag.push(idx);
        in_bag[idx] = true;
    }
    let oob: Vec<usize> = (0..n_samples).filter(|&i| !in_bag[i]).collect();
    (bag, oob)
}

#[instrument(skip_all, fields(n_trees = config.n_trees, n_samples = samples.len()))]
pub(crate) fn train(
    config: &RandomForestConfig,
    samples: &[Vec<f64>],
    labels: &[usize],
    band_names: &[String],
) -> Result<RandomForestResult, ClassifierError> {
    let n_features = validate_rows(samples, labels)?;
    if band_names.len() != n_features {
        return Err(ClassifierError::BandNameMismatch {
            n_features,
            n_names: band_names.len(),
        });
    }
    let n_classes = resolve_n_classes(config.n_classes, labels)?;
    let max_features_resolved = resolve_max_features(config.max_features, n_features)?;

    if config.bootstrap_fraction <= 0.0 || config.bootstrap_fraction > 1.0 {
        return Err(ClassifierError::InvalidBootstrapFraction {
            fraction: config.bootstrap_fraction,
        });
    }

    let n_samples = samples.len();
    let draw_count = ((n_samples as f64) * config.bootstrap_fraction).ceil() as usize;

    info!(
        n_trees = config.n_trees,
        n_samples,
        n_features,
        n_classes,
        max_features = max_features_resolved,
        draw_count,
        seed = config.seed,
        "training random forest"
    );

    // One seed per tree from the master stream, so results do not depend on
    // how rayon schedules the trees.
    let mut master_rng = ChaCha8Rng::seed_from_u64(config.seed);
    let tree_seeds: Vec<u64> = (0..config.n_trees).map(|_| master_rng.r#gen()).collect();

    let tree_template = DecisionTreeConfig::new()
        .with_criterion(config.criterion)
        .with_max_depth(config.max_depth)
        .with_min_samples_split(config.min_samples_split)
        .with_min_samples_leaf(config.min_samples_leaf)
        .with_max_features(Some(max_features_resolved))
        .with_n_classes(Some(n_classes));

    let grown: Vec<(DecisionTree, Vec<usize>)> = tree_seeds
        .into_par_iter()
        .map(|seed| -> Result<(DecisionTree, Vec<usize>), ClassifierError> {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let (bag, oob) = bootstrap_sample(n_samples, draw_count, &mut rng);

            let bag_samples: Vec<Vec<f64>> = bag.iter().map(|&i| samples[i].clone()).collect();
            let bag_labels: Vec<usize> = bag.iter().map(|&i| labels[i]).collect();

            let tree = tree_template
                .clone()
                .with_seed(rng.r#gen())
                .fit(&bag_samples, &bag_labels)?;
            Ok((tree, oob))
        })
        .collect::<Result<_, ClassifierError>>()?;

    let (trees, oob_per_tree): (Vec<DecisionTree>, Vec<Vec<usize>>) = grown.into_iter().unzip();

    let per_tree_importances: Vec<Vec<f64>> =
        trees.iter().map(|t| t.feature_importances()).collect();
    let importances = aggregate_importances(&per_tree_importances, band_names);

    let mut root_bands: BTreeMap<&str, usize> = BTreeMap::new();
    for band in trees.iter().filter_map(DecisionTree::root_band) {
        if let Some(name) = band.name(band_names) {
            *root_bands.entry(name).or_default() += 1;
        }
    }
    debug!(n_trees_trained = trees.len(), ?root_bands, "tree training complete");

    let oob_score = if config.oob_mode == OobMode::Enabled {
        Some(compute_oob(&trees, samples, labels, n_classes, &oob_per_tree)?)
    } else {
        None
    };

    let forest = RandomForest {
        trees,
        n_features,
        n_classes,
        band_names: band_names.to_vec(),
    };

    let metadata = TrainingMetadata {
        n_trees: config.n_trees,
        n_features,
        n_classes,
        n_samples,
        max_features_resolved,
        seed: config.seed,
    };

    info!(
        oob_accuracy = oob_score.as_ref().map(|s| s.accuracy),
        "random forest training complete"
    );

    Ok(RandomForestResult::new(forest, importances, oob_score, metadata))
}
