use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, instrument};

use crate::ClassifierError;
use crate::node::{BandIndex, Node, NodeIndex};
use crate::split::{SplitCriterion, find_best_split};

/// Configuration for a single CART decision tree.
///
/// Construct via [`DecisionTreeConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter           | Default               |
/// |---------------------|-----------------------|
/// | `criterion`         | `Gini`                |
/// | `max_depth`         | `None` (unlimited)    |
/// | `min_samples_split` | 2                     |
/// | `min_samples_leaf`  | 1                     |
/// | `max_features`      | `None` (all bands)    |
/// | `n_classes`         | `None` (from labels)  |
/// | `seed`              | 42                    |
#[derive(Debug, Clone)]
pub struct DecisionTreeConfig {
    pub(crate) criterion: SplitCriterion,
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_samples_split: usize,
    pub(crate) min_samples_leaf: usize,
    pub(crate) max_features: Option<usize>,
    pub(crate) n_classes: Option<usize>,
    pub(crate) seed: u64,
}

impl DecisionTreeConfig {
    /// Create a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            criterion: SplitCriterion::Gini,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            n_classes: None,
            seed: 42,
        }
    }

    /// Set the split quality criterion.
    #[must_use]
    pub fn with_criterion(mut self, criterion: SplitCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set the maximum tree depth (root is depth 0). `None` grows until pure.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the minimum number of samples required to attempt a split.
    #[must_use]
    pub fn with_min_samples_split(mut self, min_samples_split: usize) -> Self {
        self.min_samples_split = min_samples_split;
        self
    }

    /// Set the minimum number of samples required in each leaf after a split.
    #[must_use]
    pub fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Self {
        self.min_samples_leaf = min_samples_leaf;
        self
    }

    /// Set how many bands are drawn as split candidates per node.
    #[must_use]
    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    /// Fix the class count so leaf distributions keep a constant length.
    #[must_use]
    pub fn with_n_classes(mut self, n_classes: Option<usize>) -> Self {
        self.n_classes = n_classes;
        self
    }

    /// Set the random seed for reproducibility.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Return the split criterion.
    #[must_use]
    pub fn criterion(&self) -> SplitCriterion {
        self.criterion
    }

    /// Return the maximum depth limit, if any.
    #[must_use]
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    /// Return the random seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Grow a tree on row-major band vectors.
    ///
    /// # Errors
    ///
    /// | Variant                                       | When                                      |
    /// |-----------------------------------------------|-------------------------------------------|
    /// | [`ClassifierError::EmptyDataset`]             | `samples` is empty                        |
    /// | [`ClassifierError::ZeroFeatures`]             | rows have zero band columns               |
    /// | [`ClassifierError::LabelCountMismatch`]       | label and row counts differ               |
    /// | [`ClassifierError::FeatureCountMismatch`]     | rows have inconsistent lengths            |
    /// | [`ClassifierError::NonFiniteValue`]           | any value is NaN or infinite              |
    /// | [`ClassifierError::LabelOutOfRange`]          | label outside the fixed class count       |
    /// | [`ClassifierError::InvalidMaxFeatures`]       | `max_features` outside [1, n_bands]       |
    /// | [`ClassifierError::InvalidMaxDepth`]          | `max_depth` is `Some(0)`                  |
    /// | [`ClassifierError::InvalidMinSamplesSplit`]   | `min_samples_split` < 2                   |
    /// | [`ClassifierError::InvalidMinSamplesLeaf`]    | `min_samples_leaf` < 1                    |
    #[instrument(skip(self, samples, labels), fields(n_samples = samples.len()))]
    pub fn fit(&self, samples: &[Vec<f64>], labels: &[usize]) -> Result<DecisionTree, ClassifierError> {
        let n_features = validate_rows(samples, labels)?;

        if let Some(d) = self.max_depth
            && d == 0
        {
            return Err(ClassifierError::InvalidMaxDepth { max_depth: 0 });
        }
        if self.min_samples_split < 2 {
            return Err(ClassifierError::InvalidMinSamplesSplit {
                min_samples_split: self.min_samples_split,
            });
        }
        if self.min_samples_leaf < 1 {
            return Err(ClassifierError::InvalidMinSamplesLeaf {
                min_samples_leaf: self.min_samples_leaf,
            });
        }

        let max_features = self.max_features.unwrap_or(n_features);
        if max_features == 0 || max_features > n_features {
            return Err(ClassifierError::InvalidMaxFeatures {
                max_features,
                n_features,
            });
        }

        let n_classes = resolve_n_classes(self.n_classes, labels)?;

        // Column-major copy: split search scans one band at a time.
        let columns: Vec<Vec<f64>> = (0..n_features)
            .map(|b| samples.iter().map(|row| row[b]).collect())
            .collect();

        let indices: Vec<usize> = (0..samples.len()).collect();
        let mut grower = Grower {
            columns: &columns,
            labels,
            n_classes,
            config: self,
            max_features,
            rng: ChaCha8Rng::seed_from_u64(self.seed),
            arena: Vec::new(),
        };
        let root = grower.grow(&indices, 0);

        debug!(
            root_index = root.index(),
            n_nodes = grower.arena.len(),
            n_classes,
            "decision tree built"
        );

        Ok(DecisionTree {
            nodes: grower.arena,
            n_features,
            n_classes,
        })
    }
}

impl Default for DecisionTreeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Check a training set and return its band count.
pub(crate) fn validate_rows(samples: &[Vec<f64>], labels: &[usize]) -> Result<usize, ClassifierError> {
    if samples.is_empty() {
        return Err(ClassifierError::EmptyDataset);
    }
    if labels.len() != samples.len() {
        return Err(ClassifierError::LabelCountMismatch {
            n_samples: samples.len(),
            n_labels: labels.len(),
        });
    }
    let n_features = samples[0].len();
    if n_features == 0 {
        return Err(ClassifierError::ZeroFeatures);
    }
    for (sample_index, row) in samples.iter().enumerate() {
        if row.len() != n_features {
            return Err(ClassifierError::FeatureCountMismatch {
                expected: n_features,
                got: row.len(),
                sample_index,
            });
        }
        if let Some(feature_index) = row.iter().position(|v| !v.is_finite()) {
            return Err(ClassifierError::NonFiniteValue {
                sample_index,
                feature_index,
            });
        }
    }
    Ok(n_features)
}

/// Use the fixed class count when given, otherwise `max(label) + 1`.
pub(crate) fn resolve_n_classes(fixed: Option<usize>, labels: &[usize]) -> Result<usize, ClassifierError> {
    let observed = labels.iter().max().copied().unwrap_or(0) + 1;
    match fixed {
        Some(0) => Err(ClassifierError::InvalidClassCount { n_classes: 0 }),
        Some(n) => match labels.iter().find(|&&l| l >= n) {
            Some(&label) => Err(ClassifierError::LabelOutOfRange { label, n_classes: n }),
            None => Ok(n),
        },
        None => Ok(observed),
    }
}

/// Recursive tree builder writing into a node arena.
struct Grower<'a> {
    columns: &'a [Vec<f64>],
    labels: &'a [usize],
    n_classes: usize,
    config: &'a DecisionTreeConfig,
    max_features: usize,
    rng: ChaCha8Rng,
    arena: Vec<Node>,
}

impl Grower<'_> {
    fn grow(&mut self, indices: &[usize], depth: usize) -> NodeIndex {
        let n_samples = indices.len();
        let mut class_counts = vec![0usize; self.n_classes];
        for &i in indices {
            class_counts[self.labels[i]] += 1;
        }
        let impurity = self.config.criterion.impurity(&class_counts, n_samples);

        let depth_exceeded = self.config.max_depth.is_some_and(|max_d| depth >= max_d);
        let stop = n_samples < self.config.min_samples_split || impurity.is_pure() || depth_exceeded;

        let split = if stop {
            None
        } else {
            find_best_split(
                self.columns,
                self.labels,
                indices,
                self.n_classes,
                &self.config.criterion,
                self.max_features,
                self.config.min_samples_leaf,
                &mut self.rng,
            )
        };

        let Some(split) = split else {
            let total = n_samples as f64;
            let distribution = class_counts.iter().map(|&c| c as f64 / total).collect();
            let class = class_counts
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(&a.0)))
                .map_or(0, |(idx, _)| idx);
            self.arena.push(Node::Leaf {
                class,
                distribution,
                impurity,
                n_samples,
            });
            return NodeIndex::new(self.arena.len() - 1);
        };

        // Reserve the parent slot so children get higher indices, then patch it.
        let node_idx = self.arena.len();
        self.arena.push(Node::Leaf {
            class: 0,
            distribution: Vec::new(),
            impurity,
            n_samples,
        });

        let left = self.grow(&split.left_indices, depth + 1);
        let right = self.grow(&split.right_indices, depth + 1);

        self.arena[node_idx] = Node::Split {
            band: split.band,
            threshold: split.threshold,
            left,
            right,
            impurity,
            n_samples,
            impurity_decrease: split.impurity_decrease,
        };
        NodeIndex::new(node_idx)
    }
}

/// A fitted CART decision tree stored as a flat node arena (root at 0).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DecisionTree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) n_features: usize,
    pub(crate) n_classes: usize,
}

impl DecisionTree {
    /// Predict the class label for one band vector.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifierError::PredictionFeatureMismatch`] when the vector length is wrong.
    pub fn predict(&self, sample: &[f64]) -> Result<usize, ClassifierError> {
        Ok(self.leaf_for(sample)?.0)
    }

    /// Return the leaf class distribution for one band vector.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifierError::PredictionFeatureMismatch`] when the vector length is wrong.
    pub fn predict_proba(&self, sample: &[f64]) -> Result<&[f64], ClassifierError> {
        Ok(self.leaf_for(sample)?.1)
    }

    /// Class and distribution of the leaf `sample` lands in.
    fn leaf_for(&self, sample: &[f64]) -> Result<(usize, &[f64]), ClassifierError> {
        if sample.len() != self.n_features {
            return Err(ClassifierError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: sample.len(),
            });
        }
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Split {
                    band,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    idx = if sample[band.index()] <= *threshold {
                        left.index()
                    } else {
                        right.index()
                    };
                }
                Node::Leaf { class, distribution, .. } => return Ok((*class, distribution)),
            }
        }
    }

    /// The band tested first; `None` when the tree is a single leaf.
    #[must_use]
    pub fn root_band(&self) -> Option<BandIndex> {
        self.nodes.first().and_then(Node::band)
    }

    /// Mean decrease in impurity per band, normalized to sum to 1.0.
    ///
    /// All zeros when the tree is a single leaf.
    #[must_use]
    pub fn feature_importances(&self) -> Vec<f64> {
        let mut totals = vec![0.0f64; self.n_features];
        for node in &self.nodes {
            if let Node::Split {
                band,
                impurity_decrease,
                ..
            } = node
            {
                totals[band.index()] += impurity_decrease;
            }
        }
        let sum: f64 = totals.iter().sum();
        if sum > 0.0 {
            totals.iter_mut().for_each(|v| *v /= sum);
        }
        totals
    }

    /// Return the total number of nodes (splits and leaves).
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Return the number of leaves.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Return the number of classes the leaf distributions cover.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn water_vs_buildup() -> (Vec<Vec<f64>>, Vec<usize>) {
        // NIR low for water, high for built-up surfaces.
        let samples = vec![
            vec![300.0],
            vec![320.0],
            vec![350.0],
            vec![2100.0],
            vec![2200.0],
            vec![2300.0],
        ];
        (samples, vec![0, 0, 0, 1, 1, 1])
    }

    #[test]
    fn single_split_separates_two_classes() {
        let (samples, labels) = water_vs_buildup();
        let tree = DecisionTreeConfig::new().fit(&samples, &labels).unwrap();
        assert_eq!(tree.n_nodes(), 3);
        assert_eq!(tree.n_leaves(), 2);
        assert_eq!(tree.predict(&[310.0]).unwrap(), 0);
        assert_eq!(tree.predict(&[2250.0]).unwrap(), 1);
        assert_eq!(tree.root_band(), Some(BandIndex::new(0)));
    }

    #[test]
    fn pure_input_is_single_leaf() {
        let samples = vec![vec![1.0], vec![2.0]];
        let tree = DecisionTreeConfig::new().fit(&samples, &[3, 3]).unwrap();
        assert_eq!(tree.n_nodes(), 1);
        assert_eq!(tree.n_classes(), 4);
        assert_eq!(tree.predict(&[5.0]).unwrap(), 3);
        assert_eq!(tree.feature_importances(), vec![0.0]);
        assert_eq!(tree.root_band(), None);
    }

    #[test]
    fn depth_limit_respected() {
        let samples: Vec<Vec<f64>> = (0..12).map(|i| vec![i as f64]).collect();
        let labels: Vec<usize> = (0..12).map(|i| i % 3).collect();
        let tree = DecisionTreeConfig::new()
            .with_max_depth(Some(1))
            .fit(&samples, &labels)
            .unwrap();
        assert!(tree.n_nodes() <= 3);
    }

    #[test]
    fn zero_depth_rejected() {
        let (samples, labels) = water_vs_buildup();
        let err = DecisionTreeConfig::new()
            .with_max_depth(Some(0))
            .fit(&samples, &labels)
            .unwrap_err();
        assert!(matches!(err, ClassifierError::InvalidMaxDepth { .. }));
    }

    #[test]
    fn non_finite_value_rejected() {
        let samples = vec![vec![1.0], vec![f64::NAN]];
        let err = DecisionTreeConfig::new().fit(&samples, &[0, 1]).unwrap_err();
        assert!(matches!(
            err,
            ClassifierError::NonFiniteValue {
                sample_index: 1,
                feature_index: 0
            }
        ));
    }

    #[test]
    fn wrong_prediction_width_rejected() {
        let (samples, labels) = water_vs_buildup();
        let tree = DecisionTreeConfig::new().fit(&samples, &labels).unwrap();
        assert!(matches!(
            tree.predict(&[1.0, 2.0]),
            Err(ClassifierError::PredictionFeatureMismatch { expected: 1, got: 2 })
        ));
    }

    #[test]
    fn fixed_class_count_pads_distribution() {
        let (samples, labels) = water_vs_buildup();
        let tree = DecisionTreeConfig::new()
            .with_n_classes(Some(5))
            .fit(&samples, &labels)
            .unwrap();
        assert_eq!(tree.predict_proba(&[300.0]).unwrap().len(), 5);
    }
}
