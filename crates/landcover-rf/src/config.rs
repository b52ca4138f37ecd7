//! Configuration builder for random forest training.

use crate::error::ClassifierError;
use crate::result::RandomForestResult;
use crate::split::SplitCriterion;

/// Number of bands considered as split candidates at each node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaxFeatures {
    /// Square root of the band count (rounded up).
    Sqrt,
    /// Log base 2 of the band count (rounded up, at least 1).
    Log2,
    /// A fraction of the band count, in (0.0, 1.0].
    Fraction(f64),
    /// A fixed count.
    Fixed(usize),
    /// Every band at every node.
    All,
}

/// Whether to score the forest on its out-of-bag samples after training.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OobMode {
    /// Compute OOB accuracy and confusion matrix.
    Enabled,
    /// Skip OOB evaluation.
    Disabled,
}

/// Configuration for random forest training.
///
/// Construct via [`RandomForestConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter            | Default          |
/// |----------------------|------------------|
/// | `max_features`       | `Sqrt`           |
/// | `max_depth`          | `None`           |
/// | `min_samples_split`  | 2                |
/// | `min_samples_leaf`   | 1                |
/// | `criterion`          | `Gini`           |
/// | `seed`               | 42               |
/// | `oob_mode`           | `Disabled`       |
/// | `bootstrap_fraction` | 0.5              |
/// | `n_classes`          | `None` (inferred)|
///
/// The bag fraction of 0.5 and square-root band sampling match the
/// defaults of the hosted random forest the workflow was first written
/// against, so accuracy figures stay comparable.
#[derive(Debug, Clone)]
pub struct RandomForestConfig {
    pub(crate) n_trees: usize,
    pub(crate) max_features: MaxFeatures,
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_samples_split: usize,
    pub(crate) min_samples_leaf: usize,
    pub(crate) criterion: SplitCriterion,
    pub(crate) seed: u64,
    pub(crate) oob_mode: OobMode,
    pub(crate) bootstrap_fraction: f64,
    pub(crate) n_classes: Option<usize>,
}

impl RandomForestConfig {
    /// Create a new config with the given number of trees.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifierError::InvalidTreeCount`] if `n_trees` is zero.
    pub fn new(n_trees: usize) -> Result<Self, ClassifierError> {
        if n_trees == 0 {
            return Err(ClassifierError::InvalidTreeCount { n_trees });
        }
        Ok(Self {
            n_trees,
            max_features: MaxFeatures::Sqrt,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            criterion: SplitCriterion::Gini,
            seed: 42,
            oob_mode: OobMode::Disabled,
            bootstrap_fraction: 0.5,
            n_classes: None,
        })
    }

    /// Set the band sampling strategy.
    #[must_use]
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set the maximum tree depth. `None` means unlimited.
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

    /// Set the split quality criterion.
    #[must_use]
    pub fn with_criterion(mut self, criterion: SplitCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set the random seed for reproducibility.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the OOB evaluation mode.
    #[must_use]
    pub fn with_oob_mode(mut self, oob_mode: OobMode) -> Self {
        self.oob_mode = oob_mode;
        self
    }

    /// Set the bag fraction (proportion of samples drawn per tree, with replacement).
    #[must_use]
    pub fn with_bootstrap_fraction(mut self, bootstrap_fraction: f64) -> Self {
        self.bootstrap_fraction = bootstrap_fraction;
        self
    }

    /// Fix the number of output classes instead of inferring it from the labels.
    ///
    /// A fixed count keeps probability vectors and confusion matrices the
    /// same shape even when a class is missing from the training partition.
    #[must_use]
    pub fn with_n_classes(mut self, n_classes: Option<usize>) -> Self {
        self.n_classes = n_classes;
        self
    }

    /// Return the number of trees.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.n_trees
    }

    /// Return the band sampling strategy.
    #[must_use]
    pub fn max_features(&self) -> MaxFeatures {
        self.max_features
    }

    /// Return the maximum depth limit, if any.
    #[must_use]
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    /// Return the split criterion.
    #[must_use]
    pub fn criterion(&self) -> SplitCriterion {
        self.criterion
    }

    /// Return the random seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Return the OOB evaluation mode.
    #[must_use]
    pub fn oob_mode(&self) -> OobMode {
        self.oob_mode
    }

    /// Return the bag fraction.
    #[must_use]
    pub fn bootstrap_fraction(&self) -> f64 {
        self.bootstrap_fraction
    }

    /// Return the fixed class count, if one was set.
    #[must_use]
    pub fn n_classes(&self) -> Option<usize> {
        self.n_classes
    }

    /// Train a random forest on labelled band vectors.
    ///
    /// `samples[i][b]` is the value of band `b` at sample `i`;
    /// `labels[i]` is its zero-based class; `band_names[b]` names band `b`.
    ///
    /// # Errors
    ///
    /// | Variant                                       | When                                             |
    /// |-----------------------------------------------|--------------------------------------------------|
    /// | [`ClassifierError::EmptyDataset`]             | `samples` is empty                               |
    /// | [`ClassifierError::ZeroFeatures`]             | rows have zero band columns                      |
    /// | [`ClassifierError::LabelCountMismatch`]       | `labels.len() != samples.len()`                  |
    /// | [`ClassifierError::BandNameMismatch`]         | `band_names.len()` differs from the band count   |
    /// | [`ClassifierError::FeatureCountMismatch`]     | rows have inconsistent lengths                   |
    /// | [`ClassifierError::NonFiniteValue`]           | any value is NaN or infinite                     |
    /// | [`ClassifierError::InvalidClassCount`]        | `n_classes` fixed at zero                        |
    /// | [`ClassifierError::LabelOutOfRange`]          | a label is outside the fixed class count         |
    /// | [`ClassifierError::InvalidMaxFeatures`]       | resolved max_features is outside [1, n_bands]    |
    /// | [`ClassifierError::InvalidBootstrapFraction`] | bag fraction is not in (0.0, 1.0]                |
    /// | [`ClassifierError::OobEvaluationFailed`]      | OOB enabled but no sample has any OOB tree       |
    pub fn fit(
        &self,
        samples: &[Vec<f64>],
        labels: &[usize],
        band_names: &[String],
    ) -> Result<RandomForestResult, ClassifierError> {
        crate::forest::train(self, samples, labels, band_names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_hosted_forest() {
        let config = RandomForestConfig::new(100).unwrap();
        assert_eq!(config.n_trees(), 100);
        assert_eq!(config.max_features(), MaxFeatures::Sqrt);
        assert!((config.bootstrap_fraction() - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.seed(), 42);
        assert_eq!(config.oob_mode(), OobMode::Disabled);
        assert!(config.n_classes().is_none());
    }

    #[test]
    fn zero_trees_rejected() {
        assert!(matches!(
            RandomForestConfig::new(0),
            Err(ClassifierError::InvalidTreeCount { n_trees: 0 })
        ));
    }

    #[test]
    fn setters_chain() {
        let config = RandomForestConfig::new(10)
            .unwrap()
            .with_seed(7)
            .with_max_depth(Some(4))
            .with_criterion(SplitCriterion::Entropy)
            .with_n_classes(Some(5));
        assert_eq!(config.seed(), 7);
        assert_eq!(config.max_depth(), Some(4));
        assert_eq!(config.criterion(), SplitCriterion::Entropy);
        assert_eq!(config.n_classes(), Some(5));
    }
}
