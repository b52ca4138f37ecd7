use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::error::ClassifierError;
use crate::forest::RandomForest;

/// Leaf class shares averaged over every tree, for one band vector.
#[derive(Debug, Clone)]
pub struct ClassDistribution {
    probs: Vec<f64>,
}

impl ClassDistribution {
    pub(crate) fn new(probs: Vec<f64>) -> Self {
        Self { probs }
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.probs
    }
}

/// Class with the most votes. Ties go to the lower class index.
pub(crate) fn majority(votes: &[usize]) -> usize {
    let mut best = 0;
    for (class, &v) in votes.iter().enumerate() {
        if v > votes[best] {
            best = class;
        }
    }
    best
}

impl RandomForest {
    /// Classify one band vector by majority vote over the trees.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifierError::PredictionFeatureMismatch`] when the vector length is wrong.
    pub fn predict(&self, sample: &[f64]) -> Result<usize, ClassifierError> {
        Ok(majority(&self.votes(sample)?))
    }

    /// Number of trees voting for each class.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifierError::PredictionFeatureMismatch`] when the vector length is wrong.
    pub fn votes(&self, sample: &[f64]) -> Result<Vec<usize>, ClassifierError> {
        self.check_width(sample)?;
        let mut votes = vec![0usize; self.n_classes];
        for tree in &self.trees {
            votes[tree.predict(sample)?] += 1;
        }
        Ok(votes)
    }

    /// Mean of the leaf distributions reached in every tree.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifierError::PredictionFeatureMismatch`] when the vector length is wrong.
    pub fn predict_proba(&self, sample: &[f64]) -> Result<ClassDistribution, ClassifierError> {
        self.check_width(sample)?;
        let mut sum = vec![0.0f64; self.n_classes];
        for tree in &self.trees {
            for (acc, p) in sum.iter_mut().zip(tree.predict_proba(sample)?) {
                *acc += p;
            }
        }
        let n = self.trees.len() as f64;
        sum.iter_mut().for_each(|v| *v /= n);
        Ok(ClassDistribution::new(sum))
    }

    /// Classify many band vectors in parallel, preserving order.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifierError::PredictionFeatureMismatch`] if any vector has the wrong length.
    pub fn predict_batch(&self, samples: &[Vec<f64>]) -> Result<Vec<usize>, ClassifierError> {
        samples.into_par_iter().map(|s| self.predict(s)).collect()
    }

    fn check_width(&self, sample: &[f64]) -> Result<(), ClassifierError> {
        if sample.len() != self.n_features {
            return Err(ClassifierError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: sample.len(),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Band names in the column order the forest expects.
    #[must_use]
    pub fn band_names(&self) -> &[String] {
        &self.band_names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{BandIndex, Impurity, Node, NodeIndex};
    use crate::tree::DecisionTree;

    fn leaf(class: usize, distribution: Vec<f64>) -> Node {
        Node::Leaf {
            class,
            distribution,
            impurity: Impurity::new(0.0),
            n_samples: 10,
        }
    }

    /// One split on band 0 at 500; each side is a leaf.
    fn stump(low: Node, high: Node) -> DecisionTree {
        DecisionTree {
            nodes: vec![
                Node::Split {
                    band: BandIndex::new(0),
                    threshold: 500.0,
                    left: NodeIndex::new(1),
                    right: NodeIndex::new(2),
                    impurity: Impurity::new(0.5),
                    n_samples: 20,
                    impurity_decrease: 10.0,
                },
                low,
                high,
            ],
            n_features: 1,
            n_classes: 3,
        }
    }

    #[test]
    fn tie_goes_to_lower_class() {
        assert_eq!(majority(&[1, 4, 4, 1]), 1);
        assert_eq!(majority(&[0, 0, 0]), 0);
    }

    #[test]
    fn vote_outweighs_averaged_shares() {
        // Two trees lean narrowly to water, one is certain of cropland:
        // averaged shares favour cropland, the vote picks water.
        let lean_water = || stump(leaf(0, vec![0.55, 0.0, 0.45]), leaf(1, vec![0.0, 1.0, 0.0]));
        let sure_crop = stump(leaf(2, vec![0.0, 0.0, 1.0]), leaf(1, vec![0.0, 1.0, 0.0]));
        let forest = RandomForest {
            trees: vec![lean_water(), lean_water(), sure_crop],
            n_features: 1,
            n_classes: 3,
            band_names: vec!["B8".to_string()],
        };

        let sample = [300.0];
        let proba = forest.predict_proba(&sample).unwrap();
        assert!(proba.as_slice()[2] > proba.as_slice()[0]);
        assert_eq!(forest.votes(&sample).unwrap(), vec![2, 0, 1]);
        assert_eq!(forest.predict(&sample).unwrap(), 0);
        assert_eq!(forest.predict_batch(&[vec![300.0], vec![800.0]]).unwrap(), vec![0, 1]);
    }

    #[test]
    fn wrong_width_rejected_before_voting() {
        let forest = RandomForest {
            trees: vec![stump(leaf(0, vec![1.0, 0.0, 0.0]), leaf(1, vec![0.0, 1.0, 0.0]))],
            n_features: 1,
            n_classes: 3,
            band_names: vec!["B8".to_string()],
        };
        assert!(matches!(
            forest.votes(&[1.0, 2.0]),
            Err(ClassifierError::PredictionFeatureMismatch { expected: 1, got: 2 })
        ));
    }
}
