use crate::confusion::ConfusionMatrix;
use crate::error::ClassifierError;
use crate::predict::majority;
use crate::tree::DecisionTree;

/// Accuracy of the forest on samples left out of each tree's bag.
#[derive(Debug, Clone)]
pub struct OobScore {
    pub accuracy: f64,
    /// Rows are true classes, columns predicted classes.
    pub confusion_matrix: ConfusionMatrix,
    /// Samples that were out of bag for at least one tree.
    pub n_oob_samples: usize,
}

/// Majority vote over the trees for which each sample was out of bag.
///
/// Samples that landed in every bag are skipped.
pub(crate) fn compute_oob(
    trees: &[DecisionTree],
    samples: &[Vec<f64>],
    labels: &[usize],
    n_classes: usize,
    oob_per_tree: &[Vec<usize>],
) -> Result<OobScore, ClassifierError> {
    let mut votes = vec![vec![0usize; n_classes]; samples.len()];
    for (tree, oob) in trees.iter().zip(oob_per_tree) {
        for &i in oob {
            votes[i][tree.predict(&samples[i])?] += 1;
        }
    }

    let mut truth = Vec::new();
    let mut predicted = Vec::new();
    for (i, counts) in votes.iter().enumerate() {
        if counts.iter().all(|&c| c == 0) {
            continue;
        }
        truth.push(labels[i]);
        predicted.push(majority(counts));
    }

    if truth.is_empty() {
        return Err(ClassifierError::OobEvaluationFailed {
            reason: "every sample was drawn into every bag".to_string(),
        });
    }

    let confusion_matrix = ConfusionMatrix::from_labels(&truth, &predicted, n_classes)?;
    Ok(OobScore {
        accuracy: confusion_matrix.accuracy().unwrap_or(0.0),
        n_oob_samples: truth.len(),
        confusion_matrix,
    })
}
