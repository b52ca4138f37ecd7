use rand::Rng;

use crate::node::{BandIndex, Impurity};

/// Criterion for measuring the quality of a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SplitCriterion {
    /// Gini impurity: 1 - Σ(p_i²)
    Gini,
    /// Information entropy: -Σ(p_i · ln(p_i))
    Entropy,
}

impl SplitCriterion {
    /// Impurity of a node from its class counts; zero for an empty node.
    #[must_use]
    pub fn impurity(&self, class_counts: &[usize], n_samples: usize) -> Impurity {
        if n_samples == 0 {
            return Impurity::new(0.0);
        }
        let n = n_samples as f64;
        let value = match self {
            SplitCriterion::Gini => {
                1.0 - class_counts
                    .iter()
                    .map(|&c| {
                        let p = c as f64 / n;
                        p * p
                    })
                    .sum::<f64>()
            }
            SplitCriterion::Entropy => -class_counts
                .iter()
                .filter(|&&c| c > 0)
                .map(|&c| {
                    let p = c as f64 / n;
                    p * p.ln()
                })
                .sum::<f64>(),
        };
        Impurity::new(value)
    }
}

/// Best split found for a node.
#[derive(Debug, Clone)]
pub(crate) struct SplitResult {
    pub(crate) band: BandIndex,
    pub(crate) threshold: f64,
    /// `n·I(parent) - n_l·I(left) - n_r·I(right)`.
    pub(crate) impurity_decrease: f64,
    pub(crate) left_indices: Vec<usize>,
    pub(crate) right_indices: Vec<usize>,
}

/// Exhaustive threshold search over a random subset of `max_features` bands.
///
/// `columns[band][sample]` is column-major; `indices` select the rows that
/// reached the node. Returns `None` when every candidate band is constant
/// over those rows or every boundary would leave a child smaller than
/// `min_samples_leaf`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn find_best_split(
    columns: &[Vec<f64>],
    labels: &[usize],
    indices: &[usize],
    n_classes: usize,
    criterion: &SplitCriterion,
    max_features: usize,
    min_samples_leaf: usize,
    rng: &mut impl Rng,
) -> Option<SplitResult> {
    let n_features = columns.len();
    let n_samples = indices.len();
    if n_samples < 2 || n_features == 0 {
        return None;
    }

    let mut parent_counts = vec![0usize; n_classes];
    for &i in indices {
        parent_counts[labels[i]] += 1;
    }
    let parent_impurity = criterion.impurity(&parent_counts, n_samples).value();

    // Partial Fisher-Yates over band indices.
    let take = max_features.min(n_features);
    let mut order: Vec<usize> = (0..n_features).collect();
    for i in 0..take {
        let j = rng.gen_range(i..n_features);
        order.swap(i, j);
    }

    let mut best_decrease = f64::NEG_INFINITY;
    let mut best: Option<(usize, f64)> = None;

    for &band in &order[..take] {
        let column = &columns[band];
        let mut sorted: Vec<(f64, usize)> = indices.iter().map(|&i| (column[i], labels[i])).collect();
        sorted.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

        let mut left_counts = vec![0usize; n_classes];
        let mut right_counts = parent_counts.clone();

        for i in 0..n_samples - 1 {
            let (value, class) = sorted[i];
            left_counts[class] += 1;
            right_counts[class] -= 1;

            let next = sorted[i + 1].0;
            if value == next {
                continue;
            }
            let n_left = i + 1;
            let n_right = n_samples - n_left;
            if n_left < min_samples_leaf || n_right < min_samples_leaf {
                continue;
            }

            let decrease = n_samples as f64 * parent_impurity
                - n_left as f64 * criterion.impurity(&left_counts, n_left).value()
                - n_right as f64 * criterion.impurity(&right_counts, n_right).value();

            if decrease > best_decrease {
                best_decrease = decrease;
                best = Some((band, (value + next) / 2.0));
            }
        }
    }

    let (band, threshold) = best?;
    let (left_indices, right_indices): (Vec<usize>, Vec<usize>) =
        indices.iter().copied().partition(|&i| columns[band][i] <= threshold);

    Some(SplitResult {
        band: BandIndex::new(band),
        threshold,
        impurity_decrease: best_decrease,
        left_indices,
        right_indices,
    })
}
