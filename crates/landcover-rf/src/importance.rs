/// A band with its share of the forest's total impurity decrease.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RankedBand {
    pub name: String,
    /// Normalized importance; sums to 1.0 across bands unless every tree is a single leaf.
    pub importance: f64,
    /// 1-based rank, 1 being the most important band.
    pub rank: usize,
}

/// Sum per-tree importances, renormalize, and rank bands by importance.
pub(crate) fn aggregate_importances(per_tree: &[Vec<f64>], band_names: &[String]) -> Vec<RankedBand> {
    let mut totals = vec![0.0f64; band_names.len()];
    for tree in per_tree {
        for (acc, &v) in totals.iter_mut().zip(tree) {
            *acc += v;
        }
    }
    let sum: f64 = totals.iter().sum();
    if sum > 0.0 {
        totals.iter_mut().for_each(|v| *v /= sum);
    }

    let mut ranked: Vec<RankedBand> = band_names
        .iter()
        .zip(totals)
        .map(|(name, importance)| RankedBand {
            name: name.clone(),
            importance,
            rank: 0,
        })
        .collect();
    // Stable sort keeps band order among equal scores.
    ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    for (i, band) in ranked.iter_mut().enumerate() {
        band.rank = i + 1;
    }
    ranked
}
