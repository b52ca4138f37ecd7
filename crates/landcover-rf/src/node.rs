/// Position of a spectral band in the sample vector, e.g. 6 for B8 in
/// `[B2, B3, B4, B5, B6, B7, B8, B11, B12]`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    serde::Serialize, serde::Deserialize,
)]
pub struct BandIndex(usize);

impl BandIndex {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }

    /// The band's name in `band_names`, if the index is in range.
    #[must_use]
    pub fn name(self, band_names: &[String]) -> Option<&str> {
        band_names.get(self.0).map(String::as_str)
    }
}

/// Position of a node in a tree's arena.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    serde::Serialize, serde::Deserialize,
)]
pub struct NodeIndex(usize);

impl NodeIndex {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Class mixing at a node under whichever criterion grew the tree.
#[derive(
    Debug, Clone, Copy, PartialEq, PartialOrd,
    serde::Serialize, serde::Deserialize,
)]
pub struct Impurity(f64);

impl Impurity {
    pub(crate) fn new(value: f64) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }

    /// A node holding a single land-cover class.
    #[must_use]
    pub fn is_pure(self) -> bool {
        self.0 == 0.0
    }
}

/// One node of a tree's arena.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Node {
    /// Reflectance threshold on one band: `value <= threshold` goes left.
    Split {
        band: BandIndex,
        threshold: f64,
        left: NodeIndex,
        right: NodeIndex,
        impurity: Impurity,
        /// Training pixels that reached this node.
        n_samples: usize,
        /// Weighted impurity decrease credited to `band`.
        impurity_decrease: f64,
    },
    /// Terminal node voting for `class`.
    Leaf {
        class: usize,
        /// Share of each class among the training pixels in the leaf.
        distribution: Vec<f64>,
        impurity: Impurity,
        n_samples: usize,
    },
}

impl Node {
    #[must_use]
    pub fn impurity(&self) -> Impurity {
        match self {
            Node::Split { impurity, .. } | Node::Leaf { impurity, .. } => *impurity,
        }
    }

    #[must_use]
    pub fn n_samples(&self) -> usize {
        match self {
            Node::Split { n_samples, .. } | Node::Leaf { n_samples, .. } => *n_samples,
        }
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }

    /// The band a split node tests; `None` for a leaf.
    #[must_use]
    pub fn band(&self) -> Option<BandIndex> {
        match self {
            Node::Split { band, .. } => Some(*band),
            Node::Leaf { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bands() -> Vec<String> {
        ["B2", "B4", "B8"].iter().map(|b| (*b).to_string()).collect()
    }

    #[test]
    fn band_index_names_its_band() {
        assert_eq!(BandIndex::new(2).name(&bands()), Some("B8"));
        assert_eq!(BandIndex::new(3).name(&bands()), None);
        assert!(BandIndex::new(1) < BandIndex::new(2));
    }

    #[test]
    fn purity_is_zero_impurity() {
        assert!(Impurity::new(0.0).is_pure());
        assert!(!Impurity::new(0.32).is_pure());
    }

    #[test]
    fn only_splits_test_a_band() {
        let water = Node::Leaf {
            class: 0,
            distribution: vec![1.0, 0.0, 0.0, 0.0, 0.0],
            impurity: Impurity::new(0.0),
            n_samples: 4,
        };
        assert!(water.is_leaf());
        assert_eq!(water.band(), None);
        assert_eq!(water.n_samples(), 4);

        let nir = Node::Split {
            band: BandIndex::new(2),
            threshold: 900.0,
            left: NodeIndex::new(1),
            right: NodeIndex::new(2),
            impurity: Impurity::new(0.5),
            n_samples: 8,
            impurity_decrease: 4.0,
        };
        assert!(!nir.is_leaf());
        assert_eq!(nir.band(), Some(BandIndex::new(2)));
        assert!((nir.impurity().value() - 0.5).abs() < f64::EPSILON);
    }
}
