use crate::error::RasterError;
use crate::grid::Grid;

/// Per-pixel class labels; `None` where the input was masked.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelImage {
    grid: Grid,
    labels: Vec<Option<u8>>,
}

impl LabelImage {
    /// # Errors
    ///
    /// Returns [`RasterError::BandLengthMismatch`] when `labels` does not
    /// cover the grid exactly.
    pub fn new(grid: Grid, labels: Vec<Option<u8>>) -> Result<Self, RasterError> {
        grid.validate()?;
        if labels.len() != grid.n_pixels() {
            return Err(RasterError::BandLengthMismatch {
                band: "labels".to_string(),
                expected: grid.n_pixels(),
                got: labels.len(),
            });
        }
        Ok(Self { grid, labels })
    }

    pub(crate) fn from_parts(grid: Grid, labels: Vec<Option<u8>>) -> Self {
        debug_assert_eq!(labels.len(), grid.n_pixels());
        Self { grid, labels }
    }

    #[must_use]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Row-major labels.
    #[must_use]
    pub fn labels(&self) -> &[Option<u8>] {
        &self.labels
    }

    #[must_use]
    pub fn get(&self, col: usize, row: usize) -> Option<u8> {
        if col >= self.grid.width || row >= self.grid.height {
            return None;
        }
        self.labels[self.grid.index(col, row)]
    }

    /// Label of the pixel containing a map coordinate.
    #[must_use]
    pub fn at(&self, x: f64, y: f64) -> Option<u8> {
        self.grid.locate(x, y).and_then(|(col, row)| self.get(col, row))
    }

    #[must_use]
    pub fn n_classified(&self) -> usize {
        self.labels.iter().flatten().count()
    }

    /// Pixel count per class, for classes `0..n_classes`; larger labels are ignored.
    #[must_use]
    pub fn counts(&self, n_classes: usize) -> Vec<usize> {
        let mut counts = vec![0; n_classes];
        for &label in self.labels.iter().flatten() {
            if let Some(c) = counts.get_mut(usize::from(label)) {
                *c += 1;
            }
        }
        counts
    }
}
