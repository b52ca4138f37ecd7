//! Error matrix and the accuracy figures derived from it.
//!
//! Ratios whose denominator is zero are reported as `None` rather than
//! `NaN`, so callers can print "undefined" and serialize `null`.

use std::fmt;

use crate::error::ClassifierError;

/// Square error matrix: `rows[actual][predicted]` counts samples.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ConfusionMatrix {
    rows: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    /// Cross-tabulate actual against predicted labels.
    ///
    /// # Errors
    ///
    /// | Variant                                 | Condition                          |
    /// |-----------------------------------------|------------------------------------|
    /// | [`ClassifierError::EmptyDataset`]       | no labels                          |
    /// | [`ClassifierError::LabelCountMismatch`] | the two label slices differ in length |
    /// | [`ClassifierError::LabelOutOfRange`]    | a label is `>= n_classes`          |
    pub fn from_labels(
        actual: &[usize],
        predicted: &[usize],
        n_classes: usize,
    ) -> Result<Self, ClassifierError> {
        if actual.is_empty() {
            return Err(ClassifierError::EmptyDataset);
        }
        if actual.len() != predicted.len() {
            return Err(ClassifierError::LabelCountMismatch {
                n_samples: actual.len(),
                n_labels: predicted.len(),
            });
        }
        let mut rows = vec![vec![0usize; n_classes]; n_classes];
        for (&a, &p) in actual.iter().zip(predicted) {
            if let Some(&label) = [a, p].iter().find(|&&l| l >= n_classes) {
                return Err(ClassifierError::LabelOutOfRange { label, n_classes });
            }
            rows[a][p] += 1;
        }
        Ok(Self { rows })
    }

    /// A matrix with no samples; every derived figure is `None`.
    #[must_use]
    pub fn zeros(n_classes: usize) -> Self {
        Self {
            rows: vec![vec![0; n_classes]; n_classes],
        }
    }

    /// Sum of every cell.
    #[must_use]
    pub fn total(&self) -> usize {
        self.rows.iter().flatten().sum()
    }

    fn correct(&self) -> usize {
        (0..self.n_classes()).map(|c| self.rows[c][c]).sum()
    }

    /// Trace over total; `None` for an all-zero matrix.
    #[must_use]
    pub fn accuracy(&self) -> Option<f64> {
        ratio(self.correct(), self.total())
    }

    /// Per class: correct over the row total (how much of the class was found).
    #[must_use]
    pub fn producers_accuracy(&self) -> Vec<Option<f64>> {
        (0..self.n_classes())
            .map(|c| ratio(self.rows[c][c], self.rows[c].iter().sum()))
            .collect()
    }

    /// Per class: correct over the column total (how reliable the label is).
    #[must_use]
    pub fn consumers_accuracy(&self) -> Vec<Option<f64>> {
        (0..self.n_classes())
            .map(|c| ratio(self.rows[c][c], self.rows.iter().map(|row| row[c]).sum()))
            .collect()
    }

    /// Cohen's kappa; `None` when chance agreement is total or the matrix is empty.
    #[must_use]
    pub fn kappa(&self) -> Option<f64> {
        let total = self.total() as f64;
        let observed = self.accuracy()?;
        let expected: f64 = (0..self.n_classes())
            .map(|c| {
                let row: usize = self.rows[c].iter().sum();
                let col: usize = self.rows.iter().map(|r| r[c]).sum();
                row as f64 * col as f64
            })
            .sum::<f64>()
            / (total * total);
        if (1.0 - expected).abs() < f64::EPSILON {
            None
        } else {
            Some((observed - expected) / (1.0 - expected))
        }
    }

    #[must_use]
    pub fn as_rows(&self) -> &[Vec<usize>] {
        &self.rows
    }

    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.rows.len()
    }
}

fn ratio(num: usize, den: usize) -> Option<f64> {
    (den > 0).then(|| num as f64 / den as f64)
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>10}", "")?;
        for c in 0..self.n_classes() {
            write!(f, " pred_{c:<3}")?;
        }
        writeln!(f)?;
        for (c, row) in self.rows.iter().enumerate() {
            write!(f, "actual_{c:<3}")?;
            for count in row {
                write!(f, " {count:>8}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
