//! Accuracy assessment on the held-out partition.

use std::fmt;

use landcover_rf::{ConfusionMatrix, RandomForestResult, RankedBand};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::classes::{LandCoverClass, N_CLASSES};
use crate::error::PipelineError;
use crate::samples::{Sample, to_columns};

/// Confusion matrix and accuracy figures for the testing partition.
///
/// Undefined ratios (a class never present, or never predicted) are `None`,
/// serialized as `null` and printed as `undefined`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccuracyReport {
    pub class_names: Vec<String>,
    /// `confusion_matrix[true][predicted]`.
    pub confusion_matrix: Vec<Vec<usize>>,
    pub n_test: usize,
    pub overall_accuracy: Option<f64>,
    pub kappa: Option<f64>,
    pub producers_accuracy: Vec<Option<f64>>,
    pub consumers_accuracy: Vec<Option<f64>>,
    pub oob_accuracy: Option<f64>,
    pub band_importances: Vec<ReportedBand>,
}

/// A band and its share of the forest's impurity decrease.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportedBand {
    pub name: String,
    pub importance: f64,
    pub rank: usize,
}

impl From<&RankedBand> for ReportedBand {
    fn from(band: &RankedBand) -> Self {
        Self {
            name: band.name.clone(),
            importance: band.importance,
            rank: band.rank,
        }
    }
}

impl AccuracyReport {
    /// Derive every figure from a confusion matrix.
    #[must_use]
    pub fn from_matrix(matrix: &ConfusionMatrix) -> Self {
        Self {
            class_names: LandCoverClass::names().iter().map(|n| (*n).to_string()).collect(),
            confusion_matrix: matrix.as_rows().to_vec(),
            n_test: matrix.total(),
            overall_accuracy: matrix.accuracy(),
            kappa: matrix.kappa(),
            producers_accuracy: matrix.producers_accuracy(),
            consumers_accuracy: matrix.consumers_accuracy(),
            oob_accuracy: None,
            band_importances: Vec::new(),
        }
    }

    /// Attach the training-side figures of `model`.
    #[must_use]
    pub fn with_model_details(mut self, model: &RandomForestResult) -> Self {
        self.oob_accuracy = model.oob_score().map(|s| s.accuracy);
        self.band_importances = model.importances().iter().map(ReportedBand::from).collect();
        self
    }
}

/// Classify `testing` with the trained forest and cross-tabulate.
///
/// # Errors
///
/// Returns a classifier error if a sample has the wrong band count.
///
/// An empty `testing` partition is not an error: the matrix is all zeros and
/// every accuracy figure is undefined.
#[instrument(skip_all, fields(n_test = testing.len()))]
pub fn evaluate(model: &RandomForestResult, testing: &[Sample], n_samples: usize) -> Result<AccuracyReport, PipelineError> {
    if testing.is_empty() {
        warn!(n_samples, "no sample drew a testing value; accuracy is undefined");
        return Ok(AccuracyReport::from_matrix(&ConfusionMatrix::zeros(N_CLASSES)).with_model_details(model));
    }
    let (values, actual) = to_columns(testing);
    let predicted = model.forest().predict_batch(&values)?;
    let matrix = ConfusionMatrix::from_labels(&actual, &predicted, N_CLASSES)?;
    let report = AccuracyReport::from_matrix(&matrix).with_model_details(model);
    info!(
        overall_accuracy = ?report.overall_accuracy,
        kappa = ?report.kappa,
        "classifier evaluated on the testing partition"
    );
    Ok(report)
}

struct Ratio(Option<f64>);

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(v) => write!(f, "{v:.4}"),
            None => f.write_str("undefined"),
        }
    }
}

impl fmt::Display for AccuracyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.class_names.iter().map(String::len).max().unwrap_or(0).max(10);
        writeln!(f, "Confusion Matrix (rows: true class, columns: predicted class):")?;
        write!(f, "{:width$}", "")?;
        for name in &self.class_names {
            write!(f, " {name:>width$}")?;
        }
        writeln!(f)?;
        for (name, row) in self.class_names.iter().zip(&self.confusion_matrix) {
            write!(f, "{name:<width$}")?;
            for count in row {
                write!(f, " {count:>width$}")?;
            }
            writeln!(f)?;
        }
        writeln!(f, "Overall Accuracy: {}", Ratio(self.overall_accuracy))?;
        writeln!(f, "Kappa: {}", Ratio(self.kappa))?;
        for (label, values) in [
            ("Producer Accuracy", &self.producers_accuracy),
            ("Consumer Accuracy", &self.consumers_accuracy),
        ] {
            write!(f, "{label}:")?;
            for (name, v) in self.class_names.iter().zip(values) {
                write!(f, " {name}={}", Ratio(*v))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(actual: &[usize], predicted: &[usize]) -> AccuracyReport {
        AccuracyReport::from_matrix(&ConfusionMatrix::from_labels(actual, predicted, N_CLASSES).unwrap())
    }

    #[test]
    fn absent_class_is_undefined_not_zero() {
        // No cropland (3) in the reference labels, and nothing predicted as it.
        let r = report(&[0, 0, 1, 2, 4], &[0, 1, 1, 2, 4]);
        assert_eq!(r.n_test, 5);
        assert_eq!(r.overall_accuracy, Some(0.8));
        assert_eq!(r.producers_accuracy[3], None);
        assert_eq!(r.consumers_accuracy[3], None);
        assert_eq!(r.producers_accuracy[0], Some(0.5));
        assert_eq!(r.consumers_accuracy[1], Some(0.5));
    }

    #[test]
    fn undefined_serializes_as_null() {
        let r = report(&[0, 1], &[0, 1]);
        let json = serde_json::to_value(&r).unwrap();
        assert!(json["producers_accuracy"][2].is_null());
        assert_eq!(json["overall_accuracy"], 1.0);
        assert_eq!(json["class_names"][1], "Build up");
    }

    #[test]
    fn display_prints_undefined() {
        let text = report(&[0, 4], &[0, 0]).to_string();
        assert!(text.contains("Overall Accuracy: 0.5000"));
        assert!(text.contains("Crop Land=undefined"));
        assert!(text.contains("Vegetation=0.0000"));
    }

    #[test]
    fn matrix_sum_matches_sample_count() {
        let r = report(&[0, 1, 2, 3, 4, 4, 4], &[0, 1, 2, 4, 4, 3, 4]);
        let sum: usize = r.confusion_matrix.iter().flatten().sum();
        assert_eq!(sum, 7);
        assert_eq!(r.n_test, 7);
        let accuracy = r.overall_accuracy.unwrap();
        assert!((0.0..=1.0).contains(&accuracy));
    }
}
