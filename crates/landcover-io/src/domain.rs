use crate::IoError;

/// A validated name used as the prefix of every output file.
///
/// Must match `[a-zA-Z0-9_-]+`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentName(String);

impl ExperimentName {
    /// # Errors
    ///
    /// Returns [`IoError::InvalidExperimentName`] if the name is empty or
    /// contains characters outside `[a-zA-Z0-9_-]`.
    pub fn new(name: String) -> Result<Self, IoError> {
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            return Err(IoError::InvalidExperimentName { name });
        }
        Ok(Self(name))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ExperimentName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A training point with its integer `Class` label.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct LabeledPoint {
    pub x: f64,
    pub y: f64,
    pub class: u8,
}

/// One named layer of training points, e.g. `water`.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSet {
    pub name: String,
    pub points: Vec<LabeledPoint>,
}
