/// Errors from boundary selection and geometry preparation.
#[derive(Debug, thiserror::Error)]
pub enum VectorError {
    /// Returned when a simplification tolerance is not a positive finite number.
    #[error("simplification tolerance must be positive and finite, got {tolerance}")]
    InvalidTolerance {
        /// The offending tolerance.
        tolerance: f64,
    },

    /// Returned when the second pass would be finer than the first.
    #[error("second simplification tolerance {second} is smaller than the first {first}")]
    NonMonotonicTolerance {
        /// Per-feature tolerance.
        first: f64,
        /// Dissolved-polygon tolerance.
        second: f64,
    },

    /// Returned when there are no features to dissolve.
    #[error("no boundary features to dissolve")]
    EmptyFeatureSet,

    /// Returned when simplification collapses every polygon to nothing.
    #[error("geometry collapsed to zero area during {stage}")]
    DegenerateGeometry {
        /// Which step collapsed it.
        stage: &'static str,
    },
}
