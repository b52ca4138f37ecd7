use std::path::PathBuf;

use landcover_io::IoError;
use landcover_raster::RasterError;
use landcover_rf::ClassifierError;
use landcover_vector::VectorError;

/// Errors from the computational stages. Any of these aborts the workflow.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Returned when the area filter selects no boundary feature.
    #[error("no matching boundary: {n_predicates} predicate(s) matched none of {n_features} feature(s)")]
    NoMatchingBoundary {
        /// Features in the boundary layer.
        n_features: usize,
        /// Predicates in the area filter.
        n_predicates: usize,
    },

    /// Returned when a training point carries a label outside 0..=4.
    #[error("training layer {layer:?} has a point labelled {class}; classes are 0..=4")]
    InvalidClass {
        /// Layer the point came from.
        layer: String,
        /// The offending label.
        class: u8,
    },

    /// Returned when every training layer is empty.
    #[error("the merged training sample has no points")]
    EmptyTrainingSample,

    /// Returned when no training point falls on a valid composite pixel.
    #[error("none of the {n_points} training points fall on a valid composite pixel")]
    NoSamples {
        /// Points in the merged sample.
        n_points: usize,
    },

    /// Returned when the random split leaves one side empty.
    #[error("the {partition} partition is empty ({n_samples} samples in total)")]
    EmptyPartition {
        /// `"training"` or `"testing"`.
        partition: &'static str,
        /// Samples before the split.
        n_samples: usize,
    },

    /// Returned when a workflow setting is out of range.
    #[error("invalid workflow configuration: {reason}")]
    InvalidConfig {
        /// What is wrong.
        reason: String,
    },

    /// Returned when an area filter file cannot be read.
    #[error("failed to read area filter {path}")]
    AreaFilterRead {
        /// File path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Returned when an area filter file is not valid JSON for the filter schema.
    #[error("failed to parse area filter {path}")]
    AreaFilterParse {
        /// File path.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Boundary selection or geometry preparation failed.
    #[error(transparent)]
    Vector(#[from] VectorError),

    /// Compositing, sampling, classification or area reduction failed.
    #[error(transparent)]
    Raster(#[from] RasterError),

    /// Training or prediction failed.
    #[error(transparent)]
    Classifier(#[from] ClassifierError),

    /// Reading inputs or writing results failed.
    #[error(transparent)]
    Io(#[from] IoError),
}

/// Errors from the export job, raised either at submission or through its status.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Returned when the description is not a usable artifact name.
    #[error("invalid export description {description:?}: {reason}")]
    InvalidDescription {
        /// The rejected description.
        description: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Returned when the export region is empty or has no area.
    #[error("invalid export region: {reason}")]
    InvalidRegion {
        /// Why the region was rejected.
        reason: &'static str,
    },

    /// Returned when the export scale is not a positive finite number.
    #[error("export scale must be positive and finite, got {scale}")]
    InvalidScale {
        /// The offending scale.
        scale: f64,
    },

    /// Returned when the export grid would exceed the pixel cap.
    #[error("export needs {pixels} pixels, more than the maximum of {max_pixels}")]
    TooManyPixels {
        /// Pixels the export grid would hold.
        pixels: u64,
        /// Configured cap.
        max_pixels: u64,
    },

    /// Returned when the artifact file cannot be reserved.
    #[error("failed to reserve export artifact {path}")]
    Reserve {
        /// Artifact path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Returned by [`crate::ExportHandle::wait`] when the job failed after submission.
    #[error("export {description:?} failed: {reason}")]
    JobFailed {
        /// Description of the failed job.
        description: String,
        /// Failure reported by the job.
        reason: String,
    },

    /// Returned when the worker stopped without reporting a final state.
    #[error("export {description:?} stopped without reporting a result")]
    WorkerLost {
        /// Description of the lost job.
        description: String,
    },
}

/// Errors from a single visual. The renderer logs these and moves on.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// Returned when a drawing backend fails.
    #[error("failed to draw {visual}: {reason}")]
    Draw {
        /// Visual being drawn.
        visual: &'static str,
        /// Backend error message.
        reason: String,
    },

    /// Returned when an image cannot be encoded or saved.
    #[error("failed to save {visual}")]
    Image {
        /// Visual being saved.
        visual: &'static str,
        /// Underlying image error.
        #[source]
        source: image::ImageError,
    },

    /// Returned when a file cannot be written.
    #[error("failed to write {path}")]
    Write {
        /// File path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Returned when the map manifest cannot be serialized.
    #[error("failed to serialize the map manifest")]
    Serialize(#[source] serde_json::Error),

    /// Returned when a visual needs a band the composite lacks.
    #[error(transparent)]
    Raster(#[from] RasterError),

    /// Returned when there is nothing to draw.
    #[error("nothing to draw for {visual}: {reason}")]
    Empty {
        /// Visual being drawn.
        visual: &'static str,
        /// Why it is empty.
        reason: &'static str,
    },
}
