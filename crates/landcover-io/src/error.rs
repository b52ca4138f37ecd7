use std::path::PathBuf;

use landcover_raster::RasterError;

/// Errors from reading inputs and writing results.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// Returned when an input file does not exist or is unreadable.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a file is not valid GeoJSON.
    #[error("invalid GeoJSON in {path}")]
    GeoJsonParse {
        /// Path to the file.
        path: PathBuf,
        /// Underlying GeoJSON error.
        source: geojson::Error,
    },

    /// Returned when GeoJSON is valid but not a FeatureCollection.
    #[error("{path} is not a GeoJSON FeatureCollection")]
    NotFeatureCollection {
        /// Path to the file.
        path: PathBuf,
    },

    /// Returned when a feature has no geometry.
    #[error("feature {index} in {path} has no geometry")]
    MissingGeometry {
        /// Path to the file.
        path: PathBuf,
        /// Zero-based feature index.
        index: usize,
    },

    /// Returned when a feature's geometry is of the wrong kind for the layer.
    #[error("feature {index} in {path} has a {found} geometry, expected {expected}")]
    UnsupportedGeometry {
        /// Path to the file.
        path: PathBuf,
        /// Zero-based feature index.
        index: usize,
        /// Geometry type found.
        found: String,
        /// Geometry type(s) accepted.
        expected: &'static str,
    },

    /// Returned when a required property is absent.
    #[error("feature {index} in {path} lacks property \"{property}\"")]
    MissingProperty {
        /// Path to the file.
        path: PathBuf,
        /// Zero-based feature index.
        index: usize,
        /// Property name.
        property: &'static str,
    },

    /// Returned when a property has the wrong type or range.
    #[error("feature {index} in {path}: property \"{property}\" {reason}")]
    InvalidProperty {
        /// Path to the file.
        path: PathBuf,
        /// Zero-based feature index.
        index: usize,
        /// Property name.
        property: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// Returned when a layer has no features at all.
    #[error("no features in {path}")]
    EmptyDataset {
        /// Path to the file.
        path: PathBuf,
    },

    /// Returned when the scene manifest cannot be parsed.
    #[error("invalid scene manifest {path}")]
    ManifestParse {
        /// Path to the manifest.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// Returned when the scene manifest parses but is inconsistent.
    #[error("scene manifest {path}: {reason}")]
    InvalidManifest {
        /// Path to the manifest.
        path: PathBuf,
        /// What is inconsistent.
        reason: String,
    },

    /// Returned when a band image cannot be decoded or encoded.
    #[error("cannot process image {path}")]
    Image {
        /// Path to the image.
        path: PathBuf,
        /// Underlying image error.
        source: image::ImageError,
    },

    /// Returned when a band image is not single-channel 8- or 16-bit.
    #[error("{path} has pixel format {format}, expected 8- or 16-bit grayscale")]
    UnsupportedPixelFormat {
        /// Path to the image.
        path: PathBuf,
        /// Format found.
        format: String,
    },

    /// Returned when an image's size disagrees with its grid.
    #[error("{path} is {got_width}x{got_height}, grid is {width}x{height}")]
    ImageSizeMismatch {
        /// Path to the image.
        path: PathBuf,
        /// Grid width.
        width: usize,
        /// Grid height.
        height: usize,
        /// Image width.
        got_width: u32,
        /// Image height.
        got_height: u32,
    },

    /// Returned when decoded pixels do not form a valid raster.
    #[error("invalid raster from {path}")]
    Raster {
        /// Path being read.
        path: PathBuf,
        /// Underlying raster error.
        source: RasterError,
    },

    /// Returned when the experiment name contains characters outside `[a-zA-Z0-9_-]`.
    #[error("invalid experiment name \"{name}\": must match [a-zA-Z0-9_-]+")]
    InvalidExperimentName {
        /// The invalid name.
        name: String,
    },

    /// Returned when the output directory cannot be created.
    #[error("cannot create output directory {path}")]
    OutputDirCreate {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a result file cannot be written.
    #[error("cannot write file {path}")]
    WriteFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when writing CSV fails.
    #[error("cannot write CSV {path}")]
    CsvWrite {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// Returned when a value cannot be serialized to JSON.
    #[error("cannot serialize {what}")]
    Serialize {
        /// What was being serialized.
        what: &'static str,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
}
