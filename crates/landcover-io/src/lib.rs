//! Reading workflow inputs from disk and writing its results.
//!
//! Inputs are GeoJSON boundary and training layers plus a scene archive
//! (`collection.json` manifest next to single-band TIFFs). Outputs are JSON
//! reports, a per-class area CSV, the target polygon as GeoJSON and the
//! classified map as an 8-bit TIFF with a JSON grid sidecar.

mod artifact;
mod boundary_reader;
mod domain;
mod error;
mod scene_archive;
mod training_reader;
mod writer;

pub use artifact::{LABEL_NODATA, read_label_raster, unique_artifact_path, write_label_raster};
pub use boundary_reader::BoundaryReader;
pub use domain::{ExperimentName, LabeledPoint, TrainingSet};
pub use error::IoError;
pub use scene_archive::{SceneArchive, SceneEntry};
pub use training_reader::TrainingReader;
pub use writer::ResultWriter;
