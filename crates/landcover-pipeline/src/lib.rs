//! Supervised land-cover classification over an administrative area.
//!
//! A [`Workflow`] binds the boundary layer, the per-class training layers and
//! a scene collection to a [`WorkflowConfig`], then evaluates its stages on
//! demand: boundary selection, geometry preparation, median compositing,
//! sampling, random forest training, accuracy assessment, full-image
//! classification and per-class area. The classified map leaves through an
//! [`ExportService`] job; the [`Renderer`] draws the presentation outputs.

mod classes;
mod config;
mod error;
mod evaluate;
mod export;
mod memo;
mod render;
mod samples;
mod workflow;

pub use classes::{LandCoverClass, N_CLASSES};
pub use config::{AreaFilterSpec, ExportSettings, PresentationConfig, RgbStretch, WorkflowConfig};
pub use error::{ExportError, PipelineError, RenderError};
pub use evaluate::{AccuracyReport, ReportedBand, evaluate};
pub use export::{ExportDescription, ExportHandle, ExportRequest, ExportService, ExportState};
pub use memo::Memo;
pub use render::{RenderInputs, RenderSummary, RenderedVisual, Renderer, SkippedVisual, Visual};
pub use samples::{MergedSample, Partition, Sample, SampleTable, TRAIN_THRESHOLD, TrainingSets, to_columns};
pub use workflow::{ClippedComposite, Workflow};
