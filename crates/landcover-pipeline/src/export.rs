//! Classified-map export as a background job with observable status.
//!
//! Submission validates the request and reserves the artifact name, then a
//! worker thread resamples the labels onto the export grid and writes them.
//! The caller polls the returned handle or blocks on it.

use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread;

use crossbeam_channel::{Receiver, TryRecvError, unbounded};
use geo::{Area, BoundingRect, Contains, MultiPolygon, Point};
use landcover_io::{unique_artifact_path, write_label_raster};
use landcover_raster::{Grid, LabelImage};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::config::ExportSettings;
use crate::error::ExportError;

const MAX_DESCRIPTION_LEN: usize = 100;

/// Validated artifact name.
///
/// Up to 100 characters from `A-Z a-z 0-9 _ . , : ; @ -`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportDescription(String);

impl ExportDescription {
    /// # Errors
    ///
    /// Returns [`ExportError::InvalidDescription`] for an empty, overlong or
    /// otherwise unusable name.
    pub fn new(description: impl Into<String>) -> Result<Self, ExportError> {
        let description = description.into();
        let reason = if description.is_empty() {
            Some("must not be empty")
        } else if description.len() > MAX_DESCRIPTION_LEN {
            Some("must be at most 100 characters")
        } else if !description
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_.,:;@-".contains(c))
        {
            Some("may only contain letters, digits and _ . , : ; @ -")
        } else if description.starts_with('.') {
            Some("must not start with a dot")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(ExportError::InvalidDescription { description, reason }),
            None => Ok(Self(description)),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ExportDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything one export needs besides the labels.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub description: ExportDescription,
    pub scale: f64,
    pub region: MultiPolygon<f64>,
    pub max_pixels: u64,
}

impl ExportRequest {
    /// Build a request from the configured settings.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::InvalidDescription`] for a bad description.
    pub fn from_settings(settings: &ExportSettings, region: MultiPolygon<f64>) -> Result<Self, ExportError> {
        Ok(Self {
            description: ExportDescription::new(settings.description.clone())?,
            scale: settings.scale,
            region,
            max_pixels: settings.max_pixels,
        })
    }
}

/// Lifecycle of an export job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ExportState {
    Pending,
    Running,
    Succeeded { path: PathBuf },
    Failed { reason: String },
}

impl ExportState {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExportState::Succeeded { .. } | ExportState::Failed { .. })
    }
}

/// Starts export jobs that write into one directory.
#[derive(Debug, Clone)]
pub struct ExportService {
    output_dir: PathBuf,
}

impl ExportService {
    #[must_use]
    pub fn new(output_dir: &Path) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
        }
    }

    /// Validate `request`, reserve the artifact and start the job.
    ///
    /// A description that already names an artifact gets a `-1`, `-2`, ...
    /// suffix; existing artifacts are never overwritten.
    ///
    /// # Errors
    ///
    /// | Variant                        | Condition                              |
    /// |--------------------------------|----------------------------------------|
    /// | [`ExportError::InvalidRegion`] | region has no polygons or zero area    |
    /// | [`ExportError::InvalidScale`]  | scale is not positive and finite       |
    /// | [`ExportError::TooManyPixels`] | export grid exceeds `max_pixels`       |
    /// | [`ExportError::Reserve`]       | the artifact file cannot be created    |
    #[instrument(skip_all, fields(description = %request.description, scale = request.scale))]
    pub fn submit(&self, labels: &LabelImage, request: ExportRequest) -> Result<ExportHandle, ExportError> {
        let grid = export_grid(&request)?;
        let pixels = grid.n_pixels() as u64;
        if pixels > request.max_pixels {
            return Err(ExportError::TooManyPixels {
                pixels,
                max_pixels: request.max_pixels,
            });
        }

        let path = reserve_artifact(&self.output_dir, request.description.as_str())?;

        let (tx, rx) = unbounded();
        let labels = labels.clone();
        let worker_path = path.clone();
        let description = request.description.to_string();
        thread::spawn(move || {
            let _ = tx.send(ExportState::Running);
            let state = match run_export(&labels, &request.region, grid, &worker_path) {
                Ok(()) => ExportState::Succeeded { path: worker_path },
                Err(reason) => {
                    // Release the reserved name so a retry can reuse it.
                    let _ = std::fs::remove_file(&worker_path);
                    ExportState::Failed { reason }
                }
            };
            let _ = tx.send(state);
        });

        info!(path = %path.display(), pixels, "export submitted");
        Ok(ExportHandle {
            description,
            path,
            state: ExportState::Pending,
            updates: rx,
        })
    }
}

/// Create the first free `stem`, `stem-1`, ... artifact file in `dir`.
///
/// A name taken between the lookup and the create moves on to the next
/// suffix, so concurrent submits with one description all succeed.
fn reserve_artifact(dir: &Path, stem: &str) -> Result<PathBuf, ExportError> {
    loop {
        let path = unique_artifact_path(dir, stem, "tif");
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => return Ok(path),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                debug!(path = %path.display(), "artifact name taken concurrently");
            }
            Err(source) => return Err(ExportError::Reserve { path, source }),
        }
    }
}

/// The export grid: `scale`-sized cells covering the region's bounding box.
fn export_grid(request: &ExportRequest) -> Result<Grid, ExportError> {
    if !request.scale.is_finite() || request.scale <= 0.0 {
        return Err(ExportError::InvalidScale { scale: request.scale });
    }
    let bbox = request.region.bounding_rect().ok_or(ExportError::InvalidRegion {
        reason: "region has no polygons",
    })?;
    if request.region.unsigned_area() <= 0.0 {
        return Err(ExportError::InvalidRegion {
            reason: "region has zero area",
        });
    }
    let width = (bbox.width() / request.scale).ceil().max(1.0) as usize;
    let height = (bbox.height() / request.scale).ceil().max(1.0) as usize;
    Grid::new(bbox.min().x, bbox.max().y, request.scale, width, height).map_err(|_| ExportError::InvalidRegion {
        reason: "region does not define a valid grid",
    })
}

/// Nearest-neighbour resample onto `grid`, masking cells outside `region`.
fn run_export(labels: &LabelImage, region: &MultiPolygon<f64>, grid: Grid, path: &Path) -> Result<(), String> {
    let mut resampled = Vec::with_capacity(grid.n_pixels());
    for row in 0..grid.height {
        for col in 0..grid.width {
            let (x, y) = grid.pixel_centre(col, row);
            let label = if region.contains(&Point::new(x, y)) {
                labels.at(x, y)
            } else {
                None
            };
            resampled.push(label);
        }
    }
    let image = LabelImage::new(grid, resampled).map_err(|e| e.to_string())?;
    debug!(n_classified = image.n_classified(), "labels resampled to the export grid");
    write_label_raster(path, &image).map_err(|e| e.to_string())
}

/// Status channel of a submitted export.
#[derive(Debug)]
pub struct ExportHandle {
    description: String,
    path: PathBuf,
    state: ExportState,
    updates: Receiver<ExportState>,
}

impl ExportHandle {
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Where the artifact is written on success.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply any status updates that have arrived and return the latest state.
    pub fn poll(&mut self) -> &ExportState {
        loop {
            match self.updates.try_recv() {
                Ok(state) => self.state = state,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.state.is_terminal() {
                        self.state = ExportState::Failed {
                            reason: "worker stopped without reporting a result".into(),
                        };
                    }
                    break;
                }
            }
        }
        &self.state
    }

    /// Block until the job finishes.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::JobFailed`] with the job's reason, or
    /// [`ExportError::WorkerLost`] if the worker vanished.
    pub fn wait(mut self) -> Result<PathBuf, ExportError> {
        while !self.state.is_terminal() {
            match self.updates.recv() {
                Ok(state) => self.state = state,
                Err(_) => {
                    warn!(description = %self.description, "export worker disconnected");
                    return Err(ExportError::WorkerLost {
                        description: self.description,
                    });
                }
            }
        }
        match self.state {
            ExportState::Succeeded { path } => {
                info!(path = %path.display(), "export succeeded");
                Ok(path)
            }
            ExportState::Failed { reason } => Err(ExportError::JobFailed {
                description: self.description,
                reason,
            }),
            ExportState::Pending | ExportState::Running => Err(ExportError::WorkerLost {
                description: self.description,
            }),
        }
    }
}
