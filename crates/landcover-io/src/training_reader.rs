//! Training point layer reader.

use std::path::{Path, PathBuf};

use geo::Geometry;
use tracing::{info, instrument};

use crate::boundary_reader::{feature_geometry, geometry_name, read_feature_collection};
use crate::domain::{LabeledPoint, TrainingSet};
use crate::IoError;

const CLASS_PROPERTY: &str = "Class";

/// Reads `<name>.geojson` training layers of Point features from a directory.
///
/// Every point needs an integer `Class` property in `0..=255`; which
/// classes are valid is for the caller to decide.
pub struct TrainingReader {
    dir: PathBuf,
}

impl TrainingReader {
    pub fn new(dir: &Path) -> Self {
        Self { dir: dir.to_path_buf() }
    }

    /// Read one layer by name.
    ///
    /// # Errors
    ///
    /// Everything [`BoundaryReader`](crate::BoundaryReader) reports, with
    /// `Point` as the only accepted geometry and `Class` as the only
    /// required property.
    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    pub fn read_set(&self, name: &str) -> Result<TrainingSet, IoError> {
        let path = self.dir.join(format!("{name}.geojson"));
        let features = read_feature_collection(&path)?;
        let points = features
            .iter()
            .enumerate()
            .map(|(index, feature)| {
                let point = match feature_geometry(&path, index, feature)? {
                    Geometry::Point(p) => p,
                    other => {
                        return Err(IoError::UnsupportedGeometry {
                            path: path.clone(),
                            index,
                            found: geometry_name(&other).to_string(),
                            expected: "Point",
                        });
                    }
                };
                let value = feature.property(CLASS_PROPERTY).ok_or_else(|| IoError::MissingProperty {
                    path: path.clone(),
                    index,
                    property: CLASS_PROPERTY,
                })?;
                let class = value
                    .as_u64()
                    .and_then(|c| u8::try_from(c).ok())
                    .ok_or_else(|| IoError::InvalidProperty {
                        path: path.clone(),
                        index,
                        property: CLASS_PROPERTY,
                        reason: format!("must be a small non-negative integer, got {value}"),
                    })?;
                Ok(LabeledPoint {
                    x: point.x(),
                    y: point.y(),
                    class,
                })
            })
            .collect::<Result<Vec<_>, IoError>>()?;
        info!(set = name, n_points = points.len(), "training layer read");
        Ok(TrainingSet {
            name: name.to_string(),
            points,
        })
    }

    /// Read several layers, in the order given.
    ///
    /// # Errors
    ///
    /// The first error from [`TrainingReader::read_set`].
    pub fn read_all<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<TrainingSet>, IoError> {
        names.iter().map(|n| self.read_set(n.as_ref())).collect()
    }
}
