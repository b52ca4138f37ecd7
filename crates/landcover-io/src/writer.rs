//! Result files for one workflow run.

use std::fs;
use std::path::{Path, PathBuf};

use geojson::{Feature, FeatureCollection, GeoJson, JsonObject};
use landcover_raster::ClassAreas;
use landcover_vector::TargetGeometry;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::ExperimentName;

/// Writes run outputs into one directory, each file prefixed by the experiment name.
///
/// | File                          | Content                                   |
/// |-------------------------------|-------------------------------------------|
/// | `{experiment}_evaluation.json` | confusion matrix and accuracy report     |
/// | `{experiment}_areas.csv`       | hectares per class                       |
/// | `{experiment}_target.geojson`  | the dissolved, simplified target polygon |
/// | `{experiment}_summary.json`    | the run summary printed to stdout        |
/// | `{experiment}_model.bin`       | the trained forest, when saved           |
pub struct ResultWriter {
    output_dir: PathBuf,
    experiment: ExperimentName,
}

impl ResultWriter {
    /// # Errors
    ///
    /// Returns [`IoError::OutputDirCreate`] if the directory cannot be created.
    #[instrument(skip_all, fields(dir = %output_dir.display(), experiment = %experiment))]
    pub fn new(output_dir: &Path, experiment: ExperimentName) -> Result<Self, IoError> {
        fs::create_dir_all(output_dir).map_err(|source| IoError::OutputDirCreate {
            path: output_dir.to_path_buf(),
            source,
        })?;
        debug!("output directory ready");
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            experiment,
        })
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn path_for(&self, suffix: &str) -> PathBuf {
        self.output_dir.join(format!("{}_{suffix}", self.experiment.as_str()))
    }

    /// Where the trained model goes.
    #[must_use]
    pub fn model_path(&self) -> PathBuf {
        self.path_for("model.bin")
    }

    fn write_json<T: Serialize>(&self, suffix: &str, what: &'static str, value: &T) -> Result<PathBuf, IoError> {
        let path = self.path_for(suffix);
        let json = serde_json::to_string_pretty(value).map_err(|source| IoError::Serialize { what, source })?;
        fs::write(&path, json).map_err(|source| IoError::WriteFile {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), "{what} written");
        Ok(path)
    }

    /// # Errors
    ///
    /// [`IoError::Serialize`] or [`IoError::WriteFile`].
    #[instrument(skip_all)]
    pub fn write_evaluation<T: Serialize>(&self, report: &T) -> Result<PathBuf, IoError> {
        self.write_json("evaluation.json", "evaluation report", report)
    }

    /// # Errors
    ///
    /// [`IoError::Serialize`] or [`IoError::WriteFile`].
    #[instrument(skip_all)]
    pub fn write_summary<T: Serialize>(&self, summary: &T) -> Result<PathBuf, IoError> {
        self.write_json("summary.json", "run summary", summary)
    }

    /// One row per class plus an `unclassified` row with an empty class id.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::CsvWrite`] if the file cannot be written.
    #[instrument(skip_all)]
    pub fn write_areas(&self, class_names: &[&str], areas: &ClassAreas) -> Result<PathBuf, IoError> {
        let path = self.path_for("areas.csv");
        let csv_err = |source: csv::Error| IoError::CsvWrite {
            path: path.clone(),
            source,
        };
        let mut writer = csv::Writer::from_path(&path).map_err(csv_err)?;
        writer.write_record(["class", "name", "hectares"]).map_err(csv_err)?;
        for (class, ha) in areas.hectares.iter().enumerate() {
            let name = class_names.get(class).copied().unwrap_or("");
            writer
                .write_record([class.to_string(), name.to_string(), format!("{ha:.4}")])
                .map_err(csv_err)?;
        }
        writer
            .write_record([String::new(), "unclassified".to_string(), format!("{:.4}", areas.unclassified_hectares)])
            .map_err(csv_err)?;
        writer.flush().map_err(|source| IoError::WriteFile {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), "area table written");
        Ok(path)
    }

    /// The target polygon as a one-feature FeatureCollection.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::WriteFile`] if the file cannot be written.
    #[instrument(skip_all)]
    pub fn write_target(&self, target: &TargetGeometry) -> Result<PathBuf, IoError> {
        let path = self.path_for("target.geojson");
        let mut properties = JsonObject::new();
        properties.insert("area_m2".into(), target.area().into());
        properties.insert("vertex_count".into(), target.vertex_count().into());
        let feature = Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::new(geojson::Value::from(target.geometry()))),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        };
        let collection = GeoJson::FeatureCollection(FeatureCollection {
            bbox: None,
            features: vec![feature],
            foreign_members: None,
        });
        fs::write(&path, collection.to_string()).map_err(|source| IoError::WriteFile {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), "target geometry written");
        Ok(path)
    }
}
