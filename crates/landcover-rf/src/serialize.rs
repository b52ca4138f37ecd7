//! Binary persistence for trained forests.

use std::path::Path;

use tracing::{debug, info, instrument};

use crate::error::ClassifierError;
use crate::forest::RandomForest;

/// Bumped whenever the on-disk layout of [`RandomForest`] changes.
const MODEL_FORMAT_VERSION: u32 = 1;

#[derive(serde::Serialize, serde::Deserialize)]
struct ModelFile {
    format_version: u32,
    band_names: Vec<String>,
    n_classes: usize,
    forest: RandomForest,
}

impl RandomForest {
    /// Write the forest to `path` as versioned bincode.
    ///
    /// # Errors
    ///
    /// | Variant                            | Condition              |
    /// |------------------------------------|------------------------|
    /// | [`ClassifierError::SerializeModel`] | encoding failed        |
    /// | [`ClassifierError::WriteModel`]     | the file write failed  |
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ClassifierError> {
        let path = path.as_ref();
        let file = ModelFile {
            format_version: MODEL_FORMAT_VERSION,
            band_names: self.band_names.clone(),
            n_classes: self.n_classes,
            forest: self.clone(),
        };
        let bytes = bincode::serialize(&file).map_err(|source| ClassifierError::SerializeModel { source })?;
        std::fs::write(path, &bytes).map_err(|source| ClassifierError::WriteModel {
            path: path.to_path_buf(),
            source,
        })?;
        info!(size_bytes = bytes.len(), n_trees = self.trees.len(), "model saved");
        Ok(())
    }

    /// Read a forest written by [`RandomForest::save`].
    ///
    /// # Errors
    ///
    /// | Variant                                      | Condition                   |
    /// |----------------------------------------------|-----------------------------|
    /// | [`ClassifierError::ReadModel`]               | the file read failed        |
    /// | [`ClassifierError::DeserializeModel`]        | decoding failed             |
    /// | [`ClassifierError::IncompatibleModelVersion`] | format version mismatch     |
    #[instrument(fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| ClassifierError::ReadModel {
            path: path.to_path_buf(),
            source,
        })?;
        let file: ModelFile =
            bincode::deserialize(&bytes).map_err(|source| ClassifierError::DeserializeModel {
                path: path.to_path_buf(),
                source,
            })?;
        if file.format_version != MODEL_FORMAT_VERSION {
            return Err(ClassifierError::IncompatibleModelVersion {
                expected: MODEL_FORMAT_VERSION,
                found: file.format_version,
                path: path.to_path_buf(),
            });
        }
        debug!(bands = ?file.band_names, n_classes = file.n_classes, "model loaded");
        Ok(file.forest)
    }
}
