//! Scene archive: a `collection.json` manifest beside single-band TIFFs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use image::DynamicImage;
use landcover_raster::{Band, Grid, MultiBandImage, RasterError, SceneMetadata, SceneSource};
use tracing::{debug, info, instrument};

use crate::IoError;

const MANIFEST_FILE: &str = "collection.json";

/// One scene as listed in the manifest. Band paths are relative to the archive.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SceneEntry {
    pub id: String,
    pub date: NaiveDate,
    pub cloudy_pixel_percentage: f64,
    pub grid: Grid,
    pub bands: BTreeMap<String, String>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct Manifest {
    scenes: Vec<SceneEntry>,
}

/// A scene collection on disk. Only the manifest is read on open; band
/// pixels are decoded when a scene is loaded.
#[derive(Debug)]
pub struct SceneArchive {
    dir: PathBuf,
    metadata: Vec<SceneMetadata>,
    band_files: BTreeMap<String, BTreeMap<String, String>>,
}

impl SceneArchive {
    /// # Errors
    ///
    /// | Variant                      | Condition                                   |
    /// |------------------------------|---------------------------------------------|
    /// | [`IoError::FileNotFound`]    | no readable `collection.json`               |
    /// | [`IoError::ManifestParse`]   | manifest is not valid JSON of the right shape |
    /// | [`IoError::InvalidManifest`] | duplicate scene ids or an invalid grid      |
    #[instrument(fields(dir = %dir.display()))]
    pub fn open(dir: &Path) -> Result<Self, IoError> {
        let path = dir.join(MANIFEST_FILE);
        let text = std::fs::read_to_string(&path).map_err(|source| IoError::FileNotFound {
            path: path.clone(),
            source,
        })?;
        let manifest: Manifest = serde_json::from_str(&text).map_err(|source| IoError::ManifestParse {
            path: path.clone(),
            source,
        })?;

        let mut metadata = Vec::with_capacity(manifest.scenes.len());
        let mut band_files = BTreeMap::new();
        for scene in manifest.scenes {
            scene.grid.validate().map_err(|e| IoError::InvalidManifest {
                path: path.clone(),
                reason: format!("scene {}: {e}", scene.id),
            })?;
            if band_files.insert(scene.id.clone(), scene.bands).is_some() {
                return Err(IoError::InvalidManifest {
                    path,
                    reason: format!("scene id {} listed twice", scene.id),
                });
            }
            metadata.push(SceneMetadata {
                id: scene.id,
                date: scene.date,
                cloudy_pixel_percentage: scene.cloudy_pixel_percentage,
                grid: scene.grid,
            });
        }
        info!(n_scenes = metadata.len(), "scene archive opened");
        Ok(Self {
            dir: dir.to_path_buf(),
            metadata,
            band_files,
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read_band(&self, scene: &SceneMetadata, band: &str) -> Result<Band, IoError> {
        let file = self
            .band_files
            .get(&scene.id)
            .and_then(|bands| bands.get(band))
            .ok_or_else(|| IoError::Raster {
                path: self.dir.join(MANIFEST_FILE),
                source: RasterError::UnknownBand {
                    band: band.to_string(),
                    available: self
                        .band_files
                        .get(&scene.id)
                        .map(|b| b.keys().cloned().collect())
                        .unwrap_or_default(),
                },
            })?;
        let path = self.dir.join(file);
        let decoded = image::open(&path).map_err(|source| IoError::Image {
            path: path.clone(),
            source,
        })?;
        let (width, height) = (decoded.width(), decoded.height());
        if width as usize != scene.grid.width || height as usize != scene.grid.height {
            return Err(IoError::ImageSizeMismatch {
                path,
                width: scene.grid.width,
                height: scene.grid.height,
                got_width: width,
                got_height: height,
            });
        }
        // Zero is the archive's nodata value.
        let to_value = |v: f64| if v == 0.0 { f64::NAN } else { v };
        let values: Vec<f64> = match decoded {
            DynamicImage::ImageLuma16(buf) => buf.into_raw().into_iter().map(|v| to_value(f64::from(v))).collect(),
            DynamicImage::ImageLuma8(buf) => buf.into_raw().into_iter().map(|v| to_value(f64::from(v))).collect(),
            other => {
                return Err(IoError::UnsupportedPixelFormat {
                    path,
                    format: format!("{:?}", other.color()),
                });
            }
        };
        debug!(scene = %scene.id, band, "band decoded");
        Ok(Band::new(band, values))
    }
}

impl SceneSource for SceneArchive {
    fn scenes(&self) -> &[SceneMetadata] {
        &self.metadata
    }

    fn load(&self, scene: &SceneMetadata, bands: &[String]) -> Result<MultiBandImage, RasterError> {
        let scene_load = |e: IoError| RasterError::SceneLoad {
            scene_id: scene.id.clone(),
            source: Box::new(e),
        };
        let decoded = bands
            .iter()
            .map(|b| self.read_band(scene, b))
            .collect::<Result<Vec<_>, _>>()
            .map_err(scene_load)?;
        MultiBandImage::new(scene.grid, decoded)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use image::{ImageBuffer, Luma};
    use tempfile::TempDir;

    use super::*;

    fn write_band(dir: &Path, name: &str, values: Vec<u16>) {
        let buf: ImageBuffer<Luma<u16>, Vec<u16>> = ImageBuffer::from_raw(2, 2, values).unwrap();
        buf.save(dir.join(name)).unwrap();
    }

    fn archive() -> TempDir {
        let dir = TempDir::new().unwrap();
        write_band(dir.path(), "s1_B2.tif", vec![0, 410, 420, 430]);
        write_band(dir.path(), "s1_B8.tif", vec![2100, 2200, 2300, 2400]);
        let manifest = r#"{"scenes": [{
            "id": "S2A_20210704", "date": "2021-07-04", "cloudy_pixel_percentage": 0.3,
            "grid": {"origin_x": 0.0, "origin_y": 20.0, "pixel_size": 10.0, "width": 2, "height": 2},
            "bands": {"B2": "s1_B2.tif", "B8": "s1_B8.tif"}
        }]}"#;
        fs::write(dir.path().join(MANIFEST_FILE), manifest).unwrap();
        dir
    }

    #[test]
    fn manifest_read_without_pixels() {
        let dir = archive();
        let archive = SceneArchive::open(dir.path()).unwrap();
        assert_eq!(archive.scenes().len(), 1);
        assert_eq!(archive.scenes()[0].date, NaiveDate::from_ymd_opt(2021, 7, 4).unwrap());
    }

    #[test]
    fn load_decodes_bands_and_masks_zero() {
        let dir = archive();
        let archive = SceneArchive::open(dir.path()).unwrap();
        let scene = archive.scenes()[0].clone();
        let image = archive.load(&scene, &["B8".to_string(), "B2".to_string()]).unwrap();
        assert_eq!(image.pixel(1, 0), Some(vec![2200.0, 410.0]));
        assert_eq!(image.pixel(0, 0), None);
    }

    #[test]
    fn missing_band_is_a_scene_load_error() {
        let dir = archive();
        let archive = SceneArchive::open(dir.path()).unwrap();
        let scene = archive.scenes()[0].clone();
        let err = archive.load(&scene, &["B12".to_string()]).unwrap_err();
        assert!(matches!(err, RasterError::SceneLoad { .. }));
    }

    #[test]
    fn duplicate_scene_ids_rejected() {
        let dir = TempDir::new().unwrap();
        let entry = r#"{"id": "a", "date": "2021-01-02", "cloudy_pixel_percentage": 0.0,
            "grid": {"origin_x": 0.0, "origin_y": 10.0, "pixel_size": 10.0, "width": 1, "height": 1},
            "bands": {}}"#;
        fs::write(dir.path().join(MANIFEST_FILE), format!(r#"{{"scenes": [{entry}, {entry}]}}"#)).unwrap();
        let err = SceneArchive::open(dir.path()).unwrap_err();
        assert!(matches!(err, IoError::InvalidManifest { .. }));
    }
}
