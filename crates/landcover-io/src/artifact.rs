//! Classified-map artifacts: an 8-bit TIFF of labels plus a JSON grid sidecar.

use std::path::{Path, PathBuf};

use image::{GrayImage, ImageFormat};
use landcover_raster::{Grid, LabelImage};
use tracing::{info, instrument};

use crate::IoError;

/// Pixel value for masked pixels in a label raster.
pub const LABEL_NODATA: u8 = u8::MAX;

#[derive(serde::Serialize, serde::Deserialize)]
struct Sidecar {
    grid: Grid,
    nodata: u8,
}

/// First of `stem.ext`, `stem-1.ext`, `stem-2.ext`, ... that does not exist
/// in `dir`, checking the sidecar too.
#[must_use]
pub fn unique_artifact_path(dir: &Path, stem: &str, extension: &str) -> PathBuf {
    let taken = |p: &Path| p.exists() || p.with_extension("json").exists();
    let first = dir.join(format!("{stem}.{extension}"));
    if !taken(&first) {
        return first;
    }
    (1..)
        .map(|n| dir.join(format!("{stem}-{n}.{extension}")))
        .find(|p| !taken(p))
        .unwrap_or(first)
}

/// Write labels to `path` as an 8-bit TIFF and the grid to `path` with a
/// `.json` extension. Masked pixels become [`LABEL_NODATA`].
///
/// # Errors
///
/// | Variant                   | Condition                     |
/// |---------------------------|-------------------------------|
/// | [`IoError::Image`]        | TIFF encoding or write failed |
/// | [`IoError::WriteFile`]    | sidecar write failed          |
/// | [`IoError::Serialize`]    | sidecar serialization failed  |
#[instrument(skip(labels), fields(path = %path.display()))]
pub fn write_label_raster(path: &Path, labels: &LabelImage) -> Result<(), IoError> {
    let grid = labels.grid();
    let pixels: Vec<u8> = labels.labels().iter().map(|l| l.unwrap_or(LABEL_NODATA)).collect();
    let (width, height) = (grid.width as u32, grid.height as u32);
    let image = GrayImage::from_raw(width, height, pixels).ok_or_else(|| IoError::ImageSizeMismatch {
        path: path.to_path_buf(),
        width: grid.width,
        height: grid.height,
        got_width: width,
        got_height: height,
    })?;
    image
        .save_with_format(path, ImageFormat::Tiff)
        .map_err(|source| IoError::Image {
            path: path.to_path_buf(),
            source,
        })?;

    let sidecar_path = path.with_extension("json");
    let sidecar = Sidecar {
        grid: *grid,
        nodata: LABEL_NODATA,
    };
    let json = serde_json::to_string_pretty(&sidecar).map_err(|source| IoError::Serialize {
        what: "label raster sidecar",
        source,
    })?;
    std::fs::write(&sidecar_path, json).map_err(|source| IoError::WriteFile {
        path: sidecar_path,
        source,
    })?;
    info!(n_classified = labels.n_classified(), "label raster written");
    Ok(())
}

/// Read a raster written by [`write_label_raster`].
///
/// # Errors
///
/// | Variant                            | Condition                          |
/// |------------------------------------|------------------------------------|
/// | [`IoError::FileNotFound`]          | sidecar missing                    |
/// | [`IoError::ManifestParse`]         | sidecar is not valid JSON          |
/// | [`IoError::Image`]                 | TIFF decoding failed               |
/// | [`IoError::ImageSizeMismatch`]     | TIFF size disagrees with the grid  |
pub fn read_label_raster(path: &Path) -> Result<LabelImage, IoError> {
    let sidecar_path = path.with_extension("json");
    let text = std::fs::read_to_string(&sidecar_path).map_err(|source| IoError::FileNotFound {
        path: sidecar_path.clone(),
        source,
    })?;
    let sidecar: Sidecar = serde_json::from_str(&text).map_err(|source| IoError::ManifestParse {
        path: sidecar_path,
        source,
    })?;
    let image = image::open(path)
        .map_err(|source| IoError::Image {
            path: path.to_path_buf(),
            source,
        })?
        .into_luma8();
    if image.width() as usize != sidecar.grid.width || image.height() as usize != sidecar.grid.height {
        return Err(IoError::ImageSizeMismatch {
            path: path.to_path_buf(),
            width: sidecar.grid.width,
            height: sidecar.grid.height,
            got_width: image.width(),
            got_height: image.height(),
        });
    }
    let labels = image
        .into_raw()
        .into_iter()
        .map(|v| (v != sidecar.nodata).then_some(v))
        .collect();
    LabelImage::new(sidecar.grid, labels).map_err(|source| IoError::Raster {
        path: path.to_path_buf(),
        source,
    })
}
