use geo::{BoundingRect, Contains, MultiPolygon, Point};
use rayon::prelude::*;
use tracing::{debug, instrument};

use crate::error::RasterError;
use crate::grid::Grid;
use crate::labels::LabelImage;

/// One named band, row-major, `NaN` where masked.
#[derive(Debug, Clone, PartialEq)]
pub struct Band {
    name: String,
    values: Vec<f64>,
}

impl Band {
    #[must_use]
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Unmasked value at a row-major index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied().filter(|v| !v.is_nan())
    }
}

/// Bands sharing one grid.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiBandImage {
    grid: Grid,
    bands: Vec<Band>,
}

impl MultiBandImage {
    /// # Errors
    ///
    /// | Variant                            | Condition                           |
    /// |------------------------------------|-------------------------------------|
    /// | [`RasterError::InvalidGrid`]       | the grid itself is invalid          |
    /// | [`RasterError::NoBands`]           | `bands` is empty                    |
    /// | [`RasterError::BandLengthMismatch`] | a band is not `width * height` long |
    /// | [`RasterError::DuplicateBand`]     | two bands share a name              |
    pub fn new(grid: Grid, bands: Vec<Band>) -> Result<Self, RasterError> {
        grid.validate()?;
        if bands.is_empty() {
            return Err(RasterError::NoBands);
        }
        for (i, band) in bands.iter().enumerate() {
            if band.values.len() != grid.n_pixels() {
                return Err(RasterError::BandLengthMismatch {
                    band: band.name.clone(),
                    expected: grid.n_pixels(),
                    got: band.values.len(),
                });
            }
            if bands[..i].iter().any(|b| b.name == band.name) {
                return Err(RasterError::DuplicateBand {
                    band: band.name.clone(),
                });
            }
        }
        Ok(Self { grid, bands })
    }

    #[must_use]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    #[must_use]
    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    #[must_use]
    pub fn band_names(&self) -> Vec<String> {
        self.bands.iter().map(|b| b.name.clone()).collect()
    }

    /// # Errors
    ///
    /// Returns [`RasterError::UnknownBand`] when no band has that name.
    pub fn band(&self, name: &str) -> Result<&Band, RasterError> {
        self.bands.iter().find(|b| b.name == name).ok_or_else(|| RasterError::UnknownBand {
            band: name.to_string(),
            available: self.band_names(),
        })
    }

    /// A new image holding only `names`, in that order.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::UnknownBand`] for a missing band and
    /// [`RasterError::NoBands`] for an empty selection.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Self, RasterError> {
        let bands = names
            .iter()
            .map(|n| self.band(n.as_ref()).cloned())
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(self.grid, bands)
    }

    /// Mask every pixel whose centre lies outside `region`.
    #[instrument(skip_all, fields(width = self.grid.width, height = self.grid.height))]
    #[must_use]
    pub fn clip(&self, region: &MultiPolygon<f64>) -> Self {
        let inside = coverage_mask(&self.grid, region);
        let bands = self
            .bands
            .iter()
            .map(|band| {
                let values = band
                    .values
                    .iter()
                    .zip(&inside)
                    .map(|(&v, &keep)| if keep { v } else { f64::NAN })
                    .collect();
                Band::new(band.name.clone(), values)
            })
            .collect();
        let clipped = Self { grid: self.grid, bands };
        debug!(n_valid = clipped.n_valid(), "image clipped");
        clipped
    }

    /// Band vector at a pixel, or `None` if any band is masked there.
    #[must_use]
    pub fn pixel(&self, col: usize, row: usize) -> Option<Vec<f64>> {
        if col >= self.grid.width || row >= self.grid.height {
            return None;
        }
        let index = self.grid.index(col, row);
        self.bands.iter().map(|b| b.get(index)).collect()
    }

    /// Pixels where every band holds a value.
    #[must_use]
    pub fn n_valid(&self) -> usize {
        (0..self.grid.n_pixels())
            .filter(|&i| self.bands.iter().all(|b| b.get(i).is_some()))
            .count()
    }

    /// Band vectors under each point, read from the pixel containing it.
    ///
    /// `None` for points off the grid or on a masked pixel.
    #[must_use]
    pub fn sample_points(&self, points: &[(f64, f64)]) -> Vec<Option<Vec<f64>>> {
        points
            .iter()
            .map(|&(x, y)| self.grid.locate(x, y).and_then(|(col, row)| self.pixel(col, row)))
            .collect()
    }

    /// Apply `classify` to every unmasked pixel, in parallel by row.
    ///
    /// # Errors
    ///
    /// Returns the first error `classify` produces.
    #[instrument(skip_all, fields(n_pixels = self.grid.n_pixels()))]
    pub fn classify<F, E>(&self, classify: F) -> Result<LabelImage, E>
    where
        F: Fn(&[f64]) -> Result<u8, E> + Sync,
        E: Send,
    {
        let width = self.grid.width;
        let rows: Vec<Vec<Option<u8>>> = (0..self.grid.height)
            .into_par_iter()
            .map(|row| {
                let mut buffer = Vec::with_capacity(self.bands.len());
                (0..width)
                    .map(|col| {
                        let index = self.grid.index(col, row);
                        buffer.clear();
                        for band in &self.bands {
                            match band.get(index) {
                                Some(v) => buffer.push(v),
                                None => return Ok(None),
                            }
                        }
                        classify(&buffer).map(Some)
                    })
                    .collect::<Result<Vec<Option<u8>>, E>>()
            })
            .collect::<Result<_, E>>()?;
        Ok(LabelImage::from_parts(self.grid, rows.into_iter().flatten().collect()))
    }
}

/// Row-major flags: pixel centre strictly inside `region`.
pub(crate) fn coverage_mask(grid: &Grid, region: &MultiPolygon<f64>) -> Vec<bool> {
    let Some(bbox) = region.bounding_rect() else {
        return vec![false; grid.n_pixels()];
    };
    (0..grid.height)
        .into_par_iter()
        .flat_map_iter(|row| {
            (0..grid.width).map(move |col| {
                let (x, y) = grid.pixel_centre(col, row);
                x >= bbox.min().x
                    && x <= bbox.max().x
                    && y >= bbox.min().y
                    && y <= bbox.max().y
                    && region.contains(&Point::new(x, y))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use geo::polygon;

    use super::*;

    /// 4×4 grid at the origin with 10 m pixels; B2 = index, B8 = 100 + index.
    fn image() -> MultiBandImage {
        let grid = Grid::new(0.0, 40.0, 10.0, 4, 4).unwrap();
        let b2 = (0..16).map(f64::from).collect();
        let b8 = (0..16).map(|i| 100.0 + f64::from(i)).collect();
        MultiBandImage::new(grid, vec![Band::new("B2", b2), Band::new("B8", b8)]).unwrap()
    }

    #[test]
    fn construction_checks() {
        let grid = Grid::new(0.0, 10.0, 10.0, 1, 1).unwrap();
        assert!(matches!(MultiBandImage::new(grid, vec![]), Err(RasterError::NoBands)));
        assert!(matches!(
            MultiBandImage::new(grid, vec![Band::new("B2", vec![1.0, 2.0])]),
            Err(RasterError::BandLengthMismatch { expected: 1, got: 2, .. })
        ));
        assert!(matches!(
            MultiBandImage::new(grid, vec![Band::new("B2", vec![1.0]), Band::new("B2", vec![2.0])]),
            Err(RasterError::DuplicateBand { .. })
        ));
    }

    #[test]
    fn select_reorders_and_rejects_unknown() {
        let img = image();
        let selected = img.select(&["B8", "B2"]).unwrap();
        assert_eq!(selected.band_names(), vec!["B8", "B2"]);
        assert_eq!(selected.pixel(1, 0), Some(vec![101.0, 1.0]));
        assert!(matches!(img.select(&["B11"]), Err(RasterError::UnknownBand { .. })));
    }

    #[test]
    fn clip_masks_outside_pixels() {
        // Left half of the grid.
        let region = MultiPolygon(vec![polygon![(x: 0.0, y: 0.0), (x: 20.0, y: 0.0), (x: 20.0, y: 40.0), (x: 0.0, y: 40.0)]]);
        let clipped = image().clip(&region);
        assert_eq!(clipped.n_valid(), 8);
        assert!(clipped.pixel(0, 0).is_some());
        assert!(clipped.pixel(3, 0).is_none());
    }

    #[test]
    fn sampling_reads_containing_pixel() {
        let img = image();
        let samples = img.sample_points(&[(15.0, 35.0), (39.0, 1.0), (-5.0, 5.0)]);
        assert_eq!(samples[0], Some(vec![1.0, 101.0]));
        assert_eq!(samples[1], Some(vec![15.0, 115.0]));
        assert_eq!(samples[2], None);
    }

    #[test]
    fn classify_skips_masked_pixels() {
        let mut img = image();
        img.bands[0].values[5] = f64::NAN;
        let labels = img
            .classify(|v: &[f64]| Ok::<u8, ()>(if v[0] < 8.0 { 0 } else { 1 }))
            .unwrap();
        assert_eq!(labels.get(0, 0), Some(0));
        assert_eq!(labels.get(1, 1), None);
        assert_eq!(labels.get(3, 3), Some(1));
        assert_eq!(labels.n_classified(), 15);
    }

    #[test]
    fn classify_propagates_errors() {
        let result = image().classify(|_: &[f64]| Err::<u8, &str>("model exploded"));
        assert_eq!(result.unwrap_err(), "model exploded");
    }
}
