use geo::{Coord, Rect};

use crate::error::RasterError;

/// A north-up pixel grid. `(origin_x, origin_y)` is the outer corner of the
/// top-left pixel; rows run southward.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Grid {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_size: f64,
    pub width: usize,
    pub height: usize,
}

impl Grid {
    /// # Errors
    ///
    /// Returns [`RasterError::InvalidGrid`] for a zero-sized grid, a
    /// non-positive pixel size, or a non-finite origin.
    pub fn new(origin_x: f64, origin_y: f64, pixel_size: f64, width: usize, height: usize) -> Result<Self, RasterError> {
        let grid = Self {
            origin_x,
            origin_y,
            pixel_size,
            width,
            height,
        };
        grid.validate()?;
        Ok(grid)
    }

    /// Check a grid that arrived through deserialization.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Grid::new`].
    pub fn validate(&self) -> Result<(), RasterError> {
        let reason = if self.width == 0 || self.height == 0 {
            Some(format!("{}x{} pixels", self.width, self.height))
        } else if !self.pixel_size.is_finite() || self.pixel_size <= 0.0 {
            Some(format!("pixel size {}", self.pixel_size))
        } else if !self.origin_x.is_finite() || !self.origin_y.is_finite() {
            Some(format!("origin ({}, {})", self.origin_x, self.origin_y))
        } else {
            None
        };
        match reason {
            Some(reason) => Err(RasterError::InvalidGrid { reason }),
            None => Ok(()),
        }
    }

    #[must_use]
    pub fn n_pixels(&self) -> usize {
        self.width * self.height
    }

    /// Area of one pixel in squared map units.
    #[must_use]
    pub fn pixel_area(&self) -> f64 {
        self.pixel_size * self.pixel_size
    }

    /// Row-major index of `(col, row)`.
    #[must_use]
    pub fn index(&self, col: usize, row: usize) -> usize {
        row * self.width + col
    }

    /// Map coordinates of a pixel centre.
    #[must_use]
    pub fn pixel_centre(&self, col: usize, row: usize) -> (f64, f64) {
        (
            self.origin_x + (col as f64 + 0.5) * self.pixel_size,
            self.origin_y - (row as f64 + 0.5) * self.pixel_size,
        )
    }

    /// The pixel whose footprint holds `(x, y)`, or `None` off the grid.
    #[must_use]
    pub fn locate(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let col = ((x - self.origin_x) / self.pixel_size).floor();
        let row = ((self.origin_y - y) / self.pixel_size).floor();
        if col < 0.0 || row < 0.0 || !col.is_finite() || !row.is_finite() {
            return None;
        }
        let (col, row) = (col as usize, row as usize);
        (col < self.width && row < self.height).then_some((col, row))
    }

    /// Footprint of the whole grid.
    #[must_use]
    pub fn bounds(&self) -> Rect<f64> {
        Rect::new(
            Coord {
                x: self.origin_x,
                y: self.origin_y - self.height as f64 * self.pixel_size,
            },
            Coord {
                x: self.origin_x + self.width as f64 * self.pixel_size,
                y: self.origin_y,
            },
        )
    }

    /// Whether the grid footprint overlaps `rect` (touching edges count).
    #[must_use]
    pub fn intersects(&self, rect: &Rect<f64>) -> bool {
        let own = self.bounds();
        own.min().x <= rect.max().x
            && rect.min().x <= own.max().x
            && own.min().y <= rect.max().y
            && rect.min().y <= own.max().y
    }
}
