//! Multi-band rasters on a regular north-up grid.
//!
//! Covers what the land-cover workflow asks of a raster engine: filter a
//! scene collection by footprint, date and cloud cover, reduce it to a
//! per-pixel median, clip to the target polygon, read band values under
//! training points, map a classifier over every pixel, and sum class areas.
//!
//! Masked pixels are stored as `NaN` in band data and `None` in label data.

mod area;
mod collection;
mod composite;
mod error;
mod grid;
mod image;
mod labels;

pub use area::{ClassAreas, area_by_class};
pub use collection::{CollectionFilter, DateRange, InMemoryCollection, SceneMetadata, SceneSource};
pub use composite::{Composite, median_composite};
pub use error::RasterError;
pub use grid::Grid;
pub use image::{Band, MultiBandImage};
pub use labels::LabelImage;
