use std::collections::BTreeMap;

use chrono::NaiveDate;
use geo::Rect;

use crate::error::RasterError;
use crate::grid::Grid;
use crate::image::MultiBandImage;

/// What is known about a scene before any pixel is read.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SceneMetadata {
    pub id: String,
    pub date: NaiveDate,
    /// Share of cloudy pixels in the scene, 0 to 100.
    pub cloudy_pixel_percentage: f64,
    pub grid: Grid,
}

/// Calendar days `start..=end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// # Errors
    ///
    /// Returns [`RasterError::InvalidDateRange`] when `end < start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, RasterError> {
        if end < start {
            return Err(RasterError::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    #[must_use]
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Footprint, date and cloud-cover filter over scene metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionFilter {
    bounds: Rect<f64>,
    dates: DateRange,
    max_cloud: f64,
}

impl CollectionFilter {
    /// Scenes must overlap `bounds`, fall within `dates`, and have a cloudy
    /// pixel percentage strictly below `max_cloud`.
    #[must_use]
    pub fn new(bounds: Rect<f64>, dates: DateRange, max_cloud: f64) -> Self {
        Self {
            bounds,
            dates,
            max_cloud,
        }
    }

    #[must_use]
    pub fn bounds(&self) -> Rect<f64> {
        self.bounds
    }

    #[must_use]
    pub fn dates(&self) -> DateRange {
        self.dates
    }

    #[must_use]
    pub fn max_cloud(&self) -> f64 {
        self.max_cloud
    }

    #[must_use]
    pub fn matches(&self, scene: &SceneMetadata) -> bool {
        scene.grid.intersects(&self.bounds)
            && self.dates.contains(scene.date)
            && scene.cloudy_pixel_percentage < self.max_cloud
    }
}

/// A collection of scenes whose pixels are loaded on demand.
pub trait SceneSource: Sync {
    /// Metadata for every scene, without touching pixels.
    fn scenes(&self) -> &[SceneMetadata];

    /// Read the named bands of one scene.
    ///
    /// # Errors
    ///
    /// Implementations return [`RasterError::SceneLoad`] when pixels cannot be
    /// read and [`RasterError::UnknownBand`] for a band the scene lacks.
    fn load(&self, scene: &SceneMetadata, bands: &[String]) -> Result<MultiBandImage, RasterError>;
}

/// Scenes already held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCollection {
    metadata: Vec<SceneMetadata>,
    images: BTreeMap<String, MultiBandImage>,
}

impl InMemoryCollection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a scene. The image grid replaces whatever grid `metadata` carried.
    #[must_use]
    pub fn with_scene(mut self, mut metadata: SceneMetadata, image: MultiBandImage) -> Self {
        metadata.grid = *image.grid();
        self.images.insert(metadata.id.clone(), image);
        self.metadata.push(metadata);
        self
    }
}

impl SceneSource for InMemoryCollection {
    fn scenes(&self) -> &[SceneMetadata] {
        &self.metadata
    }

    fn load(&self, scene: &SceneMetadata, bands: &[String]) -> Result<MultiBandImage, RasterError> {
        let image = self.images.get(&scene.id).ok_or_else(|| RasterError::SceneLoad {
            scene_id: scene.id.clone(),
            source: format!("scene {} is not in the collection", scene.id).into(),
        })?;
        image.select(bands)
    }
}
