use chrono::NaiveDate;

/// Errors from raster construction, compositing and reduction.
#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    /// Returned when a grid has zero size or a non-positive pixel size.
    #[error("invalid grid: {reason}")]
    InvalidGrid {
        /// What is wrong with it.
        reason: String,
    },

    /// Returned when an image is built without bands.
    #[error("image has no bands")]
    NoBands,

    /// Returned when a band's pixel count does not match its grid.
    #[error("band {band} has {got} values, grid has {expected} pixels")]
    BandLengthMismatch {
        /// Band name.
        band: String,
        /// Pixels in the grid.
        expected: usize,
        /// Values supplied.
        got: usize,
    },

    /// Returned when two bands share a name.
    #[error("band {band} appears more than once")]
    DuplicateBand {
        /// The repeated name.
        band: String,
    },

    /// Returned when a requested band is missing.
    #[error("band {band} not found; available: {available:?}")]
    UnknownBand {
        /// The requested name.
        band: String,
        /// Bands the image does have.
        available: Vec<String>,
    },

    /// Returned when a date range ends before it starts.
    #[error("date range ends ({end}) before it starts ({start})")]
    InvalidDateRange {
        /// First day.
        start: NaiveDate,
        /// Last day.
        end: NaiveDate,
    },

    /// Returned when no scene passes the collection filter.
    #[error(
        "no scene of {n_scenes} intersects the region between {start} and {end} with cloud cover below {max_cloud}%"
    )]
    EmptyCollection {
        /// Scenes in the unfiltered collection.
        n_scenes: usize,
        /// First day searched.
        start: NaiveDate,
        /// Last day searched.
        end: NaiveDate,
        /// Cloud threshold used.
        max_cloud: f64,
    },

    /// Returned when filtered scenes are not on the same grid.
    #[error("scene {scene_id} is not on the grid of scene {reference_id}")]
    GridMismatch {
        /// The odd scene out.
        scene_id: String,
        /// The first scene, whose grid the others must share.
        reference_id: String,
    },

    /// Returned when a scene source fails to deliver pixels.
    #[error("failed to load scene {scene_id}")]
    SceneLoad {
        /// The scene being loaded.
        scene_id: String,
        /// What went wrong underneath.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Returned when a reduction scale is not a positive finite number.
    #[error("scale must be positive and finite, got {scale}")]
    InvalidScale {
        /// The offending scale.
        scale: f64,
    },

    /// Returned when a label image holds a class outside the expected range.
    #[error("label {label} is outside 0..{n_classes}")]
    LabelOutOfRange {
        /// The offending label.
        label: usize,
        /// Number of classes expected.
        n_classes: usize,
    },

    /// Returned when a reduction region has no area.
    #[error("region has no area")]
    EmptyRegion,
}
