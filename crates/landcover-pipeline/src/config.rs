//! Workflow configuration with the Kamabuye 2021 run as the default.

use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use landcover_raster::DateRange;
use landcover_rf::OobMode;
use landcover_vector::{Attribute, BoundaryFilter, SimplifyConfig};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::PipelineError;

const KAMABUYE_CELLS: [&str; 5] = ["Kampeka", "Nyakayaga", "Tunda", "Burenge", "Biharagu"];

const KAMABUYE_VILLAGES: [&str; 40] = [
    "Rebero", "Kampeka", "Murambi", "Mabuye", "Pamba I", "Nyakayaga", "Ndama", "Tunda",
    "Nyabyondo", "Mbuganzeri", "Akaje", "Akabazeyi", "Mparo", "Ntungamo Ii", "Biharagu",
    "Byimana", "Murago", "Mububaya Ii", "Rubugu", "Munazi", "Muyigi", "Senga", "Fatinkanda",
    "Kanyonyera", "Kagenge", "Masangano", "Mububa I", "Murambo", "Ntungamo I", "Nyarurama",
    "Twuruziramire", "Nyakariba", "Akanigo", "Pamba Ii", "Rusibya", "Uwumusave",
    "Uwibiraro I", "Cyogamuyaga", "Rubirizi", "Uwibiraro Ii",
];

const DEFAULT_BANDS: [&str; 9] = ["B2", "B3", "B4", "B5", "B6", "B7", "B8", "B11", "B12"];

const YEAR_START: NaiveDate = match NaiveDate::from_ymd_opt(2021, 1, 1) {
    Some(d) => d,
    None => panic!("invalid start date"),
};
const YEAR_END: NaiveDate = match NaiveDate::from_ymd_opt(2021, 12, 31) {
    Some(d) => d,
    None => panic!("invalid end date"),
};

/// Which boundary features make up the target area.
///
/// Every present field is one predicate; a feature must pass all of them.
/// Loaded from JSON such as
/// `{"sector": "Kamabuye", "cells": ["Tunda"], "villages": ["Senga", "Tunda"]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AreaFilterSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cells: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub villages: Option<Vec<String>>,
}

impl AreaFilterSpec {
    /// The 40 villages of Kamabuye sector, Bugesera district.
    #[must_use]
    pub fn kamabuye() -> Self {
        Self {
            province: Some("East".into()),
            district: Some("Bugesera".into()),
            sector: Some("Kamabuye".into()),
            cells: Some(KAMABUYE_CELLS.iter().map(|s| (*s).to_string()).collect()),
            villages: Some(KAMABUYE_VILLAGES.iter().map(|s| (*s).to_string()).collect()),
        }
    }

    /// Read a filter from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::AreaFilterRead`] if the file cannot be read and
    /// [`PipelineError::AreaFilterParse`] if it does not match the schema.
    #[instrument(fields(path = %path.display()))]
    pub fn from_path(path: &Path) -> Result<Self, PipelineError> {
        let text = fs::read_to_string(path).map_err(|source| PipelineError::AreaFilterRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| PipelineError::AreaFilterParse {
            path: path.to_path_buf(),
            source,
        })
    }

    #[must_use]
    pub fn to_filter(&self) -> BoundaryFilter {
        let mut filter = BoundaryFilter::new();
        let equalities = [
            (Attribute::Province, &self.province),
            (Attribute::District, &self.district),
            (Attribute::Sector, &self.sector),
        ];
        for (attribute, value) in equalities {
            if let Some(value) = value {
                filter = filter.eq(attribute, value.clone());
            }
        }
        if let Some(cells) = &self.cells {
            filter = filter.in_list(Attribute::Cell, cells.iter().cloned());
        }
        if let Some(villages) = &self.villages {
            filter = filter.in_list(Attribute::Village, villages.iter().cloned());
        }
        filter
    }
}

/// Parameters of the classified-map export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportSettings {
    pub description: String,
    pub scale: f64,
    pub max_pixels: u64,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            description: "LandCoverClassificationKamabuye@21".into(),
            scale: 10.0,
            max_pixels: 10_000_000_000_000,
        }
    }
}

/// Linear stretch with gamma for the true-colour layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RgbStretch {
    /// Red, green and blue source bands.
    pub bands: [String; 3],
    pub min: f64,
    pub max: f64,
    pub gamma: f64,
}

impl RgbStretch {
    /// Map a reflectance value to a display byte.
    #[must_use]
    pub fn apply(&self, value: f64) -> u8 {
        let t = ((value - self.min) / (self.max - self.min)).clamp(0.0, 1.0);
        (t.powf(1.0 / self.gamma) * 255.0).round() as u8
    }
}

impl Default for RgbStretch {
    fn default() -> Self {
        Self {
            bands: ["B4".into(), "B3".into(), "B2".into()],
            min: 309.86,
            max: 1551.14,
            gamma: 1.049,
        }
    }
}

/// Titles and map framing for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresentationConfig {
    pub rgb: RgbStretch,
    pub map_title: String,
    pub chart_title: String,
    pub legend_title: String,
    pub zoom: u8,
}

impl Default for PresentationConfig {
    fn default() -> Self {
        Self {
            rgb: RgbStretch::default(),
            map_title: "Land Cover Landuse Classification Kamabuye Map 2021".into(),
            chart_title: "LULC Area of Kamabuye Sector - Bugesera District of 2021".into(),
            legend_title: "Classification".into(),
            zoom: 12,
        }
    }
}

/// Configuration for one classification run.
///
/// Construct via [`WorkflowConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter      | Default                                   |
/// |----------------|-------------------------------------------|
/// | `area_filter`  | [`AreaFilterSpec::kamabuye`]              |
/// | `simplify`     | 100 per feature, 500 after dissolving     |
/// | dates          | 2021-01-01 ..= 2021-12-31                 |
/// | `max_cloud`    | 1 (% cloudy pixels, strict)               |
/// | `bands`        | B2 B3 B4 B5 B6 B7 B8 B11 B12              |
/// | `sample_scale` | 10                                        |
/// | `n_trees`      | 100                                       |
/// | `seed`         | 42                                        |
/// | `oob_mode`     | `Disabled`                                |
/// | `area_scale`   | 25                                        |
/// | `export`       | [`ExportSettings::default`]               |
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub(crate) area_filter: AreaFilterSpec,
    pub(crate) simplify: SimplifyConfig,
    pub(crate) start: NaiveDate,
    pub(crate) end: NaiveDate,
    pub(crate) max_cloud: f64,
    pub(crate) bands: Vec<String>,
    pub(crate) sample_scale: f64,
    pub(crate) n_trees: usize,
    pub(crate) seed: u64,
    pub(crate) oob_mode: OobMode,
    pub(crate) area_scale: f64,
    pub(crate) export: ExportSettings,
    pub(crate) presentation: PresentationConfig,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            area_filter: AreaFilterSpec::kamabuye(),
            simplify: SimplifyConfig::default(),
            start: YEAR_START,
            end: YEAR_END,
            max_cloud: 1.0,
            bands: DEFAULT_BANDS.iter().map(|b| (*b).to_string()).collect(),
            sample_scale: 10.0,
            n_trees: 100,
            seed: 42,
            oob_mode: OobMode::Disabled,
            area_scale: 25.0,
            export: ExportSettings::default(),
            presentation: PresentationConfig::default(),
        }
    }

    #[must_use]
    pub fn with_area_filter(mut self, area_filter: AreaFilterSpec) -> Self {
        self.area_filter = area_filter;
        self
    }

    #[must_use]
    pub fn with_simplify(mut self, simplify: SimplifyConfig) -> Self {
        self.simplify = simplify;
        self
    }

    /// Set the inclusive acquisition date range.
    #[must_use]
    pub fn with_dates(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    /// Set the cloudy-pixel percentage a scene must stay strictly below.
    #[must_use]
    pub fn with_max_cloud(mut self, max_cloud: f64) -> Self {
        self.max_cloud = max_cloud;
        self
    }

    #[must_use]
    pub fn with_bands<S: Into<String>>(mut self, bands: impl IntoIterator<Item = S>) -> Self {
        self.bands = bands.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_sample_scale(mut self, sample_scale: f64) -> Self {
        self.sample_scale = sample_scale;
        self
    }

    #[must_use]
    pub fn with_n_trees(mut self, n_trees: usize) -> Self {
        self.n_trees = n_trees;
        self
    }

    /// Seed for the partition column and the forest.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn with_oob_mode(mut self, oob_mode: OobMode) -> Self {
        self.oob_mode = oob_mode;
        self
    }

    #[must_use]
    pub fn with_area_scale(mut self, area_scale: f64) -> Self {
        self.area_scale = area_scale;
        self
    }

    #[must_use]
    pub fn with_export(mut self, export: ExportSettings) -> Self {
        self.export = export;
        self
    }

    #[must_use]
    pub fn with_presentation(mut self, presentation: PresentationConfig) -> Self {
        self.presentation = presentation;
        self
    }

    #[must_use]
    pub fn area_filter(&self) -> &AreaFilterSpec {
        &self.area_filter
    }

    #[must_use]
    pub fn simplify(&self) -> &SimplifyConfig {
        &self.simplify
    }

    /// The acquisition window.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Raster`] if the end precedes the start.
    pub fn date_range(&self) -> Result<DateRange, PipelineError> {
        Ok(DateRange::new(self.start, self.end)?)
    }

    #[must_use]
    pub fn max_cloud(&self) -> f64 {
        self.max_cloud
    }

    #[must_use]
    pub fn bands(&self) -> &[String] {
        &self.bands
    }

    #[must_use]
    pub fn sample_scale(&self) -> f64 {
        self.sample_scale
    }

    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.n_trees
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    #[must_use]
    pub fn oob_mode(&self) -> OobMode {
        self.oob_mode
    }

    #[must_use]
    pub fn area_scale(&self) -> f64 {
        self.area_scale
    }

    #[must_use]
    pub fn export(&self) -> &ExportSettings {
        &self.export
    }

    #[must_use]
    pub fn presentation(&self) -> &PresentationConfig {
        &self.presentation
    }

    /// Check every setting a stage would otherwise reject late.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] naming the first bad setting,
    /// or [`PipelineError::Raster`] for an inverted date range.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let invalid = |reason: String| Err(PipelineError::InvalidConfig { reason });
        self.date_range()?;
        if self.bands.is_empty() {
            return invalid("at least one band is required".into());
        }
        if !self.max_cloud.is_finite() || self.max_cloud <= 0.0 {
            return invalid(format!("max_cloud must be positive, got {}", self.max_cloud));
        }
        for (name, scale) in [
            ("sample_scale", self.sample_scale),
            ("area_scale", self.area_scale),
            ("export scale", self.export.scale),
        ] {
            if !scale.is_finite() || scale <= 0.0 {
                return invalid(format!("{name} must be positive and finite, got {scale}"));
            }
        }
        if self.n_trees == 0 {
            return invalid("n_trees must be at least 1".into());
        }
        let rgb = &self.presentation.rgb;
        if rgb.max <= rgb.min || rgb.gamma <= 0.0 {
            return invalid(format!(
                "rgb stretch needs min < max and gamma > 0, got {}..{} gamma {}",
                rgb.min, rgb.max, rgb.gamma
            ));
        }
        Ok(())
    }
}
