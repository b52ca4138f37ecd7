//! The five land-cover classes and how each is named, coloured and stored.

use serde::Serialize;

/// Number of land-cover classes.
pub const N_CLASSES: usize = 5;

/// A land-cover class. The discriminant is the label stored in training
/// points, confusion matrices and classified rasters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum LandCoverClass {
    Water = 0,
    BuildUp = 1,
    Bareland = 2,
    Cropland = 3,
    Vegetation = 4,
}

impl LandCoverClass {
    /// Every class in label order.
    pub const ALL: [LandCoverClass; N_CLASSES] = [
        LandCoverClass::Water,
        LandCoverClass::BuildUp,
        LandCoverClass::Bareland,
        LandCoverClass::Cropland,
        LandCoverClass::Vegetation,
    ];

    /// The class for a label, if the label is in range.
    #[must_use]
    pub fn from_label(label: u8) -> Option<Self> {
        Self::ALL.get(usize::from(label)).copied()
    }

    #[must_use]
    pub fn label(self) -> u8 {
        self as u8
    }

    /// Display name used in charts, tables and the legend.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            LandCoverClass::Water => "Water",
            LandCoverClass::BuildUp => "Build up",
            LandCoverClass::Bareland => "Bareland",
            LandCoverClass::Cropland => "Crop Land",
            LandCoverClass::Vegetation => "Vegetation",
        }
    }

    /// File stem of the training layer holding this class's points.
    #[must_use]
    pub fn layer(self) -> &'static str {
        match self {
            LandCoverClass::Water => "water",
            LandCoverClass::BuildUp => "buildup",
            LandCoverClass::Bareland => "bareland",
            LandCoverClass::Cropland => "cropland",
            LandCoverClass::Vegetation => "vegetation",
        }
    }

    /// CSS colour name of the palette entry.
    #[must_use]
    pub fn colour_name(self) -> &'static str {
        match self {
            LandCoverClass::Water => "blue",
            LandCoverClass::BuildUp => "red",
            LandCoverClass::Bareland => "yellow",
            LandCoverClass::Cropland => "pink",
            LandCoverClass::Vegetation => "green",
        }
    }

    /// RGB value of [`Self::colour_name`].
    #[must_use]
    pub fn rgb(self) -> [u8; 3] {
        match self {
            LandCoverClass::Water => [0, 0, 255],
            LandCoverClass::BuildUp => [255, 0, 0],
            LandCoverClass::Bareland => [255, 255, 0],
            LandCoverClass::Cropland => [255, 192, 203],
            LandCoverClass::Vegetation => [0, 128, 0],
        }
    }

    /// Names of every class in label order.
    #[must_use]
    pub fn names() -> [&'static str; N_CLASSES] {
        Self::ALL.map(Self::name)
    }

    /// Training layer stems in label order.
    #[must_use]
    pub fn layers() -> [&'static str; N_CLASSES] {
        Self::ALL.map(Self::layer)
    }
}

impl std::fmt::Display for LandCoverClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
