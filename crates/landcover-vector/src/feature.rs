use std::fmt;

use geo::MultiPolygon;

/// The administrative attributes a boundary can be filtered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Attribute {
    Province,
    District,
    Sector,
    Cell,
    Village,
}

impl Attribute {
    /// Every attribute, coarsest first.
    pub const ALL: [Attribute; 5] = [
        Attribute::Province,
        Attribute::District,
        Attribute::Sector,
        Attribute::Cell,
        Attribute::Village,
    ];

    /// Property name in the source boundary layer.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Attribute::Province => "Prov_Enlgi",
            Attribute::District => "District",
            Attribute::Sector => "Sector_1",
            Attribute::Cell => "Cellule_1",
            Attribute::Village => "Village",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Names of the administrative units a village polygon belongs to.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AdminAttributes {
    pub province: String,
    pub district: String,
    pub sector: String,
    pub cell: String,
    pub village: String,
}

impl AdminAttributes {
    #[must_use]
    pub fn get(&self, attribute: Attribute) -> &str {
        match attribute {
            Attribute::Province => &self.province,
            Attribute::District => &self.district,
            Attribute::Sector => &self.sector,
            Attribute::Cell => &self.cell,
            Attribute::Village => &self.village,
        }
    }
}

/// One administrative polygon. Filtered and simplified into new values,
/// never edited in place.
#[derive(Debug, Clone)]
pub struct AdminFeature {
    attributes: AdminAttributes,
    geometry: MultiPolygon<f64>,
}

impl AdminFeature {
    #[must_use]
    pub fn new(attributes: AdminAttributes, geometry: MultiPolygon<f64>) -> Self {
        Self { attributes, geometry }
    }

    #[must_use]
    pub fn attributes(&self) -> &AdminAttributes {
        &self.attributes
    }

    #[must_use]
    pub fn geometry(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }

    /// Same attributes, different geometry.
    #[must_use]
    pub fn with_geometry(&self, geometry: MultiPolygon<f64>) -> Self {
        Self {
            attributes: self.attributes.clone(),
            geometry,
        }
    }
}
