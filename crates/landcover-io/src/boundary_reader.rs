//! Administrative boundary layer reader.

use std::path::{Path, PathBuf};

use geo::{Geometry, MultiPolygon};
use geojson::{Feature, GeoJson};
use landcover_vector::{AdminAttributes, AdminFeature, Attribute};
use tracing::{debug, info, instrument};

use crate::IoError;

/// Reads village polygons from a GeoJSON FeatureCollection.
///
/// Every feature needs Polygon or MultiPolygon geometry and the string
/// properties `Prov_Enlgi`, `District`, `Sector_1`, `Cellule_1`, `Village`.
///
/// # Errors
///
/// | Variant                            | Condition                                  |
/// |------------------------------------|--------------------------------------------|
/// | [`IoError::FileNotFound`]          | file missing or unreadable                 |
/// | [`IoError::GeoJsonParse`]          | not valid GeoJSON                          |
/// | [`IoError::NotFeatureCollection`]  | top level is not a FeatureCollection       |
/// | [`IoError::EmptyDataset`]          | zero features                              |
/// | [`IoError::MissingGeometry`]       | a feature has `null` geometry              |
/// | [`IoError::UnsupportedGeometry`]   | a geometry is not polygonal                |
/// | [`IoError::MissingProperty`]       | a required property is absent              |
/// | [`IoError::InvalidProperty`]       | a required property is not a string        |
pub struct BoundaryReader {
    path: PathBuf,
}

impl BoundaryReader {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read(&self) -> Result<Vec<AdminFeature>, IoError> {
        let features = read_feature_collection(&self.path)?;
        let admin = features
            .iter()
            .enumerate()
            .map(|(index, feature)| {
                let geometry = polygonal_geometry(&self.path, index, feature)?;
                let attributes = AdminAttributes {
                    province: string_property(&self.path, index, feature, Attribute::Province)?,
                    district: string_property(&self.path, index, feature, Attribute::District)?,
                    sector: string_property(&self.path, index, feature, Attribute::Sector)?,
                    cell: string_property(&self.path, index, feature, Attribute::Cell)?,
                    village: string_property(&self.path, index, feature, Attribute::Village)?,
                };
                Ok(AdminFeature::new(attributes, geometry))
            })
            .collect::<Result<Vec<_>, IoError>>()?;
        info!(n_features = admin.len(), "boundary layer read");
        Ok(admin)
    }
}

/// Parse a file that must hold a non-empty FeatureCollection.
pub(crate) fn read_feature_collection(path: &Path) -> Result<Vec<Feature>, IoError> {
    let text = std::fs::read_to_string(path).map_err(|source| IoError::FileNotFound {
        path: path.to_path_buf(),
        source,
    })?;
    let geojson: GeoJson = text.parse().map_err(|source| IoError::GeoJsonParse {
        path: path.to_path_buf(),
        source,
    })?;
    let GeoJson::FeatureCollection(collection) = geojson else {
        return Err(IoError::NotFeatureCollection {
            path: path.to_path_buf(),
        });
    };
    if collection.features.is_empty() {
        return Err(IoError::EmptyDataset {
            path: path.to_path_buf(),
        });
    }
    debug!(n_features = collection.features.len(), "feature collection parsed");
    Ok(collection.features)
}

/// Convert a feature's geometry to geo types.
pub(crate) fn feature_geometry(path: &Path, index: usize, feature: &Feature) -> Result<Geometry<f64>, IoError> {
    let geometry = feature.geometry.clone().ok_or_else(|| IoError::MissingGeometry {
        path: path.to_path_buf(),
        index,
    })?;
    Geometry::<f64>::try_from(geometry).map_err(|e| IoError::UnsupportedGeometry {
        path: path.to_path_buf(),
        index,
        found: e.to_string(),
        expected: "a geometry convertible to geo types",
    })
}

fn polygonal_geometry(path: &Path, index: usize, feature: &Feature) -> Result<MultiPolygon<f64>, IoError> {
    match feature_geometry(path, index, feature)? {
        Geometry::Polygon(polygon) => Ok(MultiPolygon(vec![polygon])),
        Geometry::MultiPolygon(multi) => Ok(multi),
        other => Err(IoError::UnsupportedGeometry {
            path: path.to_path_buf(),
            index,
            found: geometry_name(&other).to_string(),
            expected: "Polygon or MultiPolygon",
        }),
    }
}

pub(crate) fn geometry_name(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

fn string_property(path: &Path, index: usize, feature: &Feature, attribute: Attribute) -> Result<String, IoError> {
    let property = attribute.key();
    let value = feature.property(property).ok_or_else(|| IoError::MissingProperty {
        path: path.to_path_buf(),
        index,
        property,
    })?;
    value.as_str().map(str::to_string).ok_or_else(|| IoError::InvalidProperty {
        path: path.to_path_buf(),
        index,
        property,
        reason: format!("must be a string, got {value}"),
    })
}
