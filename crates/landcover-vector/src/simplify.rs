use geo::{
    Area, BooleanOps, BoundingRect, Centroid, Contains, CoordsIter, MultiPolygon, Point, Polygon, Rect,
    Simplify,
};
use tracing::{debug, info, instrument, warn};

use crate::error::VectorError;
use crate::feature::AdminFeature;

/// Tolerances for the two simplification passes.
///
/// The first pass runs on each village independently, the second on the
/// dissolved polygon. The second tolerance is never finer than the first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimplifyConfig {
    per_feature: f64,
    dissolved: f64,
}

impl SimplifyConfig {
    /// # Errors
    ///
    /// | Variant                                | Condition                                |
    /// |----------------------------------------|------------------------------------------|
    /// | [`VectorError::InvalidTolerance`]      | either tolerance is ≤ 0 or not finite    |
    /// | [`VectorError::NonMonotonicTolerance`] | `dissolved < per_feature`                |
    pub fn new(per_feature: f64, dissolved: f64) -> Result<Self, VectorError> {
        for tolerance in [per_feature, dissolved] {
            if !tolerance.is_finite() || tolerance <= 0.0 {
                return Err(VectorError::InvalidTolerance { tolerance });
            }
        }
        if dissolved < per_feature {
            return Err(VectorError::NonMonotonicTolerance {
                first: per_feature,
                second: dissolved,
            });
        }
        Ok(Self { per_feature, dissolved })
    }

    #[must_use]
    pub fn per_feature(&self) -> f64 {
        self.per_feature
    }

    #[must_use]
    pub fn dissolved(&self) -> f64 {
        self.dissolved
    }

    /// Simplify each feature, dissolve, then simplify the union again.
    ///
    /// # Errors
    ///
    /// | Variant                              | Condition                                 |
    /// |--------------------------------------|-------------------------------------------|
    /// | [`VectorError::EmptyFeatureSet`]     | `features` is empty                       |
    /// | [`VectorError::DegenerateGeometry`]  | a pass leaves no polygon with any area    |
    #[instrument(skip_all, fields(n_features = features.len(), per_feature = self.per_feature, dissolved = self.dissolved))]
    pub fn build(&self, features: &[AdminFeature]) -> Result<TargetGeometry, VectorError> {
        if features.is_empty() {
            return Err(VectorError::EmptyFeatureSet);
        }
        let source_vertices: usize = features.iter().map(|f| f.geometry().coords_count()).sum();

        let simplified = simplify_features(features, self.per_feature);
        if simplified.is_empty() {
            return Err(VectorError::DegenerateGeometry {
                stage: "per-feature simplification",
            });
        }
        let merged = dissolve(simplified.iter().map(AdminFeature::geometry))?;
        let target = drop_degenerate(merged.simplify(&self.dissolved));
        if target.0.is_empty() {
            return Err(VectorError::DegenerateGeometry {
                stage: "dissolved simplification",
            });
        }

        let target = TargetGeometry::new(target);
        info!(
            source_vertices,
            target_vertices = target.vertex_count(),
            n_parts = target.n_parts(),
            area = target.area(),
            "target geometry built"
        );
        Ok(target)
    }
}

impl Default for SimplifyConfig {
    /// 100 then 500 map units.
    fn default() -> Self {
        Self {
            per_feature: 100.0,
            dissolved: 500.0,
        }
    }
}

/// Simplify every feature's geometry independently, keeping attributes.
///
/// Features whose geometry collapses entirely are dropped with a warning.
pub fn simplify_features(features: &[AdminFeature], tolerance: f64) -> Vec<AdminFeature> {
    features
        .iter()
        .filter_map(|feature| {
            let simplified = drop_degenerate(feature.geometry().simplify(&tolerance));
            if simplified.0.is_empty() {
                warn!(
                    village = %feature.attributes().village,
                    tolerance,
                    "village polygon collapsed during simplification"
                );
                None
            } else {
                Some(feature.with_geometry(simplified))
            }
        })
        .collect()
}

/// Union all geometries into one, removing shared internal boundaries.
///
/// A single polygon is returned as is, so dissolving a dissolved geometry
/// changes nothing.
///
/// # Errors
///
/// Returns [`VectorError::EmptyFeatureSet`] when there are no polygons.
pub fn dissolve<'a, I>(geometries: I) -> Result<MultiPolygon<f64>, VectorError>
where
    I: IntoIterator<Item = &'a MultiPolygon<f64>>,
{
    let mut parts: Vec<MultiPolygon<f64>> = geometries
        .into_iter()
        .flat_map(|mp| mp.0.iter().cloned())
        .map(|p| MultiPolygon(vec![p]))
        .collect();
    let n_inputs = parts.len();
    if n_inputs == 0 {
        return Err(VectorError::EmptyFeatureSet);
    }
    // Pairwise rounds keep the operands of each union similar in size.
    while parts.len() > 1 {
        parts = parts
            .chunks(2)
            .map(|pair| pair[1..].iter().fold(pair[0].clone(), |acc, p| acc.union(p)))
            .collect();
    }
    let merged = parts.swap_remove(0);
    debug!(n_inputs, n_parts = merged.0.len(), "dissolved");
    Ok(merged)
}

/// Drop rings that simplification reduced below a triangle, then polygons without area.
fn drop_degenerate(geometry: MultiPolygon<f64>) -> MultiPolygon<f64> {
    geometry
        .into_iter()
        .filter_map(|polygon| {
            let (exterior, interiors) = polygon.into_inner();
            if exterior.0.len() < 4 {
                return None;
            }
            let interiors = interiors.into_iter().filter(|ring| ring.0.len() >= 4).collect();
            let polygon = Polygon::new(exterior, interiors);
            (polygon.unsigned_area() > 0.0).then_some(polygon)
        })
        .collect()
}

/// The dissolved, twice-simplified area of interest.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetGeometry {
    geometry: MultiPolygon<f64>,
}

impl TargetGeometry {
    /// Wrap a geometry as a target. It may be empty; consumers that need an
    /// area check [`TargetGeometry::is_empty`].
    #[must_use]
    pub fn new(geometry: MultiPolygon<f64>) -> Self {
        Self { geometry }
    }

    #[must_use]
    pub fn geometry(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }

    /// Area in squared map units.
    #[must_use]
    pub fn area(&self) -> f64 {
        self.geometry.unsigned_area()
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.geometry.coords_count()
    }

    #[must_use]
    pub fn n_parts(&self) -> usize {
        self.geometry.0.len()
    }

    /// True when the geometry has no polygons or zero area.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.geometry.0.is_empty() || self.area() <= 0.0
    }

    #[must_use]
    pub fn centroid(&self) -> Option<Point<f64>> {
        self.geometry.centroid()
    }

    #[must_use]
    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        self.geometry.bounding_rect()
    }

    /// Whether the point lies strictly inside (boundary points excluded).
    #[must_use]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.geometry.contains(&Point::new(x, y))
    }
}

#[cfg(test)]
mod tests {
    use geo::{LineString, polygon};

    use super::*;
    use crate::feature::AdminAttributes;

    fn attrs(village: &str) -> AdminAttributes {
        AdminAttributes {
            province: "East".into(),
            district: "Bugesera".into(),
            sector: "Kamabuye".into(),
            cell: "Tunda".into(),
            village: village.into(),
        }
    }

    fn square(x0: f64, y0: f64, side: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: x0, y: y0),
            (x: x0 + side, y: y0),
            (x: x0 + side, y: y0 + side),
            (x: x0, y: y0 + side),
        ]])
    }

    /// A 4 km square whose edges carry a vertex every 50 m, nudged ±20 m.
    fn jittered_square() -> MultiPolygon<f64> {
        let side = 4000.0;
        let step = 50.0;
        let n = (side / step) as usize;
        let mut coords = Vec::new();
        let jitter = |i: usize| if i % 2 == 0 { 20.0 } else { -20.0 };
        for i in 0..n {
            coords.push((i as f64 * step, jitter(i)));
        }
        for i in 0..n {
            coords.push((side + jitter(i), i as f64 * step));
        }
        for i in 0..n {
            coords.push((side - i as f64 * step, side + jitter(i)));
        }
        for i in 0..n {
            coords.push((jitter(i), side - i as f64 * step));
        }
        coords.push(coords[0]);
        MultiPolygon(vec![Polygon::new(LineString::from(coords), vec![])])
    }

    #[test]
    fn tolerances_validated() {
        assert!(matches!(
            SimplifyConfig::new(0.0, 500.0),
            Err(VectorError::InvalidTolerance { .. })
        ));
        assert!(matches!(
            SimplifyConfig::new(100.0, f64::NAN),
            Err(VectorError::InvalidTolerance { .. })
        ));
        assert!(matches!(
            SimplifyConfig::new(500.0, 100.0),
            Err(VectorError::NonMonotonicTolerance { .. })
        ));
        let config = SimplifyConfig::new(100.0, 100.0).unwrap();
        assert!((config.dissolved() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn two_pass_never_keeps_more_vertices_than_one_pass() {
        let original = jittered_square();
        for (t1, t2) in [(10.0, 30.0), (100.0, 500.0), (50.0, 50.0), (30.0, 2000.0)] {
            let two_pass = original.simplify(&t1).simplify(&t2);
            let one_pass = original.simplify(&t2);
            assert!(
                two_pass.coords_count() <= one_pass.coords_count(),
                "t1={t1} t2={t2}: {} > {}",
                two_pass.coords_count(),
                one_pass.coords_count()
            );
        }
    }

    #[test]
    fn build_reduces_vertices_and_keeps_area() {
        let feature = AdminFeature::new(attrs("Rebero"), jittered_square());
        let original_area = feature.geometry().unsigned_area();
        let target = SimplifyConfig::default().build(&[feature.clone()]).unwrap();

        assert!(target.vertex_count() < feature.geometry().coords_count());
        assert!((target.area() - original_area).abs() / original_area < 0.05);
        assert!(target.contains(2000.0, 2000.0));
    }

    #[test]
    fn adjacent_villages_dissolve_into_one_polygon() {
        let a = square(0.0, 0.0, 1000.0);
        let b = square(1000.0, 0.0, 1000.0);
        let merged = dissolve([&a, &b]).unwrap();
        assert_eq!(merged.0.len(), 1);
        assert!((merged.unsigned_area() - 2_000_000.0).abs() < 1e-6);
    }

    #[test]
    fn dissolve_is_idempotent() {
        let parts = [square(0.0, 0.0, 1000.0), square(1000.0, 0.0, 1000.0), square(0.0, 1000.0, 1000.0)];
        let once = dissolve(parts.iter()).unwrap();
        let twice = dissolve([&once]).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn disjoint_villages_stay_separate_parts() {
        let a = square(0.0, 0.0, 1000.0);
        let b = square(5000.0, 0.0, 1000.0);
        let target = TargetGeometry::new(dissolve([&a, &b]).unwrap());
        assert_eq!(target.n_parts(), 2);
        assert!(!target.contains(3000.0, 500.0));
    }

    #[test]
    fn empty_input_rejected() {
        assert!(matches!(
            SimplifyConfig::default().build(&[]),
            Err(VectorError::EmptyFeatureSet)
        ));
        assert!(matches!(dissolve(std::iter::empty::<&MultiPolygon<f64>>()), Err(VectorError::EmptyFeatureSet)));
    }

    #[test]
    fn zero_area_village_is_dropped() {
        let flat = AdminFeature::new(
            attrs("Akaje"),
            MultiPolygon(vec![polygon![(x: 0.0, y: 0.0), (x: 500.0, y: 0.0), (x: 1000.0, y: 0.0)]]),
        );
        assert!(simplify_features(&[flat.clone()], 100.0).is_empty());
        assert!(matches!(
            SimplifyConfig::default().build(&[flat]),
            Err(VectorError::DegenerateGeometry { .. })
        ));
    }

    #[test]
    fn simplification_keeps_attributes() {
        let feature = AdminFeature::new(attrs("Senga"), jittered_square());
        let simplified = simplify_features(&[feature], 100.0);
        assert_eq!(simplified[0].attributes().village, "Senga");
    }
}
