use geo::{BoundingRect, Contains, MultiPolygon, Point};
use rayon::prelude::*;
use tracing::{info, instrument};

use crate::error::RasterError;
use crate::grid::Grid;
use crate::labels::LabelImage;

const SQUARE_METRES_PER_HECTARE: f64 = 1e4;

/// Hectares per class inside a region.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ClassAreas {
    /// Indexed by class; zero for classes with no pixels.
    pub hectares: Vec<f64>,
    /// Area inside the region where no label was available.
    pub unclassified_hectares: f64,
    /// Side of the square sampling cell, in map units.
    pub scale: f64,
}

impl ClassAreas {
    /// Classified area only.
    #[must_use]
    pub fn classified_total(&self) -> f64 {
        self.hectares.iter().sum()
    }

    /// Classified plus unclassified area.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.classified_total() + self.unclassified_hectares
    }
}

/// Sum cell area by class over a `scale`-sized grid covering `region`.
///
/// Each cell whose centre falls inside `region` contributes `scale²`
/// square metres to the class of the label pixel under that centre.
///
/// # Errors
///
/// | Variant                          | Condition                           |
/// |----------------------------------|-------------------------------------|
/// | [`RasterError::InvalidScale`]    | `scale` is ≤ 0 or not finite        |
/// | [`RasterError::EmptyRegion`]     | `region` has no polygons            |
/// | [`RasterError::LabelOutOfRange`] | a label is `>= n_classes`           |
#[instrument(skip_all, fields(scale = scale, n_classes = n_classes))]
pub fn area_by_class(
    labels: &LabelImage,
    region: &MultiPolygon<f64>,
    scale: f64,
    n_classes: usize,
) -> Result<ClassAreas, RasterError> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(RasterError::InvalidScale { scale });
    }
    let bbox = region.bounding_rect().ok_or(RasterError::EmptyRegion)?;
    let cells = Grid::new(
        bbox.min().x,
        bbox.max().y,
        scale,
        (bbox.width() / scale).ceil().max(1.0) as usize,
        (bbox.height() / scale).ceil().max(1.0) as usize,
    )?;

    // Per cell row: counts per class plus one trailing slot for unclassified.
    let counts = (0..cells.height)
        .into_par_iter()
        .map(|r| {
            let mut counts = vec![0usize; n_classes + 1];
            for c in 0..cells.width {
                let (x, y) = cells.pixel_centre(c, r);
                if !region.contains(&Point::new(x, y)) {
                    continue;
                }
                match labels.at(x, y) {
                    Some(label) if usize::from(label) >= n_classes => {
                        return Err(RasterError::LabelOutOfRange {
                            label: usize::from(label),
                            n_classes,
                        });
                    }
                    Some(label) => counts[usize::from(label)] += 1,
                    None => counts[n_classes] += 1,
                }
            }
            Ok(counts)
        })
        .try_reduce(
            || vec![0usize; n_classes + 1],
            |mut a, b| {
                a.iter_mut().zip(b).for_each(|(x, y)| *x += y);
                Ok(a)
            },
        )?;

    let cell_hectares = cells.pixel_area() / SQUARE_METRES_PER_HECTARE;
    let hectares: Vec<f64> = counts[..n_classes].iter().map(|&n| n as f64 * cell_hectares).collect();
    let areas = ClassAreas {
        hectares,
        unclassified_hectares: counts[n_classes] as f64 * cell_hectares,
        scale,
    };
    info!(
        classified_ha = areas.classified_total(),
        unclassified_ha = areas.unclassified_hectares,
        "area by class computed"
    );
    Ok(areas)
}
