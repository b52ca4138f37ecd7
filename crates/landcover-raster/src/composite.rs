use rayon::prelude::*;
use tracing::{debug, info, instrument};

use crate::collection::{CollectionFilter, SceneSource};
use crate::error::RasterError;
use crate::image::{Band, MultiBandImage};

/// A median composite and the scenes it was reduced from.
#[derive(Debug, Clone)]
pub struct Composite {
    image: MultiBandImage,
    scene_ids: Vec<String>,
}

impl Composite {
    #[must_use]
    pub fn image(&self) -> &MultiBandImage {
        &self.image
    }

    /// Scenes that passed the filter, in collection order.
    #[must_use]
    pub fn scene_ids(&self) -> &[String] {
        &self.scene_ids
    }
}

/// Per-pixel, per-band median over every scene passing `filter`.
///
/// Masked values are ignored; a pixel masked in every scene stays masked.
/// With an even number of values the two middle ones are averaged.
///
/// # Errors
///
/// | Variant                          | Condition                                 |
/// |----------------------------------|-------------------------------------------|
/// | [`RasterError::EmptyCollection`] | no scene passes the filter                |
/// | [`RasterError::GridMismatch`]    | filtered scenes are on different grids    |
/// | anything from [`SceneSource::load`] | a scene fails to load                  |
#[instrument(skip_all, fields(n_scenes = source.scenes().len(), n_bands = bands.len()))]
pub fn median_composite<S: SceneSource + ?Sized>(
    source: &S,
    filter: &CollectionFilter,
    bands: &[String],
) -> Result<Composite, RasterError> {
    let selected: Vec<_> = source.scenes().iter().filter(|s| filter.matches(s)).collect();
    let Some(reference) = selected.first() else {
        return Err(RasterError::EmptyCollection {
            n_scenes: source.scenes().len(),
            start: filter.dates().start(),
            end: filter.dates().end(),
            max_cloud: filter.max_cloud(),
        });
    };
    if let Some(odd) = selected.iter().find(|s| s.grid != reference.grid) {
        return Err(RasterError::GridMismatch {
            scene_id: odd.id.clone(),
            reference_id: reference.id.clone(),
        });
    }
    debug!(n_selected = selected.len(), "scenes passed the collection filter");

    let images = selected
        .par_iter()
        .map(|scene| source.load(scene, bands))
        .collect::<Result<Vec<_>, _>>()?;

    let grid = reference.grid;
    let composite_bands = (0..bands.len())
        .map(|b| {
            let values = (0..grid.n_pixels())
                .into_par_iter()
                .map_init(Vec::new, |stack: &mut Vec<f64>, i| {
                    stack.clear();
                    stack.extend(images.iter().filter_map(|img| img.bands()[b].get(i)));
                    median(stack)
                })
                .collect();
            Band::new(bands[b].clone(), values)
        })
        .collect();
    let image = MultiBandImage::new(grid, composite_bands)?;

    let scene_ids: Vec<String> = selected.iter().map(|s| s.id.clone()).collect();
    info!(n_scenes = scene_ids.len(), n_valid = image.n_valid(), "median composite built");
    Ok(Composite { image, scene_ids })
}

/// Median of the values; `NaN` for none. Reorders `values`.
fn median(values: &mut [f64]) -> f64 {
    let n = values.len();
    if n == 0 {
        return f64::NAN;
    }
    values.sort_unstable_by(f64::total_cmp);
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}
