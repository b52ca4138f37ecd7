//! Training sample construction: merge the class layers, read band values
//! under each point, then split on a seeded random column.

use landcover_io::{LabeledPoint, TrainingSet};
use landcover_raster::MultiBandImage;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::classes::{LandCoverClass, N_CLASSES};
use crate::error::PipelineError;

/// Points whose random value is below this go to training, the rest to testing.
pub const TRAIN_THRESHOLD: f64 = 0.8;

/// The per-class training layers as read from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSets {
    sets: Vec<TrainingSet>,
}

impl TrainingSets {
    #[must_use]
    pub fn new(sets: Vec<TrainingSet>) -> Self {
        Self { sets }
    }

    #[must_use]
    pub fn sets(&self) -> &[TrainingSet] {
        &self.sets
    }

    /// Concatenate every layer in order into one labelled point set.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidClass`] for a label outside 0..=4 and
    /// [`PipelineError::EmptyTrainingSample`] when there are no points at all.
    #[instrument(skip_all, fields(n_layers = self.sets.len()))]
    pub fn merge(&self) -> Result<MergedSample, PipelineError> {
        let mut points = Vec::with_capacity(self.sets.iter().map(|s| s.points.len()).sum());
        let mut layer_sizes = Vec::with_capacity(self.sets.len());
        for set in &self.sets {
            if let Some(bad) = set.points.iter().find(|p| LandCoverClass::from_label(p.class).is_none()) {
                return Err(PipelineError::InvalidClass {
                    layer: set.name.clone(),
                    class: bad.class,
                });
            }
            points.extend_from_slice(&set.points);
            layer_sizes.push((set.name.clone(), set.points.len()));
        }
        if points.is_empty() {
            return Err(PipelineError::EmptyTrainingSample);
        }
        let merged = MergedSample { points, layer_sizes };
        info!(
            n_points = merged.len(),
            class_counts = ?merged.class_counts(),
            "merged sample"
        );
        Ok(merged)
    }
}

/// All training points, every layer concatenated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedSample {
    points: Vec<LabeledPoint>,
    layer_sizes: Vec<(String, usize)>,
}

impl MergedSample {
    #[must_use]
    pub fn points(&self) -> &[LabeledPoint] {
        &self.points
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points per source layer, in merge order.
    #[must_use]
    pub fn layer_sizes(&self) -> &[(String, usize)] {
        &self.layer_sizes
    }

    #[must_use]
    pub fn class_counts(&self) -> [usize; N_CLASSES] {
        let mut counts = [0; N_CLASSES];
        for p in &self.points {
            counts[usize::from(p.class)] += 1;
        }
        counts
    }
}

/// One training point with the band values read under it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    /// Position in the merged sample.
    pub id: usize,
    pub x: f64,
    pub y: f64,
    pub class: u8,
    pub values: Vec<f64>,
}

/// Band values under every training point that falls on a valid pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleTable {
    band_names: Vec<String>,
    samples: Vec<Sample>,
}

impl SampleTable {
    /// Read `bands` of `image` under each merged point.
    ///
    /// Points outside the image or on a masked pixel are dropped with a
    /// warning. `scale` is the sampling resolution; when it differs from the
    /// image's pixel size, values come from the pixel containing the point.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Raster`] if a band is missing and
    /// [`PipelineError::NoSamples`] if no point lands on a valid pixel.
    #[instrument(skip_all, fields(n_points = merged.len(), scale = scale))]
    pub fn extract(
        merged: &MergedSample,
        image: &MultiBandImage,
        bands: &[String],
        scale: f64,
    ) -> Result<Self, PipelineError> {
        let selected = image.select(bands)?;
        if (selected.grid().pixel_size - scale).abs() > f64::EPSILON {
            debug!(
                pixel_size = selected.grid().pixel_size,
                "sampling scale differs from the composite pixel size"
            );
        }
        let coords: Vec<(f64, f64)> = merged.points().iter().map(|p| (p.x, p.y)).collect();
        let samples: Vec<Sample> = selected
            .sample_points(&coords)
            .into_iter()
            .zip(merged.points())
            .enumerate()
            .filter_map(|(id, (values, p))| {
                values.map(|values| Sample {
                    id,
                    x: p.x,
                    y: p.y,
                    class: p.class,
                    values,
                })
            })
            .collect();

        let dropped = merged.len() - samples.len();
        if dropped > 0 {
            warn!(dropped, "training points outside the composite or on masked pixels were dropped");
        }
        if samples.is_empty() {
            return Err(PipelineError::NoSamples { n_points: merged.len() });
        }
        info!(n_samples = samples.len(), "training points sampled");
        Ok(Self {
            band_names: bands.to_vec(),
            samples,
        })
    }

    #[must_use]
    pub fn band_names(&self) -> &[String] {
        &self.band_names
    }

    #[must_use]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Training and testing halves of a [`SampleTable`].
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    seed: u64,
    random: Vec<f64>,
    training: Vec<Sample>,
    testing: Vec<Sample>,
}

impl Partition {
    /// Draw one uniform `[0, 1)` value per sample from a ChaCha8 stream
    /// seeded with `seed`; below [`TRAIN_THRESHOLD`] is training.
    #[instrument(skip_all, fields(n_samples = table.len(), seed = seed))]
    pub fn split(table: &SampleTable, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let random: Vec<f64> = (0..table.len()).map(|_| rng.r#gen::<f64>()).collect();
        let (training, testing): (Vec<_>, Vec<_>) = table
            .samples()
            .iter()
            .zip(&random)
            .partition(|&(_, &r)| r < TRAIN_THRESHOLD);
        let partition = Self {
            seed,
            training: training.into_iter().map(|(s, _)| s.clone()).collect(),
            testing: testing.into_iter().map(|(s, _)| s.clone()).collect(),
            random,
        };
        info!(
            seed,
            n_training = partition.training.len(),
            n_testing = partition.testing.len(),
            "sample partition built"
        );
        partition
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// The random column, aligned with the source table.
    #[must_use]
    pub fn random_column(&self) -> &[f64] {
        &self.random
    }

    #[must_use]
    pub fn training(&self) -> &[Sample] {
        &self.training
    }

    #[must_use]
    pub fn testing(&self) -> &[Sample] {
        &self.testing
    }
}

/// Split samples into the band matrix and label vector the forest takes.
#[must_use]
pub fn to_columns(samples: &[Sample]) -> (Vec<Vec<f64>>, Vec<usize>) {
    samples
        .iter()
        .map(|s| (s.values.clone(), usize::from(s.class)))
        .unzip()
}

#[cfg(test)]
mod tests {
    use landcover_raster::{Band, Grid};

    use super::*;

    fn set(name: &str, class: u8, xs: &[f64]) -> TrainingSet {
        TrainingSet {
            name: name.into(),
            points: xs.iter().map(|&x| LabeledPoint { x, y: 5.0, class }).collect(),
        }
    }

    fn image() -> MultiBandImage {
        let grid = Grid::new(0.0, 10.0, 10.0, 4, 1).unwrap();
        MultiBandImage::new(
            grid,
            vec![
                Band::new("B2", vec![1.0, 2.0, f64::NAN, 4.0]),
                Band::new("B8", vec![10.0, 20.0, 30.0, 40.0]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn merge_concatenates_in_order() {
        let sets = TrainingSets::new(vec![set("water", 0, &[5.0, 15.0]), set("vegetation", 4, &[35.0])]);
        let merged = sets.merge().unwrap();
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.class_counts(), [2, 0, 0, 0, 1]);
        assert_eq!(merged.layer_sizes()[1], ("vegetation".to_string(), 1));
    }

    #[test]
    fn merge_rejects_unknown_class() {
        let sets = TrainingSets::new(vec![set("water", 0, &[5.0]), set("clouds", 9, &[15.0])]);
        assert!(matches!(
            sets.merge(),
            Err(PipelineError::InvalidClass { class: 9, .. })
        ));
        assert!(matches!(
            TrainingSets::new(vec![set("water", 0, &[])]).merge(),
            Err(PipelineError::EmptyTrainingSample)
        ));
    }

    #[test]
    fn extract_drops_masked_and_outside_points() {
        let merged = TrainingSets::new(vec![set("water", 0, &[5.0, 25.0, 35.0, 500.0])])
            .merge()
            .unwrap();
        let table = SampleTable::extract(&merged, &image(), &["B8".into(), "B2".into()], 10.0).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.samples()[0].values, vec![10.0, 1.0]);
        assert_eq!(table.samples()[1].id, 2);
        assert_eq!(table.band_names(), ["B8", "B2"]);
    }

    #[test]
    fn extract_with_no_valid_points_fails() {
        let merged = TrainingSets::new(vec![set("water", 0, &[25.0])]).merge().unwrap();
        assert!(matches!(
            SampleTable::extract(&merged, &image(), &["B2".into()], 10.0),
            Err(PipelineError::NoSamples { n_points: 1 })
        ));
    }

    #[test]
    fn partition_is_complete_and_seeded() {
        let xs: Vec<f64> = (0..200).map(|i| f64::from(i % 4) * 10.0 + 5.0).collect();
        let merged = TrainingSets::new(vec![set("vegetation", 4, &xs)]).merge().unwrap();
        let table = SampleTable::extract(&merged, &image(), &["B8".into()], 10.0).unwrap();
        let partition = Partition::split(&table, 7);

        assert_eq!(partition.training().len() + partition.testing().len(), table.len());
        let below = partition.random_column().iter().filter(|&&r| r < TRAIN_THRESHOLD).count();
        assert_eq!(below, partition.training().len());
        assert!(partition.random_column().iter().all(|r| (0.0..1.0).contains(r)));

        let mut ids: Vec<usize> = partition
            .training()
            .iter()
            .chain(partition.testing())
            .map(|s| s.id)
            .collect();
        ids.sort_unstable();
        let expected: Vec<usize> = table.samples().iter().map(|s| s.id).collect();
        assert_eq!(ids, expected);

        assert_eq!(partition, Partition::split(&table, 7));
        assert_ne!(partition.random_column(), Partition::split(&table, 8).random_column());
    }
}
