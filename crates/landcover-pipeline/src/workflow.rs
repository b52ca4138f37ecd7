//! The classification workflow as a graph of memoized stages.
//!
//! Nothing runs at construction. Asking for a stage evaluates it and every
//! stage it depends on, once; later requests return the cached value.
//!
//! ```text
//! selected ─ target ─ composite ─┬─ samples ─ partition ─ model ─ evaluation
//!                                │                          │
//!                                └──────── classified ──────┘─ areas
//! merged ────────────────────────┘ (samples)
//! ```

use landcover_io::TrainingSet;
use landcover_raster::{
    ClassAreas, CollectionFilter, LabelImage, MultiBandImage, SceneSource, area_by_class, median_composite,
};
use landcover_rf::{RandomForestConfig, RandomForestResult};
use landcover_vector::{AdminFeature, TargetGeometry};
use tracing::{debug, info, instrument};

use crate::classes::N_CLASSES;
use crate::config::WorkflowConfig;
use crate::error::PipelineError;
use crate::evaluate::{AccuracyReport, evaluate};
use crate::memo::Memo;
use crate::samples::{MergedSample, Partition, SampleTable, TrainingSets, to_columns};

/// The median composite clipped to the target, with the scenes it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ClippedComposite {
    image: MultiBandImage,
    scene_ids: Vec<String>,
}

impl ClippedComposite {
    #[must_use]
    pub fn image(&self) -> &MultiBandImage {
        &self.image
    }

    #[must_use]
    pub fn scene_ids(&self) -> &[String] {
        &self.scene_ids
    }
}

/// One run of the workflow over fixed inputs.
pub struct Workflow<S> {
    config: WorkflowConfig,
    features: Vec<AdminFeature>,
    training: TrainingSets,
    source: S,
    selected: Memo<Vec<AdminFeature>>,
    target: Memo<TargetGeometry>,
    composite: Memo<ClippedComposite>,
    merged: Memo<MergedSample>,
    samples: Memo<SampleTable>,
    partition: Memo<Partition>,
    model: Memo<RandomForestResult>,
    evaluation: Memo<AccuracyReport>,
    classified: Memo<LabelImage>,
    areas: Memo<ClassAreas>,
}

impl<S: SceneSource> Workflow<S> {
    /// Bind the inputs. No stage runs until it is requested.
    ///
    /// # Errors
    ///
    /// Returns whatever [`WorkflowConfig::validate`] rejects.
    pub fn new(
        config: WorkflowConfig,
        features: Vec<AdminFeature>,
        training: Vec<TrainingSet>,
        source: S,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            config,
            features,
            training: TrainingSets::new(training),
            source,
            selected: Memo::new(),
            target: Memo::new(),
            composite: Memo::new(),
            merged: Memo::new(),
            samples: Memo::new(),
            partition: Memo::new(),
            model: Memo::new(),
            evaluation: Memo::new(),
            classified: Memo::new(),
            areas: Memo::new(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Boundary features passing the area filter.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NoMatchingBoundary`] when nothing matches.
    #[instrument(skip_all)]
    pub fn selected(&self) -> Result<&[AdminFeature], PipelineError> {
        self.selected
            .get_or_try_init(|| {
                let filter = self.config.area_filter.to_filter();
                let selected = filter.select(&self.features);
                if selected.is_empty() {
                    return Err(PipelineError::NoMatchingBoundary {
                        n_features: self.features.len(),
                        n_predicates: filter.predicates().len(),
                    });
                }
                let villages: Vec<&str> = selected.iter().map(|f| f.attributes().village.as_str()).collect();
                info!(n_selected = selected.len(), n_features = self.features.len(), "filtered features");
                debug!(?villages, "selected villages");
                Ok(selected)
            })
            .map(Vec::as_slice)
    }

    /// The selected features simplified, dissolved and simplified again.
    ///
    /// # Errors
    ///
    /// Propagates [`Self::selected`] errors and geometry failures.
    #[instrument(skip_all)]
    pub fn target(&self) -> Result<&TargetGeometry, PipelineError> {
        self.target.get_or_try_init(|| {
            let selected = self.selected()?;
            Ok(self.config.simplify.build(selected)?)
        })
    }

    /// Per-pixel median of the filtered scenes, clipped to the target.
    ///
    /// # Errors
    ///
    /// Propagates [`Self::target`] errors; returns
    /// [`landcover_raster::RasterError::EmptyCollection`] (wrapped) when no
    /// scene passes the filter.
    #[instrument(skip_all)]
    pub fn composite(&self) -> Result<&ClippedComposite, PipelineError> {
        self.composite.get_or_try_init(|| {
            let target = self.target()?;
            let bounds = target
                .bounding_rect()
                .ok_or(landcover_vector::VectorError::EmptyFeatureSet)?;
            let filter = CollectionFilter::new(bounds, self.config.date_range()?, self.config.max_cloud);
            let composite = median_composite(&self.source, &filter, &self.config.bands)?;
            let scene_ids = composite.scene_ids().to_vec();
            let image = composite.image().clip(target.geometry());
            info!(
                n_scenes = scene_ids.len(),
                n_valid = image.n_valid(),
                "composite built"
            );
            Ok(ClippedComposite { image, scene_ids })
        })
    }

    /// All training layers merged into one point set.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidClass`] or [`PipelineError::EmptyTrainingSample`].
    pub fn merged_sample(&self) -> Result<&MergedSample, PipelineError> {
        self.merged.get_or_try_init(|| self.training.merge())
    }

    /// Composite band values under every training point.
    ///
    /// # Errors
    ///
    /// Propagates composite and merge errors, or [`PipelineError::NoSamples`].
    pub fn samples(&self) -> Result<&SampleTable, PipelineError> {
        self.samples.get_or_try_init(|| {
            let composite = self.composite()?;
            let merged = self.merged_sample()?;
            SampleTable::extract(merged, composite.image(), &self.config.bands, self.config.sample_scale)
        })
    }

    /// Samples split on a seeded random column.
    ///
    /// # Errors
    ///
    /// Propagates [`Self::samples`] errors.
    pub fn partition(&self) -> Result<&Partition, PipelineError> {
        self.partition
            .get_or_try_init(|| Ok(Partition::split(self.samples()?, self.config.seed)))
    }

    /// The forest trained on the training partition.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyPartition`] if no sample drew a training
    /// value, or any classifier error.
    #[instrument(skip_all)]
    pub fn model(&self) -> Result<&RandomForestResult, PipelineError> {
        self.model.get_or_try_init(|| {
            let table = self.samples()?;
            let partition = self.partition()?;
            if partition.training().is_empty() {
                return Err(PipelineError::EmptyPartition {
                    partition: "training",
                    n_samples: table.len(),
                });
            }
            let (values, labels) = to_columns(partition.training());
            let result = RandomForestConfig::new(self.config.n_trees)?
                .with_seed(self.config.seed)
                .with_n_classes(Some(N_CLASSES))
                .with_oob_mode(self.config.oob_mode)
                .fit(&values, &labels, table.band_names())?;
            Ok(result)
        })
    }

    /// Accuracy on the testing partition.
    ///
    /// # Errors
    ///
    /// Propagates [`Self::model`] errors. An empty testing partition yields a
    /// report whose figures are all undefined.
    pub fn evaluation(&self) -> Result<&AccuracyReport, PipelineError> {
        self.evaluation.get_or_try_init(|| {
            let model = self.model()?;
            let partition = self.partition()?;
            evaluate(model, partition.testing(), self.samples()?.len())
        })
    }

    /// Every valid composite pixel labelled by the forest.
    ///
    /// # Errors
    ///
    /// Propagates [`Self::model`] and [`Self::composite`] errors.
    #[instrument(skip_all)]
    pub fn classified(&self) -> Result<&LabelImage, PipelineError> {
        self.classified.get_or_try_init(|| {
            let forest = self.model()?.forest();
            let image = self.composite()?.image().select(&self.config.bands)?;
            let labels = image.classify(|values| forest.predict(values).map(|class| class as u8))?;
            info!(n_classified = labels.n_classified(), "composite classified");
            Ok(labels)
        })
    }

    /// Hectares per class inside the target at the area scale.
    ///
    /// # Errors
    ///
    /// Propagates [`Self::classified`] errors.
    pub fn areas(&self) -> Result<&ClassAreas, PipelineError> {
        self.areas.get_or_try_init(|| {
            let labels = self.classified()?;
            let target = self.target()?;
            Ok(area_by_class(labels, target.geometry(), self.config.area_scale, N_CLASSES)?)
        })
    }

    /// Names of the stages evaluated so far, in graph order.
    #[must_use]
    pub fn evaluated_stages(&self) -> Vec<&'static str> {
        [
            ("selected", self.selected.is_evaluated()),
            ("target", self.target.is_evaluated()),
            ("composite", self.composite.is_evaluated()),
            ("merged", self.merged.is_evaluated()),
            ("samples", self.samples.is_evaluated()),
            ("partition", self.partition.is_evaluated()),
            ("model", self.model.is_evaluated()),
            ("evaluation", self.evaluation.is_evaluated()),
            ("classified", self.classified.is_evaluated()),
            ("areas", self.areas.is_evaluated()),
        ]
        .into_iter()
        .filter_map(|(name, done)| done.then_some(name))
        .collect()
    }
}
