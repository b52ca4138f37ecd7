use crate::forest::RandomForest;
use crate::importance::RankedBand;
use crate::oob::OobScore;

/// Facts about a training run, logged and written into run summaries.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TrainingMetadata {
    pub n_trees: usize,
    pub n_features: usize,
    pub n_classes: usize,
    pub n_samples: usize,
    /// Bands drawn per node after resolving [`MaxFeatures`](crate::MaxFeatures).
    pub max_features_resolved: usize,
    pub seed: u64,
}

/// A fitted forest together with its band importances and optional OOB score.
#[derive(Debug)]
pub struct RandomForestResult {
    forest: RandomForest,
    importances: Vec<RankedBand>,
    oob_score: Option<OobScore>,
    metadata: TrainingMetadata,
}

impl RandomForestResult {
    pub(crate) fn new(
        forest: RandomForest,
        importances: Vec<RankedBand>,
        oob_score: Option<OobScore>,
        metadata: TrainingMetadata,
    ) -> Self {
        Self {
            forest,
            importances,
            oob_score,
            metadata,
        }
    }

    #[must_use]
    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    #[must_use]
    pub fn into_forest(self) -> RandomForest {
        self.forest
    }

    /// Bands ranked most important first.
    #[must_use]
    pub fn importances(&self) -> &[RankedBand] {
        &self.importances
    }

    /// The OOB score, present only when OOB evaluation was enabled.
    #[must_use]
    pub fn oob_score(&self) -> Option<&OobScore> {
        self.oob_score.as_ref()
    }

    #[must_use]
    pub fn metadata(&self) -> &TrainingMetadata {
        &self.metadata
    }
}
