//! The trainer seam.
//!
//! Concrete model fitting lives behind this trait; the orchestration core
//! only drives it and consumes its outcome. The built-in implementations in
//! `trainers` are minimal local backends — real numerical backends implement
//! the same trait.

use crate::artifacts::ModelArtifact;
use crate::dataset::DatasetKind;
use crate::error::TrainingResult;
use crate::metrics::NormalizedMetrics;
use crate::model::ModelDescriptor;
use crate::params::TrainingParams;
use crate::progress::ProgressEmitter;
use async_trait::async_trait;

/// Everything a trainer needs for one run.
pub struct TrainContext<'a> {
    pub descriptor: &'a ModelDescriptor,
    pub params: &'a TrainingParams,
    pub dataset: &'a DatasetKind,
}

/// What a successful run hands back to the runner.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    /// Final normalized metric snapshot, persisted with the terminal write.
    pub metrics: NormalizedMetrics,
    pub current_epoch: u32,
    pub total_epochs: u32,
    /// Serialized model; the runner writes it keyed by model id just before
    /// recording `completed`.
    pub artifact: ModelArtifact,
}

#[async_trait]
pub trait Trainer: Send + Sync {
    fn id(&self) -> &'static str;

    /// Runs training to completion, reporting through the emitter.
    async fn run(
        &self,
        ctx: TrainContext<'_>,
        emitter: &mut ProgressEmitter<'_>,
    ) -> TrainingResult<TrainingOutcome>;
}
