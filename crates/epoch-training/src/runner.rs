//! The job runner.
//!
//! Drives one training session end to end: claim, train, persist the
//! artifact, record the terminal state. The invariant this module exists
//! for: once a session is claimed, it reaches `completed` or `failed` no
//! matter how the trainer exits. No trainer fault propagates past `run`.

use crate::artifacts::ArtifactStore;
use crate::dataset::{self, DatasetKind};
use crate::error::TrainingResult;
use crate::metrics::MetricNormalizer;
use crate::model::ModelDescriptor;
use crate::params::TrainingParams;
use crate::progress::{ProgressEmitter, ProgressSink, StdoutMarkerSink};
use crate::registry::TrainerRegistry;
use crate::trainer::{TrainContext, Trainer, TrainingOutcome};
use epoch_core::{EpochConfig, SessionResult, SessionStatus, SessionStore, SessionUpdate};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Inputs a job is started with.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub session_id: String,
    pub dataset_id: String,
    pub params: TrainingParams,
}

/// Runs training jobs against a session store.
///
/// One runner handles one process invocation; it owns the session it claims
/// until a terminal state is recorded.
pub struct JobRunner {
    config: EpochConfig,
    store: Arc<SessionStore>,
    registry: TrainerRegistry,
    sinks: Vec<Box<dyn ProgressSink>>,
}

impl JobRunner {
    #[must_use]
    pub fn new(config: EpochConfig, store: Arc<SessionStore>) -> Self {
        Self {
            config,
            store,
            registry: TrainerRegistry::with_defaults(),
            sinks: vec![Box::new(StdoutMarkerSink)],
        }
    }

    /// Replaces the trainer registry (tests inject instrumented trainers).
    #[must_use]
    pub fn with_registry(mut self, registry: TrainerRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Replaces the progress sinks (e.g. to silence the stdout marker).
    #[must_use]
    pub fn with_sinks(mut self, sinks: Vec<Box<dyn ProgressSink>>) -> Self {
        self.sinks = sinks;
        self
    }

    /// Runs one job to a terminal state.
    ///
    /// Returns the terminal status that was recorded. An `Err` means the
    /// session could not be claimed (already owned or terminal) or the store
    /// was unreachable for the terminal write — never a training fault.
    pub async fn run(&self, request: &JobRequest) -> SessionResult<SessionStatus> {
        let params_json = serde_json::to_string(&request.params).ok();
        let session =
            self.store.start(&request.session_id, &request.dataset_id, params_json.as_deref())?;
        info!(
            session_id = %request.session_id,
            dataset_id = %request.dataset_id,
            "training session claimed"
        );

        match self.execute(request, &session.model_id).await {
            Ok(outcome) => {
                let update = SessionUpdate {
                    progress: Some(100.0),
                    current_epoch: Some(outcome.current_epoch),
                    total_epochs: Some(outcome.total_epochs),
                    metric_name: Some(outcome.metrics.metric_name.as_str().to_string()),
                    accuracy: Some(outcome.metrics.accuracy),
                    loss: Some(outcome.metrics.loss),
                    accuracy_percent: Some(outcome.metrics.accuracy_percent),
                    loss_percent: Some(outcome.metrics.loss_percent),
                };
                self.store.finish(&request.session_id, SessionStatus::Completed, &update)?;
                info!(session_id = %request.session_id, "training session completed");
                Ok(SessionStatus::Completed)
            }
            Err(e) => {
                error!(session_id = %request.session_id, error = %e, "training failed");
                // Progress stays frozen at its last reported value; only the
                // terminal status and end time are written.
                self.store.finish(
                    &request.session_id,
                    SessionStatus::Failed,
                    &SessionUpdate::default(),
                )?;
                Ok(SessionStatus::Failed)
            }
        }
    }

    async fn execute(
        &self,
        request: &JobRequest,
        model_id: &str,
    ) -> TrainingResult<TrainingOutcome> {
        request.params.validate()?;

        let dataset = dataset::load(&request.dataset_id)?;
        let task_type = dataset.task_type();
        let descriptor = ModelDescriptor {
            model_id: model_id.to_string(),
            architecture: request.params.architecture_tag().to_string(),
            task_type,
        };

        let resolution = self.registry.resolve(&descriptor.architecture, task_type);
        if let Some(reason) = &resolution.fallback {
            warn!(
                session_id = %request.session_id,
                trainer = resolution.trainer.id(),
                "{reason}"
            );
        }

        let normalizer = match &dataset {
            DatasetKind::Tabular(data) => {
                MetricNormalizer::new(task_type).with_target_mean(data.target_mean())
            }
            DatasetKind::Environment(_) => MetricNormalizer::new(task_type),
        };
        let mut emitter = ProgressEmitter::new(
            &self.store,
            request.session_id.as_str(),
            normalizer,
            &self.sinks,
        );

        emitter.started();
        let ctx =
            TrainContext { descriptor: &descriptor, params: &request.params, dataset: &dataset };
        let outcome = resolution.trainer.run(ctx, &mut emitter).await?;

        // The artifact lands only after training succeeded, immediately
        // before `completed` is recorded — a failed run never leaves one.
        let artifacts = ArtifactStore::new(self.config.saved_models_dir.clone());
        let path = artifacts.write(&descriptor.model_id, &outcome.artifact)?;
        info!(
            model_id = %descriptor.model_id,
            path = %path.display(),
            "model artifact written"
        );
        emitter.finished();

        Ok(outcome)
    }
}
