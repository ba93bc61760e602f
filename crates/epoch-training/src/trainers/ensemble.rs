//! Single-call trainer for the tree-ensemble architecture family.
//!
//! Ensemble fitting is a backend concern: tags like "XGBoost" or "LightGBM"
//! name alternate backends that may not be compiled into a given build.
//! Requesting one that is not registered logs the substitution and falls
//! back to the built-in default instead of failing the run.

use crate::artifacts::{ArtifactKind, ModelArtifact};
use crate::dataset::{DatasetKind, TabularDataset};
use crate::error::{TrainingError, TrainingResult};
use crate::metrics::RawMetrics;
use crate::model::TaskType;
use crate::progress::ProgressEmitter;
use crate::trainer::{TrainContext, Trainer, TrainingOutcome};
use async_trait::async_trait;
use tracing::warn;

/// A fitted ensemble model plus its held-out headline metric
/// (accuracy for classification, MAE for regression).
struct FittedEnsemble {
    payload: serde_json::Value,
    headline: f64,
}

trait EnsembleBackend: Send + Sync {
    fn id(&self) -> &'static str;
    fn fit(&self, data: &TabularDataset) -> TrainingResult<FittedEnsemble>;
}

/// Built-in default backend: nearest-centroid for classification, the
/// grand-mean predictor for regression. Fit is a single pass.
struct NearestCentroidBackend;

impl EnsembleBackend for NearestCentroidBackend {
    fn id(&self) -> &'static str {
        "nearest-centroid"
    }

    fn fit(&self, data: &TabularDataset) -> TrainingResult<FittedEnsemble> {
        match data.task_type {
            TaskType::Classification => fit_centroids(data),
            TaskType::Regression => fit_mean(data),
            TaskType::Reinforcement => Err(TrainingError::Trainer(
                "ensemble backend cannot fit a reinforcement task".to_string(),
            )),
        }
    }
}

fn fit_centroids(data: &TabularDataset) -> TrainingResult<FittedEnsemble> {
    let features = data.num_features();

    // One centroid per distinct class label
    let mut classes: Vec<f64> = data.y_train.clone();
    classes.sort_by(|a, b| a.total_cmp(b));
    classes.dedup();
    if classes.is_empty() {
        return Err(TrainingError::Trainer("training split is empty".to_string()));
    }

    let mut centroids = vec![vec![0.0; features]; classes.len()];
    let mut counts = vec![0usize; classes.len()];
    for (row, y) in data.x_train.iter().zip(&data.y_train) {
        let idx = classes.iter().position(|c| c == y).unwrap_or(0);
        counts[idx] += 1;
        for (acc, &x) in centroids[idx].iter_mut().zip(row) {
            *acc += x;
        }
    }
    for (centroid, &count) in centroids.iter_mut().zip(&counts) {
        for value in centroid.iter_mut() {
            *value /= count.max(1) as f64;
        }
    }

    let predict = |row: &[f64]| -> f64 {
        let nearest = centroids
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| squared_distance(row, a).total_cmp(&squared_distance(row, b)))
            .map_or(0, |(idx, _)| idx);
        classes[nearest]
    };

    let correct = data
        .x_test
        .iter()
        .zip(&data.y_test)
        .filter(|&(row, &y)| predict(row) == y)
        .count();
    let headline = correct as f64 / data.x_test.len().max(1) as f64;

    Ok(FittedEnsemble {
        payload: serde_json::json!({ "classes": classes, "centroids": centroids }),
        headline,
    })
}

fn fit_mean(data: &TabularDataset) -> TrainingResult<FittedEnsemble> {
    let mean = data.target_mean();
    let mae = data.y_test.iter().map(|y| (y - mean).abs()).sum::<f64>()
        / data.y_test.len().max(1) as f64;

    Ok(FittedEnsemble { payload: serde_json::json!({ "mean": mean }), headline: mae })
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

pub struct EnsembleTrainer {
    backends: Vec<Box<dyn EnsembleBackend>>,
}

impl Default for EnsembleTrainer {
    fn default() -> Self {
        Self::new()
    }
}

impl EnsembleTrainer {
    /// Only the built-in default backend is registered in this build;
    /// alternate backends are optional installs.
    #[must_use]
    pub fn new() -> Self {
        Self { backends: vec![Box::new(NearestCentroidBackend)] }
    }

    /// Backend name an architecture tag asks for, if it names one
    /// specifically.
    fn requested_backend(architecture: &str) -> Option<&'static str> {
        let tag: String =
            architecture.to_uppercase().chars().filter(char::is_ascii_alphanumeric).collect();
        if tag.contains("XGB") {
            Some("xgboost")
        } else if tag.contains("LIGHT") {
            Some("lightgbm")
        } else if tag.contains("BOOST") || tag == "GB" {
            Some("gradient-boosting")
        } else {
            None
        }
    }

    fn backend_for(&self, architecture: &str) -> &dyn EnsembleBackend {
        let default = self.backends[0].as_ref();
        if let Some(requested) = Self::requested_backend(architecture) {
            if let Some(backend) = self.backends.iter().find(|b| b.id() == requested) {
                return backend.as_ref();
            }
            warn!(
                requested,
                fallback = default.id(),
                "ensemble backend is not installed; falling back"
            );
        }
        default
    }
}

#[async_trait]
impl Trainer for EnsembleTrainer {
    fn id(&self) -> &'static str {
        "ensemble"
    }

    async fn run(
        &self,
        ctx: TrainContext<'_>,
        emitter: &mut ProgressEmitter<'_>,
    ) -> TrainingResult<TrainingOutcome> {
        let DatasetKind::Tabular(data) = ctx.dataset else {
            return Err(TrainingError::Trainer(
                "ensemble trainer requires a tabular dataset".to_string(),
            ));
        };

        let backend = self.backend_for(&ctx.descriptor.architecture);
        let fitted = backend.fit(data)?;

        // Single unit of work: the fit itself. Progress goes 0 -> 100 in one
        // report that already carries the final snapshot.
        let metrics =
            emitter.epoch_completed(1, 1, RawMetrics { accuracy: Some(fitted.headline), loss: None });

        Ok(TrainingOutcome {
            metrics,
            current_epoch: 1,
            total_epochs: 1,
            artifact: ModelArtifact {
                kind: ArtifactKind::EnsembleModel,
                architecture: ctx.descriptor.architecture.clone(),
                payload: serde_json::json!({
                    "backend": backend.id(),
                    "model": fitted.payload,
                }),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset;
    use crate::metrics::MetricNormalizer;
    use crate::model::ModelDescriptor;
    use crate::params::TrainingParams;
    use crate::progress::ProgressSink;
    use epoch_core::{Database, SessionStore, TrainingSession};

    async fn run_with_architecture(architecture: &str, tag: &str) -> TrainingOutcome {
        let store = SessionStore::new(Database::open_in_memory().unwrap());
        store.create(&TrainingSession::new("sess-1", "model-1", tag)).unwrap();
        store.start("sess-1", tag, None).unwrap();

        let dataset = dataset::load(tag).unwrap();
        let task_type = dataset.task_type();
        let descriptor = ModelDescriptor {
            model_id: "model-1".to_string(),
            architecture: architecture.to_string(),
            task_type,
        };
        let params = TrainingParams::default();
        let sinks: Vec<Box<dyn ProgressSink>> = vec![];
        let normalizer = match &dataset {
            DatasetKind::Tabular(d) => {
                MetricNormalizer::new(task_type).with_target_mean(d.target_mean())
            }
            DatasetKind::Environment(_) => MetricNormalizer::new(task_type),
        };
        let mut emitter = ProgressEmitter::new(&store, "sess-1", normalizer, &sinks);

        let ctx = TrainContext { descriptor: &descriptor, params: &params, dataset: &dataset };
        EnsembleTrainer::new().run(ctx, &mut emitter).await.unwrap()
    }

    #[tokio::test]
    async fn test_classification_fit_in_a_single_call() {
        let outcome = run_with_architecture("Random Forest", "classification-demo").await;
        assert_eq!(outcome.total_epochs, 1);
        assert!(outcome.metrics.accuracy > 0.7, "accuracy {}", outcome.metrics.accuracy);
        assert!((0.0..=100.0).contains(&outcome.metrics.accuracy_percent));
        assert_eq!(outcome.artifact.kind, ArtifactKind::EnsembleModel);
    }

    #[tokio::test]
    async fn test_regression_fit_reports_mae() {
        let outcome = run_with_architecture("RandomForest", "regression-demo").await;
        assert!(outcome.metrics.accuracy > 0.0);
        assert!((0.0..=100.0).contains(&outcome.metrics.accuracy_percent));
    }

    #[tokio::test]
    async fn test_missing_backend_falls_back_to_default() {
        // XGBoost is not registered in this build; the run must still
        // complete on the default backend.
        let outcome = run_with_architecture("XGBoost", "classification-demo").await;
        assert_eq!(
            outcome.artifact.payload.get("backend").unwrap().as_str().unwrap(),
            "nearest-centroid"
        );
    }

    #[test]
    fn test_requested_backend_matching_is_tolerant() {
        assert_eq!(EnsembleTrainer::requested_backend("XGBoost"), Some("xgboost"));
        assert_eq!(EnsembleTrainer::requested_backend("xgb"), Some("xgboost"));
        assert_eq!(
            EnsembleTrainer::requested_backend("Gradient Boosting"),
            Some("gradient-boosting")
        );
        assert_eq!(EnsembleTrainer::requested_backend("LightGBM"), Some("lightgbm"));
        assert_eq!(EnsembleTrainer::requested_backend("Random Forest"), None);
    }
}
