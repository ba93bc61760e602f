//! Epoch-based trainer for the neural-network architecture family.
//!
//! Fits a linear model with minibatch SGD: logistic for classification,
//! least-squares for regression. Each epoch reports a raw metric snapshot
//! through the emitter, which is what the rest of the pipeline cares about.

use crate::artifacts::{ArtifactKind, ModelArtifact};
use crate::dataset::{DatasetKind, TabularDataset};
use crate::error::{TrainingError, TrainingResult};
use crate::metrics::RawMetrics;
use crate::model::TaskType;
use crate::progress::ProgressEmitter;
use crate::trainer::{TrainContext, Trainer, TrainingOutcome};
use async_trait::async_trait;

#[derive(Debug, Default)]
pub struct IterativeTrainer;

#[async_trait]
impl Trainer for IterativeTrainer {
    fn id(&self) -> &'static str {
        "sgd-iterative"
    }

    async fn run(
        &self,
        ctx: TrainContext<'_>,
        emitter: &mut ProgressEmitter<'_>,
    ) -> TrainingResult<TrainingOutcome> {
        let DatasetKind::Tabular(data) = ctx.dataset else {
            return Err(TrainingError::Trainer(
                "iterative trainer requires a tabular dataset".to_string(),
            ));
        };
        if data.x_train.is_empty() {
            return Err(TrainingError::Trainer("training split is empty".to_string()));
        }

        let epochs = ctx.params.epochs;
        let mut model = LinearModel::new(data, ctx.descriptor.task_type);
        let mut last = None;

        for epoch in 1..=epochs {
            model.run_epoch(data, ctx.params.learning_rate, ctx.params.batch_size as usize);
            let (loss, headline) = model.evaluate(data);
            last = Some(emitter.epoch_completed(
                epoch,
                epochs,
                RawMetrics { accuracy: Some(headline), loss: Some(loss) },
            ));
        }

        // epochs >= 1 is validated at parse time
        let metrics = last.ok_or_else(|| TrainingError::Trainer("no epochs ran".to_string()))?;

        Ok(TrainingOutcome {
            metrics,
            current_epoch: epochs,
            total_epochs: epochs,
            artifact: ModelArtifact {
                kind: ArtifactKind::IterativeCheckpoint,
                architecture: ctx.descriptor.architecture.clone(),
                payload: serde_json::json!({
                    "weights": model.weights,
                    "bias": model.bias,
                    "task_type": ctx.descriptor.task_type,
                }),
            },
        })
    }
}

struct LinearModel {
    weights: Vec<f64>,
    bias: f64,
    task_type: TaskType,
}

impl LinearModel {
    fn new(data: &TabularDataset, task_type: TaskType) -> Self {
        // Center the intercept at the target mean so regression starts from
        // the scale of the data instead of zero.
        let bias = match task_type {
            TaskType::Regression => data.target_mean(),
            _ => 0.0,
        };
        Self { weights: vec![0.0; data.num_features()], bias, task_type }
    }

    fn predict(&self, row: &[f64]) -> f64 {
        let z = self.bias + row.iter().zip(&self.weights).map(|(x, w)| x * w).sum::<f64>();
        match self.task_type {
            TaskType::Classification => sigmoid(z),
            _ => z,
        }
    }

    fn run_epoch(&mut self, data: &TabularDataset, learning_rate: f64, batch_size: usize) {
        let batch_size = batch_size.max(1);
        for batch in data.x_train.chunks(batch_size).zip(data.y_train.chunks(batch_size)) {
            let (xs, ys) = batch;
            let m = xs.len() as f64;

            let mut grad_w = vec![0.0; self.weights.len()];
            let mut grad_b = 0.0;
            for (row, &y) in xs.iter().zip(ys) {
                // For both losses the residual (prediction - target) drives
                // the gradient.
                let residual = self.predict(row) - y;
                for (g, &x) in grad_w.iter_mut().zip(row) {
                    *g += residual * x;
                }
                grad_b += residual;
            }

            for (w, g) in self.weights.iter_mut().zip(&grad_w) {
                *w -= learning_rate * g / m;
            }
            self.bias -= learning_rate * grad_b / m;
        }
    }

    /// Training-split loss and headline metric (accuracy or MAE), matching
    /// what epoch callbacks report upstream.
    fn evaluate(&self, data: &TabularDataset) -> (f64, f64) {
        let n = data.x_train.len() as f64;
        match self.task_type {
            TaskType::Classification => {
                let mut loss = 0.0;
                let mut correct = 0usize;
                for (row, &y) in data.x_train.iter().zip(&data.y_train) {
                    let p = self.predict(row).clamp(1e-12, 1.0 - 1e-12);
                    loss -= y * p.ln() + (1.0 - y) * (1.0 - p).ln();
                    if (p >= 0.5) == (y >= 0.5) {
                        correct += 1;
                    }
                }
                (loss / n, correct as f64 / n)
            }
            _ => {
                let mut squared = 0.0;
                let mut absolute = 0.0;
                for (row, &y) in data.x_train.iter().zip(&data.y_train) {
                    let residual = self.predict(row) - y;
                    squared += residual * residual;
                    absolute += residual.abs();
                }
                (squared / n, absolute / n)
            }
        }
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}
