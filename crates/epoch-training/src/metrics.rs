//! Metric normalization.
//!
//! Maps raw backend-reported values into the uniform
//! `{metric_name, accuracy_percent, loss_percent}` shape the session record
//! carries, per task type. Everything persisted passes a finite coercion:
//! a backend reporting `NaN`/`Inf` (or nothing) yields `0`, never a hole in
//! the record.

use crate::model::TaskType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scale factor applied to the average evaluation reward.
const REWARD_PERCENT_SCALE: f64 = 10.0;

/// Metric reported for a run; fixed for the lifetime of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricName {
    Accuracy,
    Mae,
    Reward,
}

impl MetricName {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accuracy => "Accuracy",
            Self::Mae => "MAE",
            Self::Reward => "Reward",
        }
    }

    #[must_use]
    pub fn for_task(task_type: TaskType) -> Self {
        match task_type {
            TaskType::Classification => Self::Accuracy,
            TaskType::Regression => Self::Mae,
            TaskType::Reinforcement => Self::Reward,
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw values as reported by a training backend for one unit of work.
///
/// `accuracy` holds whatever the task's headline metric is: classification
/// accuracy, regression MAE, or the average evaluation reward.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawMetrics {
    pub accuracy: Option<f64>,
    pub loss: Option<f64>,
}

/// Snapshot ready to persist into the session record.
#[derive(Debug, Clone, Copy)]
pub struct NormalizedMetrics {
    pub metric_name: MetricName,
    pub accuracy: f64,
    pub loss: f64,
    pub accuracy_percent: f64,
    pub loss_percent: f64,
}

/// Per-run normalizer.
///
/// Holds the state a run accumulates: the initial loss (captured from the
/// first reported epoch and fixed thereafter) and, for regression, the
/// training-target mean the percent formula scales against.
#[derive(Debug, Clone)]
pub struct MetricNormalizer {
    task_type: TaskType,
    target_mean: f64,
    initial_loss: Option<f64>,
}

impl MetricNormalizer {
    #[must_use]
    pub fn new(task_type: TaskType) -> Self {
        Self { task_type, target_mean: 0.0, initial_loss: None }
    }

    /// Sets the training-target mean used by the regression formula.
    #[must_use]
    pub fn with_target_mean(mut self, mean: f64) -> Self {
        self.target_mean = mean;
        self
    }

    #[must_use]
    pub fn metric_name(&self) -> MetricName {
        MetricName::for_task(self.task_type)
    }

    /// Normalizes one raw snapshot.
    pub fn normalize(&mut self, raw: RawMetrics) -> NormalizedMetrics {
        let accuracy = finite_or_zero(raw.accuracy.unwrap_or(0.0));
        let loss = finite_or_zero(raw.loss.unwrap_or(0.0));
        NormalizedMetrics {
            metric_name: self.metric_name(),
            accuracy,
            loss,
            accuracy_percent: self.accuracy_percent(accuracy),
            loss_percent: self.loss_percent(loss),
        }
    }

    fn accuracy_percent(&self, value: f64) -> f64 {
        let percent = match self.task_type {
            TaskType::Classification => value * 100.0,
            TaskType::Regression => {
                // Score the MAE against the target scale; a zero mean has no
                // scale to score against.
                if self.target_mean == 0.0 {
                    0.0
                } else {
                    (100.0 * (1.0 - value / self.target_mean)).clamp(0.0, 100.0)
                }
            }
            TaskType::Reinforcement => {
                (value * REWARD_PERCENT_SCALE).clamp(0.0, 100.0)
            }
        };
        finite_or_zero(percent)
    }

    fn loss_percent(&mut self, loss: f64) -> f64 {
        let initial = *self.initial_loss.get_or_insert(loss);
        if initial == 0.0 {
            return 0.0;
        }
        finite_or_zero(loss / initial * 100.0)
    }
}

/// Coerces non-finite values to zero before persistence.
#[must_use]
pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_name_per_task() {
        assert_eq!(MetricName::for_task(TaskType::Classification).as_str(), "Accuracy");
        assert_eq!(MetricName::for_task(TaskType::Regression).as_str(), "MAE");
        assert_eq!(MetricName::for_task(TaskType::Reinforcement).as_str(), "Reward");
    }

    #[test]
    fn test_classification_percent_scales_accuracy() {
        let mut normalizer = MetricNormalizer::new(TaskType::Classification);
        let metrics = normalizer
            .normalize(RawMetrics { accuracy: Some(0.875), loss: Some(0.4) });
        assert!((metrics.accuracy_percent - 87.5).abs() < 1e-9);
    }

    #[test]
    fn test_regression_percent_clamped_when_mae_exceeds_mean() {
        let mut normalizer =
            MetricNormalizer::new(TaskType::Regression).with_target_mean(10.0);
        let metrics = normalizer.normalize(RawMetrics { accuracy: Some(25.0), loss: None });
        assert_eq!(metrics.accuracy_percent, 0.0);
    }

    #[test]
    fn test_regression_percent_in_range() {
        let mut normalizer =
            MetricNormalizer::new(TaskType::Regression).with_target_mean(50.0);
        let metrics = normalizer.normalize(RawMetrics { accuracy: Some(5.0), loss: None });
        assert!((metrics.accuracy_percent - 90.0).abs() < 1e-9);
        assert!((0.0..=100.0).contains(&metrics.accuracy_percent));
    }

    #[test]
    fn test_regression_zero_mean_yields_zero_without_fault() {
        let mut normalizer =
            MetricNormalizer::new(TaskType::Regression).with_target_mean(0.0);
        let metrics = normalizer.normalize(RawMetrics { accuracy: Some(5.0), loss: None });
        assert_eq!(metrics.accuracy_percent, 0.0);
    }

    #[test]
    fn test_reward_percent_scaled_and_clamped() {
        let mut normalizer = MetricNormalizer::new(TaskType::Reinforcement);
        let modest = normalizer.normalize(RawMetrics { accuracy: Some(7.5), loss: None });
        assert!((modest.accuracy_percent - 75.0).abs() < 1e-9);

        // A long-lived policy can earn rewards far past the scale; clamp.
        let mut normalizer = MetricNormalizer::new(TaskType::Reinforcement);
        let high = normalizer.normalize(RawMetrics { accuracy: Some(200.0), loss: None });
        assert_eq!(high.accuracy_percent, 100.0);
    }

    #[test]
    fn test_initial_loss_captured_once() {
        let mut normalizer = MetricNormalizer::new(TaskType::Classification);
        let first = normalizer.normalize(RawMetrics { accuracy: Some(0.5), loss: Some(2.0) });
        assert!((first.loss_percent - 100.0).abs() < 1e-9);

        let later = normalizer.normalize(RawMetrics { accuracy: Some(0.8), loss: Some(0.5) });
        assert!((later.loss_percent - 25.0).abs() < 1e-9);

        // Rising loss legitimately reads above 100%
        let worse = normalizer.normalize(RawMetrics { accuracy: Some(0.7), loss: Some(3.0) });
        assert!((worse.loss_percent - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_initial_loss_guard() {
        let mut normalizer = MetricNormalizer::new(TaskType::Classification);
        let metrics = normalizer.normalize(RawMetrics { accuracy: Some(0.5), loss: Some(0.0) });
        assert_eq!(metrics.loss_percent, 0.0);
    }

    #[test]
    fn test_non_finite_inputs_coerced_to_zero() {
        let mut normalizer = MetricNormalizer::new(TaskType::Classification);
        let metrics = normalizer
            .normalize(RawMetrics { accuracy: Some(f64::NAN), loss: Some(f64::INFINITY) });
        assert_eq!(metrics.accuracy, 0.0);
        assert_eq!(metrics.loss, 0.0);
        assert_eq!(metrics.accuracy_percent, 0.0);
        assert_eq!(metrics.loss_percent, 0.0);
    }

    #[test]
    fn test_missing_inputs_default_to_zero() {
        let mut normalizer = MetricNormalizer::new(TaskType::Regression).with_target_mean(50.0);
        let metrics = normalizer.normalize(RawMetrics::default());
        assert_eq!(metrics.accuracy, 0.0);
        assert_eq!(metrics.loss, 0.0);
    }
}
