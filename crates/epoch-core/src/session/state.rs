//! Session state definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a training session.
///
/// Transitions are monotonic: `pending → running → {completed, failed}`.
/// `completed` and `failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Session has been created but no trainer has claimed it yet.
    Pending,
    /// A trainer process owns the session and is reporting progress.
    Running,
    /// Training finished and the artifact was written.
    Completed,
    /// Training aborted; the last reported progress is frozen.
    Failed,
}

impl SessionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether this status admits no further status writes.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Checks if the session can transition to the given status.
    #[must_use]
    pub fn can_transition_to(self, to: Self) -> bool {
        match (self, to) {
            // From Pending: a trainer claims the session, or an input fault
            // fails it before any trainer ran.
            (Self::Pending, Self::Running | Self::Failed) => true,
            // From Running: only into a terminal state.
            (Self::Running, Self::Completed | Self::Failed) => true,
            // Terminal states accept nothing.
            _ => false,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown session status: {other}")),
        }
    }
}

/// A training session document as persisted in the store.
///
/// Metric fields stay `None` until the first progress update of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSession {
    /// Opaque unique identifier, assigned externally before training starts.
    pub id: String,
    /// Model the session trains; keys the saved artifact.
    pub model_id: String,
    /// Dataset (or environment) tag the run trains against.
    pub dataset_id: String,
    pub status: SessionStatus,
    /// 0-100, non-decreasing within a run.
    pub progress: f64,
    pub current_epoch: Option<u32>,
    pub total_epochs: Option<u32>,
    /// "Accuracy", "MAE" or "Reward"; fixed for the lifetime of one run.
    pub metric_name: Option<String>,
    pub accuracy: Option<f64>,
    pub loss: Option<f64>,
    pub accuracy_percent: Option<f64>,
    pub loss_percent: Option<f64>,
    /// Flat hyperparameter map the run was started with.
    pub parameters_json: Option<String>,
    pub start_time: DateTime<Utc>,
    /// Set exactly once, on the transition into a terminal state.
    pub end_time: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl TrainingSession {
    /// Create a new pending session.
    #[must_use]
    pub fn new(id: impl Into<String>, model_id: impl Into<String>, dataset_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            model_id: model_id.into(),
            dataset_id: dataset_id.into(),
            status: SessionStatus::Pending,
            progress: 0.0,
            current_epoch: None,
            total_epochs: None,
            metric_name: None,
            accuracy: None,
            loss: None,
            accuracy_percent: None,
            loss_percent: None,
            parameters_json: None,
            start_time: now,
            end_time: None,
            updated_at: now,
        }
    }
}
