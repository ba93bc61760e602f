//! Model descriptors.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Task type of a run; determines which metric semantics apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Classification,
    Regression,
    Reinforcement,
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Classification => "classification",
            Self::Regression => "regression",
            Self::Reinforcement => "reinforcement",
        };
        f.write_str(s)
    }
}

/// Read-only description of the model a session trains.
///
/// Assembled by the job runner from the claimed session document, the
/// architecture tag in the hyperparameters, and the task type of the
/// resolved dataset.
#[derive(Debug, Clone)]
pub struct ModelDescriptor {
    /// Keys the saved artifact (not the session id).
    pub model_id: String,
    /// Architecture tag as supplied by the caller, e.g. "LSTM" or
    /// "Random Forest". May be empty when the caller did not pick one.
    pub architecture: String,
    pub task_type: TaskType,
}
