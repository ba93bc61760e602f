//! Hyperparameter parsing and validation.

use crate::error::{TrainingError, TrainingResult};
use serde::{Deserialize, Serialize};

/// Flat hyperparameter map a job is invoked with.
///
/// Field names and defaults follow the session schema callers already write
/// (`learningRate`, `batchSize`, ...). Unknown keys are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrainingParams {
    /// Architecture tag selecting a trainer implementation.
    pub architecture: Option<String>,
    /// Epoch count for iterative trainers.
    pub epochs: u32,
    /// Total environment steps for reinforcement trainers.
    pub timesteps: u64,
    pub learning_rate: f64,
    pub batch_size: u32,
    /// Environment override for reinforcement runs.
    pub environment: Option<String>,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            architecture: None,
            epochs: 10,
            timesteps: 10_000,
            learning_rate: 0.001,
            batch_size: 32,
            environment: None,
        }
    }
}

impl TrainingParams {
    /// Parses the flat JSON mapping a job is started with.
    pub fn parse(json: &str) -> TrainingResult<Self> {
        let params: Self = serde_json::from_str(json)
            .map_err(|e| TrainingError::InvalidParams(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> TrainingResult<()> {
        if self.epochs == 0 {
            return Err(TrainingError::InvalidParams("epochs must be >= 1".to_string()));
        }
        if self.timesteps == 0 {
            return Err(TrainingError::InvalidParams("timesteps must be >= 1".to_string()));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(TrainingError::InvalidParams("learningRate must be > 0".to_string()));
        }
        if self.batch_size == 0 {
            return Err(TrainingError::InvalidParams("batchSize must be >= 1".to_string()));
        }
        Ok(())
    }

    /// Architecture tag, or an empty string when the caller did not pick one.
    #[must_use]
    pub fn architecture_tag(&self) -> &str {
        self.architecture.as_deref().unwrap_or("")
    }
}
