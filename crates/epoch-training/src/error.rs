use epoch_core::SessionError;
use thiserror::Error;

pub type TrainingResult<T> = std::result::Result<T, TrainingError>;

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("invalid training parameters: {0}")]
    InvalidParams(String),

    #[error("unknown dataset: {0}")]
    UnknownDataset(String),

    #[error("trainer error: {0}")]
    Trainer(String),

    #[error("artifact error: {0}")]
    Artifact(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
