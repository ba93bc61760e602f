//! Saved-model artifacts.
//!
//! A completed run leaves one JSON checkpoint in the saved-models directory,
//! keyed by model id (not session id) so the inference side can find it
//! without knowing which run produced it. The file carries a sha256 of its
//! payload so consumers can verify what they load.

use crate::error::{TrainingError, TrainingResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Weights of an epoch-trained model.
    IterativeCheckpoint,
    /// A single-call-fitted ensemble model.
    EnsembleModel,
    /// A learned reinforcement policy.
    RlPolicy,
}

/// Serialized model payload produced by a trainer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub kind: ArtifactKind,
    pub architecture: String,
    pub payload: serde_json::Value,
}

/// On-disk checkpoint format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedModel {
    pub model_id: String,
    pub kind: ArtifactKind,
    pub architecture: String,
    pub created_at: DateTime<Utc>,
    pub sha256: String,
    pub payload: serde_json::Value,
}

/// Writes artifacts into the configured saved-models directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Well-known location for a model's checkpoint. Reinforcement policies
    /// get their own suffix, matching what the inference side expects.
    #[must_use]
    pub fn path_for(&self, model_id: &str, kind: ArtifactKind) -> PathBuf {
        let file_name = match kind {
            ArtifactKind::RlPolicy => format!("{model_id}_rl.json"),
            _ => format!("{model_id}.json"),
        };
        self.dir.join(file_name)
    }

    /// Persists the artifact and returns the path it was written to.
    pub fn write(&self, model_id: &str, artifact: &ModelArtifact) -> TrainingResult<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;

        let payload_bytes = serde_json::to_vec(&artifact.payload)?;
        let saved = SavedModel {
            model_id: model_id.to_string(),
            kind: artifact.kind,
            architecture: artifact.architecture.clone(),
            created_at: Utc::now(),
            sha256: sha256_hex(&payload_bytes),
            payload: artifact.payload.clone(),
        };

        let path = self.path_for(model_id, artifact.kind);
        std::fs::write(&path, serde_json::to_string_pretty(&saved)?)?;
        Ok(path)
    }

    /// Reads a checkpoint back, verifying its payload checksum.
    pub fn read(&self, path: &Path) -> TrainingResult<SavedModel> {
        let bytes = std::fs::read(path)?;
        let saved: SavedModel = serde_json::from_slice(&bytes)?;

        let payload_bytes = serde_json::to_vec(&saved.payload)?;
        if sha256_hex(&payload_bytes) != saved.sha256 {
            return Err(TrainingError::Artifact(format!(
                "checksum mismatch for {}",
                path.display()
            )));
        }
        Ok(saved)
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_then_read_verifies_checksum() {
        let temp = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp.path().to_path_buf());

        let artifact = ModelArtifact {
            kind: ArtifactKind::EnsembleModel,
            architecture: "RandomForest".to_string(),
            payload: serde_json::json!({"centroids": [[0.0, 1.0]]}),
        };
        let path = store.write("model-7", &artifact).unwrap();
        assert_eq!(path.file_name().unwrap(), "model-7.json");

        let saved = store.read(&path).unwrap();
        assert_eq!(saved.model_id, "model-7");
        assert_eq!(saved.kind, ArtifactKind::EnsembleModel);
    }

    #[test]
    fn test_rl_policies_get_their_own_suffix() {
        let store = ArtifactStore::new(PathBuf::from("/tmp/models"));
        let path = store.path_for("model-3", ArtifactKind::RlPolicy);
        assert_eq!(path.file_name().unwrap(), "model-3_rl.json");
    }

    #[test]
    fn test_tampered_payload_is_rejected() {
        let temp = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp.path().to_path_buf());

        let artifact = ModelArtifact {
            kind: ArtifactKind::IterativeCheckpoint,
            architecture: "LSTM".to_string(),
            payload: serde_json::json!({"weights": [1.0]}),
        };
        let path = store.write("model-1", &artifact).unwrap();

        let mut saved: SavedModel =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        saved.payload = serde_json::json!({"weights": [9.0]});
        std::fs::write(&path, serde_json::to_string(&saved).unwrap()).unwrap();

        assert!(matches!(store.read(&path), Err(TrainingError::Artifact(_))));
    }
}
