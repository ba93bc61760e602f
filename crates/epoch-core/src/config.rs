//! Process-wide configuration.
//!
//! Resolved once at startup and passed down by value; nothing mutates it
//! afterwards.

use std::path::PathBuf;

/// Default session store location for local development.
pub const DEFAULT_DB_PATH: &str = "epoch-ml.db";

/// Default directory for saved model artifacts.
pub const DEFAULT_MODELS_DIR: &str = "models/saved";

/// Configuration for one trainer process invocation.
#[derive(Debug, Clone)]
pub struct EpochConfig {
    /// Path to the SQLite session store.
    pub db_path: PathBuf,
    /// Directory where model artifacts are written, keyed by model id.
    pub saved_models_dir: PathBuf,
}

impl Default for EpochConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            saved_models_dir: PathBuf::from(DEFAULT_MODELS_DIR),
        }
    }
}

impl EpochConfig {
    /// Build a configuration from the environment.
    ///
    /// `EPOCH_DB_PATH` overrides the store location, `EPOCH_MODELS_DIR` the
    /// artifact directory. Both fall back to the local-development defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let db_path = std::env::var("EPOCH_DB_PATH")
            .map_or_else(|_| PathBuf::from(DEFAULT_DB_PATH), PathBuf::from);
        let saved_models_dir = std::env::var("EPOCH_MODELS_DIR")
            .map_or_else(|_| PathBuf::from(DEFAULT_MODELS_DIR), PathBuf::from);
        Self { db_path, saved_models_dir }
    }
}
