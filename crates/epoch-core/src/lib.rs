//! Epoch Core
//!
//! Session-store primitives for the Epoch training platform:
//! - SQLite persistence layer (`storage`)
//! - The training-session document, its state machine, and the store that
//!   enforces it (`session`)
//! - Process-wide configuration (`config`)

pub mod config;
pub mod session;
pub mod storage;

pub use config::EpochConfig;
pub use session::{
    SessionError, SessionResult, SessionStatus, SessionStore, SessionUpdate, TrainingSession,
};
pub use storage::{Database, StorageError, StorageResult};
