//! Storage layer for Epoch Core.
//!
//! Provides SQLite persistence behind a thin `Database` wrapper. The session
//! repository built on top of it lives in `crate::session`.

// SQL strings don't need hash-less raw strings
#![allow(clippy::needless_raw_string_hashes)]

pub mod database;
pub mod error;

pub use database::Database;
pub use error::{StorageError, StorageResult};
