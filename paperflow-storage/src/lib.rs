//! # paperflow-storage
//!
//! SQLite persistence layer for the Paperflow engine.
//! Single write connection + read pool (WAL mode), versioned forward-only
//! migrations, and per-entity query modules.

pub mod engine;
pub mod migrations;
pub mod pool;
pub mod queries;

pub use engine::StorageEngine;

use chrono::{DateTime, Utc};
use paperflow_core::errors::StorageError;

/// Result alias used throughout the persistence layer.
pub type StorageResult<T> = Result<T, StorageError>;

/// Helper to convert a string message into a StorageError.
pub fn to_storage_err(msg: String) -> StorageError {
    StorageError::SqliteError { message: msg }
}

/// Parse an RFC 3339 timestamp column.
pub(crate) fn parse_ts(raw: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| to_storage_err(format!("bad timestamp '{raw}': {e}")))
}

/// Parse an optional RFC 3339 timestamp column.
pub(crate) fn parse_opt_ts(raw: Option<&str>) -> StorageResult<Option<DateTime<Utc>>> {
    raw.map(parse_ts).transpose()
}
