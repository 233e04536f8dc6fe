//! Error types and load result structures for the schedule loader.

use std::path::PathBuf;

use crate::config::ScheduleError;

/// Errors that can occur while loading or writing schedule documents.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Filesystem I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse/deserialization error.
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Header or field validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unparseable cooldown/expiration duration.
    #[error("Duration error: {0}")]
    Duration(#[from] cadence_core::CadenceError),

    /// Slot list rejected by [`ScheduleConfig::new`](crate::ScheduleConfig::new).
    #[error("Schedule error: {0}")]
    Schedule(#[from] ScheduleError),

    /// Filesystem watcher error.
    #[error("Notify watcher error: {0}")]
    Notify(#[from] notify::Error),
}

/// Result alias for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Outcome of loading a single schedule file.
#[derive(Debug)]
pub struct LoadResult {
    /// Path to the file that was loaded.
    pub path: PathBuf,
    /// Status of the load attempt.
    pub status: LoadStatus,
}

/// Status of a single file load attempt.
#[derive(Debug)]
pub enum LoadStatus {
    /// Schedule was successfully loaded.
    Loaded { schedule_id: String },
    /// File was skipped (dotfile, non-YAML, etc.).
    Skipped { reason: String },
    /// Parse or validation error occurred.
    Failed { error: String },
}
