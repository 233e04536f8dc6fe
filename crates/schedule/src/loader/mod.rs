//! Filesystem schedule loader with hot-reload via `notify` watcher.
//!
//! Scans the schedules directory for YAML documents, validates each into a
//! [`ScheduleConfig`](crate::ScheduleConfig), and keeps both the raw documents
//! and the built configs in memory keyed by schedule id.

mod core;
mod error;
mod watcher;

#[cfg(test)]
mod tests;

pub use self::core::ScheduleLoader;
pub use self::error::{CatalogError, LoadResult, LoadStatus, Result};
