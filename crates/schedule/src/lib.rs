//! Reward schedule catalog.
//!
//! This crate provides:
//! - Immutable, validated [`ScheduleConfig`] definitions (ordered slots with payouts)
//! - The [`Payoutable`] tagged variant describing what a slot grants
//! - YAML document schema for `RewardSchedule` files
//! - Filesystem loader with hot-reload via `notify` watcher
//! - [`ScheduleSource`], the seam the scheduler registry reads schedules through

pub mod config;
pub mod loader;
pub mod payout;
pub mod schema;
pub mod source;

pub use config::{ScheduleConfig, ScheduleError, SlotConfig};
pub use loader::{CatalogError, LoadResult, LoadStatus, ScheduleLoader};
pub use payout::{Payout, Payoutable};
pub use schema::ScheduleDocument;
pub use source::ScheduleSource;
