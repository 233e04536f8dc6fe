//! Reward cadence scheduling.
//!
//! Given an ordered list of reward slots, a cooldown, an optional expiration
//! window and a history of claim timestamps, the [`CadenceEvaluator`] derives
//! which slot is locked, claimable, claimed or missed purely from elapsed
//! time. The [`ClaimProcessor`] validates and commits claims and drives the
//! payout, and the [`SchedulerRegistry`] owns one history per schedule,
//! persists it through a [`HistoryStore`] and broadcasts [`SchedulerEvent`]s.
//!
//! Nothing here runs on a timer: every query or claim samples "now" from a
//! [`Clock`](cadence_core::Clock) and recomputes.

pub mod claim;
pub mod evaluator;
pub mod events;
pub mod history;
pub mod payout;
pub mod registry;
pub mod store;

pub use claim::{ClaimError, ClaimProcessor, ClaimProgress, ClaimReceipt, ClaimStep, CommittedClaim};
pub use evaluator::{evaluate, CadenceEvaluator, Evaluation, SlotState};
pub use events::SchedulerEvent;
pub use history::{ClaimHistory, ClaimLookup, PersistedHistory};
pub use payout::{Inventory, InventoryLedger, PayoutDescriptor, PayoutError, PayoutGranter};
pub use registry::{RefreshReport, RegistryBuilder, ScheduleSnapshot, SchedulerRegistry};
pub use store::{HistoryStore, JsonFileStore, MemoryStore, StoreError};
