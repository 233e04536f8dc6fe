//! Claim validation, commit and payout.
//!
//! A claim runs in two phases. [`ClaimProcessor::commit`] evaluates against
//! "now", validates the slot and records the claim. [`ClaimProcessor::pay_out`]
//! then awaits the payout collaborator and, depending on the
//! [`CommitPolicy`], keeps or reverts the commit when the grant fails. The
//! registry persists between the two phases; [`ClaimProcessor::claim`] runs
//! both back to back.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use cadence_core::CommitPolicy;
use cadence_schedule::{Payout, ScheduleConfig};

use crate::evaluator::{CadenceEvaluator, SlotState};
use crate::history::ClaimHistory;
use crate::payout::{PayoutDescriptor, PayoutError, PayoutGranter};
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum ClaimError {
    #[error("unknown schedule '{0}'")]
    UnknownSchedule(String),

    #[error("schedule '{schedule}' has no slot '{slot}'")]
    UnknownSlot { schedule: String, slot: String },

    #[error("slot '{slot}' of '{schedule}' was already claimed this cycle")]
    AlreadyClaimed { schedule: String, slot: String },

    #[error("slot '{slot}' of '{schedule}' is not available yet")]
    NotYetAvailable { schedule: String, slot: String },

    #[error("slot '{slot}' of '{schedule}' has expired")]
    TooOld { schedule: String, slot: String },

    #[error("payout for '{slot}' of '{schedule}' failed: {source}")]
    PayoutFailed {
        schedule: String,
        slot: String,
        /// The claim was reverted after the failure.
        rolled_back: bool,
        #[source]
        source: PayoutError,
    },

    #[error("history store error: {0}")]
    Store(#[from] StoreError),
}

impl ClaimError {
    /// The claim was rejected before anything was recorded.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ClaimError::UnknownSchedule(_)
                | ClaimError::UnknownSlot { .. }
                | ClaimError::AlreadyClaimed { .. }
                | ClaimError::NotYetAvailable { .. }
                | ClaimError::TooOld { .. }
        )
    }

    /// The claim was recorded and still stands even though this is an error.
    pub fn is_committed(&self) -> bool {
        matches!(self, ClaimError::PayoutFailed { rolled_back: false, .. })
    }
}

/// Checkpoints reported while a claim runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStep {
    Validating,
    Committed,
    PayoutResolved,
}

impl ClaimStep {
    pub const TOTAL: u8 = 3;

    /// 1-based position of the step.
    pub fn number(self) -> u8 {
        match self {
            ClaimStep::Validating => 1,
            ClaimStep::Committed => 2,
            ClaimStep::PayoutResolved => 3,
        }
    }
}

/// Receives claim progress. Purely informational.
pub trait ClaimProgress: Send + Sync {
    fn report(&self, step: ClaimStep);
}

impl<F> ClaimProgress for F
where
    F: Fn(ClaimStep) + Send + Sync,
{
    fn report(&self, step: ClaimStep) {
        self(step)
    }
}

/// Progress sink that discards every report.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ClaimProgress for NoProgress {
    fn report(&self, _step: ClaimStep) {}
}

/// Proof of an accepted and paid claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimReceipt {
    pub id: Uuid,
    pub schedule_key: String,
    pub slot_key: String,
    pub claimed_at: DateTime<Utc>,
    pub payout: PayoutDescriptor,
}

/// A validated claim that has been recorded but not yet paid.
#[derive(Debug)]
pub struct CommittedClaim {
    pub schedule_key: String,
    pub slot_key: String,
    pub claimed_at: DateTime<Utc>,
    /// A pending reset was applied before recording.
    pub reset_applied: bool,
    payout: Payout,
    prior: ClaimHistory,
}

impl CommittedClaim {
    /// Undo the recorded claim. A reset applied by the commit stands.
    pub fn revert(self, history: &mut ClaimHistory) {
        *history = self.prior;
    }
}

pub struct ClaimProcessor {
    evaluator: CadenceEvaluator,
    commit_policy: CommitPolicy,
    payouts: Arc<dyn PayoutGranter>,
}

impl ClaimProcessor {
    pub fn new(payouts: Arc<dyn PayoutGranter>) -> Self {
        Self {
            evaluator: CadenceEvaluator::default(),
            commit_policy: CommitPolicy::default(),
            payouts,
        }
    }

    pub fn with_evaluator(mut self, evaluator: CadenceEvaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_commit_policy(mut self, commit_policy: CommitPolicy) -> Self {
        self.commit_policy = commit_policy;
        self
    }

    pub fn evaluator(&self) -> &CadenceEvaluator {
        &self.evaluator
    }

    pub fn commit_policy(&self) -> CommitPolicy {
        self.commit_policy
    }

    /// Validate the slot against a fresh evaluation and record the claim.
    ///
    /// On error the history is untouched, including any pending reset.
    pub fn commit(
        &self,
        config: &ScheduleConfig,
        history: &mut ClaimHistory,
        slot_key: &str,
        now: DateTime<Utc>,
        progress: &dyn ClaimProgress,
    ) -> Result<CommittedClaim, ClaimError> {
        progress.report(ClaimStep::Validating);

        let schedule = config.key();
        let slot = config.slot(slot_key).ok_or_else(|| ClaimError::UnknownSlot {
            schedule: schedule.to_string(),
            slot: slot_key.to_string(),
        })?;

        let evaluation = self.evaluator.evaluate(config, history, now);
        let state = evaluation.state_of(slot_key).unwrap_or(SlotState::Locked);
        if state != SlotState::Claimable {
            debug!(schedule = %schedule, slot = %slot_key, state = %state, "claim rejected");
            let (schedule, slot) = (schedule.to_string(), slot_key.to_string());
            return Err(match state {
                SlotState::Claimed => ClaimError::AlreadyClaimed { schedule, slot },
                SlotState::Missed => ClaimError::TooOld { schedule, slot },
                _ => ClaimError::NotYetAvailable { schedule, slot },
            });
        }

        if evaluation.did_reset {
            info!(schedule = %schedule, "applying pending reset before claim");
            history.clear();
        }
        let prior = history.clone();
        history.record(slot_key, now);
        progress.report(ClaimStep::Committed);

        Ok(CommittedClaim {
            schedule_key: schedule.to_string(),
            slot_key: slot_key.to_string(),
            claimed_at: now,
            reset_applied: evaluation.did_reset,
            payout: slot.payout.clone(),
            prior,
        })
    }

    /// Await the payout for a committed claim.
    ///
    /// Under [`CommitPolicy::RollbackOnPayoutFailure`] a failed grant reverts
    /// the claim in `history`; otherwise the claim stands.
    pub async fn pay_out(
        &self,
        committed: CommittedClaim,
        history: &mut ClaimHistory,
        progress: &dyn ClaimProgress,
    ) -> Result<ClaimReceipt, ClaimError> {
        let outcome = self.payouts.grant(&committed.payout).await;
        progress.report(ClaimStep::PayoutResolved);

        match outcome {
            Ok(payout) => {
                info!(
                    schedule = %committed.schedule_key,
                    slot = %committed.slot_key,
                    payout = %payout.payout_id,
                    "claim paid out"
                );
                Ok(ClaimReceipt {
                    id: Uuid::new_v4(),
                    schedule_key: committed.schedule_key,
                    slot_key: committed.slot_key,
                    claimed_at: committed.claimed_at,
                    payout,
                })
            }
            Err(source) => {
                let rolled_back = self.commit_policy == CommitPolicy::RollbackOnPayoutFailure;
                warn!(
                    schedule = %committed.schedule_key,
                    slot = %committed.slot_key,
                    error = %source,
                    rolled_back,
                    "payout failed"
                );
                let (schedule, slot) = (committed.schedule_key.clone(), committed.slot_key.clone());
                if rolled_back {
                    committed.revert(history);
                }
                Err(ClaimError::PayoutFailed {
                    schedule,
                    slot,
                    rolled_back,
                    source,
                })
            }
        }
    }

    /// Validate, record and pay out in one go.
    pub async fn claim(
        &self,
        config: &ScheduleConfig,
        history: &mut ClaimHistory,
        slot_key: &str,
        now: DateTime<Utc>,
        progress: &dyn ClaimProgress,
    ) -> Result<ClaimReceipt, ClaimError> {
        let committed = self.commit(config, history, slot_key, now, progress)?;
        self.pay_out(committed, history, progress).await
    }
}
