//! Pure cadence evaluation: claim history + elapsed time -> per-slot state.
//!
//! The evaluator never mutates. When it decides the cycle must reset it
//! reports the post-reset states with `did_reset = true` and leaves clearing
//! the history to the caller.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use serde::Serialize;

use cadence_core::ExpirationBasis;
use cadence_schedule::ScheduleConfig;

use crate::history::ClaimLookup;


/// Derived state of one slot at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    Locked,
    Claimable,
    Claimed,
    Missed,
}

impl SlotState {
    pub fn is_claimable(self) -> bool {
        self == SlotState::Claimable
    }
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotState::Locked => write!(f, "locked"),
            SlotState::Claimable => write!(f, "claimable"),
            SlotState::Claimed => write!(f, "claimed"),
            SlotState::Missed => write!(f, "missed"),
        }
    }
}

/// Result of one evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Evaluation {
    /// One entry per slot, in slot order.
    pub states: IndexMap<String, SlotState>,
    /// The history must be cleared; `states` already reflect the empty history.
    pub did_reset: bool,
    /// Next instant at which any state can change by time alone.
    pub next_recompute_at: Option<DateTime<Utc>>,
}

impl Evaluation {
    pub fn state_of(&self, slot_key: &str) -> Option<SlotState> {
        self.states.get(slot_key).copied()
    }

    /// Highest-index claimable slot.
    pub fn last_claimable(&self) -> Option<&str> {
        self.states
            .iter()
            .rev()
            .find(|(_, state)| state.is_claimable())
            .map(|(key, _)| key.as_str())
    }

    pub fn claimable_count(&self) -> usize {
        self.states.values().filter(|s| s.is_claimable()).count()
    }

    pub fn count(&self, state: SlotState) -> usize {
        self.states.values().filter(|s| **s == state).count()
    }
}

/// Evaluates schedules against a claim history.
#[derive(Debug, Clone, Copy, Default)]
pub struct CadenceEvaluator {
    expiration_basis: ExpirationBasis,
}

/// Where the current cycle stands, derived from the most recent valid claim.
struct Progress {
    highest_claimed: usize,
    last_claim: DateTime<Utc>,
    elapsed: Duration,
    missed: i64,
    pending: i64,
}

impl CadenceEvaluator {
    pub fn new(expiration_basis: ExpirationBasis) -> Self {
        Self { expiration_basis }
    }

    pub fn expiration_basis(&self) -> ExpirationBasis {
        self.expiration_basis
    }

    pub fn evaluate<H>(&self, config: &ScheduleConfig, history: &H, now: DateTime<Utc>) -> Evaluation
    where
        H: ClaimLookup + ?Sized,
    {
        let Some(progress) = self.progress(config, history, now) else {
            return fresh_cycle(config, false);
        };

        if self.should_reset(config, &progress) {
            return fresh_cycle(config, true);
        }

        let cooldown_elapsed = progress.elapsed >= config.cooldown();
        let states = config
            .slots()
            .iter()
            .enumerate()
            .map(|(index, slot)| {
                let index = index as i64;
                let state = if history.claimed_at(&slot.key).is_some() {
                    SlotState::Claimed
                } else if index > progress.pending {
                    SlotState::Locked
                } else if index == progress.pending {
                    if cooldown_elapsed {
                        SlotState::Claimable
                    } else {
                        SlotState::Locked
                    }
                } else {
                    SlotState::Missed
                };
                (slot.key.clone(), state)
            })
            .collect();

        Evaluation {
            states,
            did_reset: false,
            next_recompute_at: self.next_boundary(config, &progress, now),
        }
    }

    fn progress<H>(&self, config: &ScheduleConfig, history: &H, now: DateTime<Utc>) -> Option<Progress>
    where
        H: ClaimLookup + ?Sized,
    {
        let (highest_claimed, last_claim) = config
            .slots()
            .iter()
            .enumerate()
            .rev()
            .find_map(|(index, slot)| history.claimed_at(&slot.key).map(|at| (index, at)))?;

        let elapsed = now - last_claim;
        let missed = match config.expiration() {
            Some(expiration) if !config.reset_on_expire() && elapsed > config.cooldown() => {
                ((elapsed - config.cooldown()).num_milliseconds() / expiration.num_milliseconds()).max(0)
            }
            _ => 0,
        };

        Some(Progress {
            highest_claimed,
            last_claim,
            elapsed,
            missed,
            pending: (highest_claimed as i64)
                .saturating_add(1)
                .saturating_add(missed),
        })
    }

    fn should_reset(&self, config: &ScheduleConfig, progress: &Progress) -> bool {
        let last_index = config.last_index();
        let cooldown_elapsed = progress.elapsed >= config.cooldown();

        if cooldown_elapsed && (progress.pending > last_index as i64 || progress.highest_claimed == last_index) {
            return true;
        }

        match (config.reset_on_expire(), config.expiration()) {
            (true, Some(_)) => progress.elapsed > config.cooldown() + self.reset_window(config),
            _ => false,
        }
    }

    fn reset_window(&self, config: &ScheduleConfig) -> Duration {
        match self.expiration_basis {
            ExpirationBasis::Expiration => config.expiration().unwrap_or_else(Duration::zero),
            ExpirationBasis::Cooldown => config.cooldown(),
        }
    }

    /// Earliest future instant at which a cooldown ends, the pending slot
    /// expires, or an expiry reset fires. Boundaries past the representable
    /// range are treated as absent.
    fn next_boundary(
        &self,
        config: &ScheduleConfig,
        progress: &Progress,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let cooldown_end = progress.last_claim.checked_add_signed(config.cooldown());

        let expiry_end = cooldown_end.zip(config.expiration()).and_then(|(end, expiration)| {
            let windows = progress.missed.saturating_add(1);
            let span = Duration::try_milliseconds(expiration.num_milliseconds().saturating_mul(windows))?;
            end.checked_add_signed(span)
        });

        let reset_end = match (config.reset_on_expire(), config.expiration(), cooldown_end) {
            (true, Some(_), Some(end)) => end.checked_add_signed(self.reset_window(config)),
            _ => None,
        };

        [cooldown_end, expiry_end, reset_end]
            .into_iter()
            .flatten()
            .filter(|at| *at > now)
            .min()
    }
}

/// States for a history with no valid claims: slot 0 open, the rest locked.
fn fresh_cycle(config: &ScheduleConfig, did_reset: bool) -> Evaluation {
    let states = config
        .slots()
        .iter()
        .enumerate()
        .map(|(index, slot)| {
            let state = if index == 0 {
                SlotState::Claimable
            } else {
                SlotState::Locked
            };
            (slot.key.clone(), state)
        })
        .collect();

    Evaluation {
        states,
        did_reset,
        next_recompute_at: None,
    }
}

/// Evaluate with the default expiration basis.
pub fn evaluate<H>(config: &ScheduleConfig, history: &H, now: DateTime<Utc>) -> Evaluation
where
    H: ClaimLookup + ?Sized,
{
    CadenceEvaluator::default().evaluate(config, history, now)
}
