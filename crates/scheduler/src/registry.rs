//! The live set of schedules with their claim histories.
//!
//! Each schedule sits behind its own async mutex. A claim holds that lock for
//! its whole pipeline (validate, commit, persist, pay out), so claims on one
//! schedule are serialized while different schedules proceed independently.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use cadence_core::{ClaimConfig, Clock, CommitPolicy, ExpirationBasis, SystemClock};
use cadence_schedule::{ScheduleConfig, ScheduleSource};

use crate::claim::{ClaimError, ClaimProcessor, ClaimReceipt, ClaimStep};
use crate::evaluator::{CadenceEvaluator, Evaluation, SlotState};
use crate::events::SchedulerEvent;
use crate::history::ClaimHistory;
use crate::payout::PayoutGranter;
use crate::store::{HistoryStore, StoreError};

const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Point-in-time view of one schedule.
#[derive(Debug, Clone)]
pub struct ScheduleSnapshot {
    pub config: Arc<ScheduleConfig>,
    pub claims: ClaimHistory,
    pub evaluation: Evaluation,
    pub evaluated_at: DateTime<Utc>,
}

impl ScheduleSnapshot {
    pub fn key(&self) -> &str {
        self.config.key()
    }

    pub fn name(&self) -> &str {
        self.config.name()
    }

    pub fn state_of(&self, slot_key: &str) -> Option<SlotState> {
        self.evaluation.state_of(slot_key)
    }
}

/// Outcome of [`SchedulerRegistry::refresh_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub evaluated: usize,
    pub reset: Vec<String>,
    pub changed: Vec<String>,
}

struct ScheduleEntry {
    config: Arc<ScheduleConfig>,
    history: ClaimHistory,
    /// States as of the last resync, for change detection.
    states: IndexMap<String, SlotState>,
}

/// Result of re-evaluating one entry.
struct Resync {
    reset: bool,
    changed: bool,
}

type SharedEntry = Arc<Mutex<ScheduleEntry>>;

pub struct RegistryBuilder {
    store: Arc<dyn HistoryStore>,
    payouts: Arc<dyn PayoutGranter>,
    clock: Arc<dyn Clock>,
    commit_policy: CommitPolicy,
    expiration_basis: ExpirationBasis,
    event_capacity: usize,
}

impl RegistryBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn commit_policy(mut self, commit_policy: CommitPolicy) -> Self {
        self.commit_policy = commit_policy;
        self
    }

    pub fn expiration_basis(mut self, expiration_basis: ExpirationBasis) -> Self {
        self.expiration_basis = expiration_basis;
        self
    }

    /// Apply both claim policies from configuration.
    pub fn claim_config(self, claims: &ClaimConfig) -> Self {
        self.commit_policy(claims.commit_policy)
            .expiration_basis(claims.expiration_basis)
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// Load every schedule from `source` and its history from the store.
    pub fn build(self, source: &dyn ScheduleSource) -> Result<SchedulerRegistry, StoreError> {
        let processor = ClaimProcessor::new(self.payouts)
            .with_evaluator(CadenceEvaluator::new(self.expiration_basis))
            .with_commit_policy(self.commit_policy);
        let (events, _) = broadcast::channel(self.event_capacity);

        let registry = SchedulerRegistry {
            entries: RwLock::new(BTreeMap::new()),
            store: self.store,
            processor,
            clock: self.clock,
            events,
        };

        let now = registry.clock.now();
        let mut entries = BTreeMap::new();
        for config in source.schedules() {
            let entry = registry.load_entry(config, now)?;
            if entries.insert(entry.config.key().to_string(), Arc::new(Mutex::new(entry))).is_some() {
                warn!("duplicate schedule key in source, keeping the last definition");
            }
        }

        info!(
            schedules = entries.len(),
            commit_policy = %registry.processor.commit_policy(),
            expiration_basis = %registry.processor.evaluator().expiration_basis(),
            "scheduler registry initialized"
        );
        *registry.entries.write().expect("registry entries lock poisoned") = entries;
        Ok(registry)
    }
}

pub struct SchedulerRegistry {
    entries: RwLock<BTreeMap<String, SharedEntry>>,
    store: Arc<dyn HistoryStore>,
    processor: ClaimProcessor,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<SchedulerEvent>,
}

impl SchedulerRegistry {
    pub fn builder(store: Arc<dyn HistoryStore>, payouts: Arc<dyn PayoutGranter>) -> RegistryBuilder {
        RegistryBuilder {
            store,
            payouts,
            clock: Arc::new(SystemClock),
            commit_policy: CommitPolicy::default(),
            expiration_basis: ExpirationBasis::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.events.subscribe()
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("registry entries lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Schedule keys in sorted order.
    pub fn schedule_keys(&self) -> Vec<String> {
        self.entries
            .read()
            .expect("registry entries lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    pub async fn find_schedule(&self, key: &str) -> Option<ScheduleSnapshot> {
        let entry = self.entry(key)?;
        let guard = entry.lock().await;
        Some(self.snapshot(&guard, self.clock.now()))
    }

    /// Append a snapshot of every schedule to `target`, optionally clearing it first.
    pub async fn list_schedules(&self, target: &mut Vec<ScheduleSnapshot>, clear: bool) {
        if clear {
            target.clear();
        }
        let now = self.clock.now();
        for entry in self.all_entries() {
            let guard = entry.lock().await;
            target.push(self.snapshot(&guard, now));
        }
    }

    /// Highest-index claimable slot of a schedule.
    pub async fn last_claimable_slot(&self, key: &str) -> Option<String> {
        self.find_schedule(key)
            .await?
            .evaluation
            .last_claimable()
            .map(str::to_string)
    }

    /// Claim a slot, persist the history and grant its payout.
    ///
    /// The commit is saved before the payout is awaited. If the save fails
    /// the commit is reverted and nothing is paid.
    pub async fn claim(&self, schedule_key: &str, slot_key: &str) -> Result<ClaimReceipt, ClaimError> {
        let entry = self
            .entry(schedule_key)
            .ok_or_else(|| ClaimError::UnknownSchedule(schedule_key.to_string()))?;

        let progress = |step: ClaimStep| {
            self.emit(SchedulerEvent::ClaimProgressed {
                schedule: schedule_key.to_string(),
                slot: slot_key.to_string(),
                step,
                total_steps: ClaimStep::TOTAL,
            })
        };

        let mut guard = entry.lock().await;
        let entry = &mut *guard;
        self.emit(SchedulerEvent::ClaimInitiated {
            schedule: schedule_key.to_string(),
            slot: slot_key.to_string(),
        });
        let now = self.clock.now();

        let outcome = match self
            .processor
            .commit(&entry.config, &mut entry.history, slot_key, now, &progress)
        {
            Ok(committed) => {
                if committed.reset_applied {
                    self.emit(SchedulerEvent::ScheduleReset {
                        schedule: schedule_key.to_string(),
                    });
                }
                match self.persist(entry) {
                    Ok(()) => {
                        let result = self
                            .processor
                            .pay_out(committed, &mut entry.history, &progress)
                            .await;
                        if matches!(result, Err(ClaimError::PayoutFailed { rolled_back: true, .. })) {
                            if let Err(e) = self.persist(entry) {
                                warn!(schedule = %schedule_key, error = %e, "failed to persist rolled back history");
                            }
                        }
                        result
                    }
                    Err(e) => {
                        warn!(schedule = %schedule_key, slot = %slot_key, error = %e, "failed to persist claim, reverting");
                        committed.revert(&mut entry.history);
                        Err(ClaimError::Store(e))
                    }
                }
            }
            Err(e) => Err(e),
        };

        match &outcome {
            Ok(receipt) => self.emit(SchedulerEvent::ClaimSucceeded {
                schedule: schedule_key.to_string(),
                slot: slot_key.to_string(),
                receipt: receipt.clone(),
            }),
            Err(e) => self.emit(SchedulerEvent::ClaimFailed {
                schedule: schedule_key.to_string(),
                slot: slot_key.to_string(),
                error: e.to_string(),
                committed: e.is_committed(),
            }),
        }

        self.resync(entry, self.clock.now());
        outcome
    }

    /// Re-evaluate every schedule, applying due resets and announcing changes.
    ///
    /// With `force`, histories are first reloaded from the store; a schedule
    /// whose load fails keeps its in-memory history.
    pub async fn refresh_all(&self, force: bool) -> RefreshReport {
        let mut report = RefreshReport::default();
        let now = self.clock.now();

        for entry in self.all_entries() {
            let mut guard = entry.lock().await;
            let key = guard.config.key().to_string();

            if force {
                match self.store.load(&key) {
                    Ok(Some(persisted)) => guard.history = ClaimHistory::from_persisted(&persisted, &guard.config),
                    Ok(None) => guard.history.clear(),
                    Err(e) => warn!(schedule = %key, error = %e, "failed to reload claim history"),
                }
            }

            let resync = self.resync(&mut guard, now);
            report.evaluated += 1;
            if resync.reset {
                report.reset.push(key.clone());
            }
            if resync.changed {
                report.changed.push(key);
            }
        }

        debug!(
            evaluated = report.evaluated,
            reset = report.reset.len(),
            changed = report.changed.len(),
            "refreshed schedules"
        );
        report
    }

    /// Bring the registry in line with the current catalog.
    ///
    /// New schedules are loaded from the store, removed ones are dropped, and
    /// redefined ones keep only history for slots that still exist.
    pub async fn sync_schedules(&self, source: &dyn ScheduleSource) -> Result<(), StoreError> {
        let now = self.clock.now();
        let configs: BTreeMap<String, Arc<ScheduleConfig>> = source
            .schedules()
            .into_iter()
            .map(|config| (config.key().to_string(), config))
            .collect();

        for (key, entry) in self.all_keyed_entries() {
            match configs.get(&key) {
                None => {
                    self.entries
                        .write()
                        .expect("registry entries lock poisoned")
                        .remove(&key);
                    info!(schedule = %key, "schedule removed from registry");
                }
                Some(config) => {
                    let mut guard = entry.lock().await;
                    if guard.config.as_ref() != config.as_ref() {
                        guard.history = ClaimHistory::from_persisted(&guard.history.to_persisted(), config);
                        guard.config = Arc::clone(config);
                        info!(schedule = %key, "schedule definition updated");
                    }
                }
            }
        }

        for (key, config) in configs {
            if self.entry(&key).is_some() {
                continue;
            }
            let entry = self.load_entry(config, now)?;
            info!(schedule = %key, "schedule added to registry");
            self.entries
                .write()
                .expect("registry entries lock poisoned")
                .insert(key, Arc::new(Mutex::new(entry)));
        }
        Ok(())
    }

    // ── internals ─────────────────────────────────────────────

    fn emit(&self, event: SchedulerEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn entry(&self, key: &str) -> Option<SharedEntry> {
        self.entries
            .read()
            .expect("registry entries lock poisoned")
            .get(key)
            .cloned()
    }

    fn all_entries(&self) -> Vec<SharedEntry> {
        self.entries
            .read()
            .expect("registry entries lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    fn all_keyed_entries(&self) -> Vec<(String, SharedEntry)> {
        self.entries
            .read()
            .expect("registry entries lock poisoned")
            .iter()
            .map(|(k, e)| (k.clone(), Arc::clone(e)))
            .collect()
    }

    /// Build an entry from persisted history, applying any reset already due.
    fn load_entry(&self, config: Arc<ScheduleConfig>, now: DateTime<Utc>) -> Result<ScheduleEntry, StoreError> {
        let history = match self.store.load(config.key())? {
            Some(persisted) => ClaimHistory::from_persisted(&persisted, &config),
            None => ClaimHistory::new(),
        };

        let mut entry = ScheduleEntry {
            config,
            history,
            states: IndexMap::new(),
        };
        let evaluation = self.processor.evaluator().evaluate(&entry.config, &entry.history, now);
        if evaluation.did_reset {
            info!(schedule = %entry.config.key(), "reset due at load");
            entry.history.clear();
            self.persist(&entry)?;
        }
        entry.states = evaluation.states;
        Ok(entry)
    }

    fn snapshot(&self, entry: &ScheduleEntry, now: DateTime<Utc>) -> ScheduleSnapshot {
        ScheduleSnapshot {
            config: Arc::clone(&entry.config),
            claims: entry.history.clone(),
            evaluation: self.processor.evaluator().evaluate(&entry.config, &entry.history, now),
            evaluated_at: now,
        }
    }

    fn persist(&self, entry: &ScheduleEntry) -> Result<(), StoreError> {
        self.store.save(entry.config.key(), &entry.history.to_persisted())
    }

    /// Re-evaluate one entry: clear and persist on reset, then diff states.
    fn resync(&self, entry: &mut ScheduleEntry, now: DateTime<Utc>) -> Resync {
        let key = entry.config.key().to_string();
        let evaluation = self.processor.evaluator().evaluate(&entry.config, &entry.history, now);

        if evaluation.did_reset {
            entry.history.clear();
            if let Err(e) = self.persist(entry) {
                warn!(schedule = %key, error = %e, "failed to persist reset history");
            }
            info!(schedule = %key, "schedule reset");
            self.emit(SchedulerEvent::ScheduleReset { schedule: key.clone() });
        }

        let changed = entry.states != evaluation.states;
        if changed {
            debug!(schedule = %key, "schedule state changed");
            entry.states = evaluation.states;
            self.emit(SchedulerEvent::ScheduleStateChanged { schedule: key });
        }

        Resync {
            reset: evaluation.did_reset,
            changed,
        }
    }
}
