//! Claim history in its two encodings.
//!
//! [`ClaimHistory`] is the keyed in-memory form the registry mutates.
//! [`PersistedHistory`] is the parallel key/timestamp sequence handed to the
//! persistence layer. Both implement [`ClaimLookup`], which is all the
//! evaluator needs, so live queries and the save/load path share one
//! evaluation routine.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use cadence_schedule::ScheduleConfig;

/// Read access to "when was this slot claimed in the current cycle".
pub trait ClaimLookup {
    fn claimed_at(&self, slot_key: &str) -> Option<DateTime<Utc>>;
}

/// Keyed claim history for one schedule, in claim order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimHistory {
    claims: IndexMap<String, DateTime<Utc>>,
}

impl ClaimHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a claim. Returns the previous timestamp if the slot was already present.
    pub fn record(&mut self, slot_key: impl Into<String>, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.claims.insert(slot_key.into(), at)
    }

    /// Drop every claim, starting a new cycle.
    pub fn clear(&mut self) {
        self.claims.clear();
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, DateTime<Utc>)> {
        self.claims.iter().map(|(k, t)| (k.as_str(), *t))
    }

    /// Build from the persisted form, keeping only keys the schedule still defines.
    ///
    /// Unknown or stale keys are dropped with a warning; a repeated key keeps
    /// its last timestamp.
    pub fn from_persisted(persisted: &PersistedHistory, config: &ScheduleConfig) -> Self {
        if persisted.keys.len() != persisted.timestamps.len() {
            warn!(
                schedule = %config.key(),
                keys = persisted.keys.len(),
                timestamps = persisted.timestamps.len(),
                "persisted history sequences differ in length, truncating to the shorter"
            );
        }

        let mut history = Self::new();
        for (key, at) in persisted.entries() {
            if !config.contains_slot(key) {
                warn!(schedule = %config.key(), slot = %key, "dropping persisted claim for unknown slot");
                continue;
            }
            history.record(key, at);
        }
        history
    }

    /// Encode as parallel key/timestamp sequences.
    pub fn to_persisted(&self) -> PersistedHistory {
        let (keys, timestamps) = self.claims.iter().map(|(k, t)| (k.clone(), *t)).unzip();
        PersistedHistory { keys, timestamps }
    }
}

impl ClaimLookup for ClaimHistory {
    fn claimed_at(&self, slot_key: &str) -> Option<DateTime<Utc>> {
        self.claims.get(slot_key).copied()
    }
}

/// Persisted claim history: `keys[i]` was claimed at `timestamps[i]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedHistory {
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub timestamps: Vec<DateTime<Utc>>,
}

impl PersistedHistory {
    /// Paired entries; extra elements in the longer sequence are ignored.
    pub fn entries(&self) -> impl Iterator<Item = (&str, DateTime<Utc>)> {
        self.keys
            .iter()
            .map(String::as_str)
            .zip(self.timestamps.iter().copied())
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty() || self.timestamps.is_empty()
    }
}

impl ClaimLookup for PersistedHistory {
    /// Last matching entry wins, mirroring [`ClaimHistory::from_persisted`].
    fn claimed_at(&self, slot_key: &str) -> Option<DateTime<Utc>> {
        self.entries()
            .filter(|(k, _)| *k == slot_key)
            .map(|(_, t)| t)
            .last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_schedule::{Payout, SlotConfig};
    use chrono::Duration;

    fn schedule(keys: &[&str]) -> ScheduleConfig {
        let slots = keys
            .iter()
            .map(|k| SlotConfig::new(*k, Payout::new(*k, vec![])))
            .collect();
        ScheduleConfig::new("test", 60, 0, false, slots).unwrap()
    }

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(secs)
    }

    #[test]
    fn persisted_round_trip_keeps_claim_order() {
        let cfg = schedule(&["a", "b", "c"]);
        let mut history = ClaimHistory::new();
        history.record("b", t(10));
        history.record("a", t(5));

        let persisted = history.to_persisted();
        assert_eq!(persisted.keys, vec!["b", "a"]);
        assert_eq!(persisted.timestamps, vec![t(10), t(5)]);
        assert_eq!(ClaimHistory::from_persisted(&persisted, &cfg), history);
    }

    #[test]
    fn unknown_keys_are_dropped_on_load() {
        let cfg = schedule(&["a", "b"]);
        let persisted = PersistedHistory {
            keys: vec!["a".into(), "retired-slot".into()],
            timestamps: vec![t(1), t(2)],
        };
        let history = ClaimHistory::from_persisted(&persisted, &cfg);
        assert_eq!(history.len(), 1);
        assert_eq!(history.claimed_at("a"), Some(t(1)));
        assert_eq!(history.claimed_at("retired-slot"), None);
    }

    #[test]
    fn mismatched_lengths_truncate() {
        let cfg = schedule(&["a", "b"]);
        let persisted = PersistedHistory {
            keys: vec!["a".into(), "b".into()],
            timestamps: vec![t(1)],
        };
        let history = ClaimHistory::from_persisted(&persisted, &cfg);
        assert_eq!(history.len(), 1);
        assert_eq!(persisted.claimed_at("b"), None);
    }

    #[test]
    fn both_encodings_answer_lookups_alike() {
        let persisted = PersistedHistory {
            keys: vec!["a".into(), "b".into(), "a".into()],
            timestamps: vec![t(1), t(2), t(3)],
        };
        let history = ClaimHistory::from_persisted(&persisted, &schedule(&["a", "b"]));
        for key in ["a", "b", "c"] {
            assert_eq!(history.claimed_at(key), persisted.claimed_at(key), "key {key}");
        }
    }

    #[test]
    fn persisted_json_shape() {
        let persisted = PersistedHistory {
            keys: vec!["a".into()],
            timestamps: vec![t(0)],
        };
        let json = serde_json::to_value(&persisted).unwrap();
        assert_eq!(json["keys"][0], "a");
        assert_eq!(json["timestamps"][0], "1970-01-01T00:00:00Z");

        let empty: PersistedHistory = serde_json::from_str("{}").unwrap();
        assert!(empty.is_empty());
    }
}
