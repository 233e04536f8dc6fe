//! Immutable schedule definitions consumed by the scheduler.

use std::collections::HashMap;

use chrono::Duration;

use crate::payout::Payout;

/// Errors raised while constructing a [`ScheduleConfig`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("schedule '{0}' has no slots")]
    NoSlots(String),

    #[error("schedule '{schedule}' declares slot '{slot}' more than once")]
    DuplicateSlot { schedule: String, slot: String },

    #[error("schedule '{0}' has an empty slot key")]
    EmptySlotKey(String),

    #[error("schedule key must not be empty")]
    EmptyKey,
}

/// One position in a schedule's claim sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotConfig {
    pub key: String,
    pub payout: Payout,
}

impl SlotConfig {
    pub fn new(key: impl Into<String>, payout: Payout) -> Self {
        Self {
            key: key.into(),
            payout,
        }
    }
}

/// Immutable description of a reward cadence.
///
/// Built once (usually by the catalog loader) and shared behind an `Arc` for
/// the lifetime of the process. The slot list is never empty and slot keys
/// are unique, both enforced by [`ScheduleConfig::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleConfig {
    key: String,
    name: String,
    cooldown_seconds: u32,
    expiration_seconds: u32,
    reset_on_expire: bool,
    slots: Vec<SlotConfig>,
    slot_index: HashMap<String, usize>,
}

impl ScheduleConfig {
    /// Validate and build a schedule. `expiration_seconds == 0` means slots never expire.
    pub fn new(
        key: impl Into<String>,
        cooldown_seconds: u32,
        expiration_seconds: u32,
        reset_on_expire: bool,
        slots: Vec<SlotConfig>,
    ) -> Result<Self, ScheduleError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(ScheduleError::EmptyKey);
        }
        if slots.is_empty() {
            return Err(ScheduleError::NoSlots(key));
        }

        let mut slot_index = HashMap::with_capacity(slots.len());
        for (i, slot) in slots.iter().enumerate() {
            if slot.key.trim().is_empty() {
                return Err(ScheduleError::EmptySlotKey(key));
            }
            if slot_index.insert(slot.key.clone(), i).is_some() {
                return Err(ScheduleError::DuplicateSlot {
                    schedule: key,
                    slot: slot.key.clone(),
                });
            }
        }

        Ok(Self {
            name: key.clone(),
            key,
            cooldown_seconds,
            expiration_seconds,
            reset_on_expire,
            slots,
            slot_index,
        })
    }

    /// Attach a display name (defaults to the key).
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cooldown_seconds(&self) -> u32 {
        self.cooldown_seconds
    }

    pub fn expiration_seconds(&self) -> u32 {
        self.expiration_seconds
    }

    pub fn reset_on_expire(&self) -> bool {
        self.reset_on_expire
    }

    pub fn cooldown(&self) -> Duration {
        Duration::seconds(i64::from(self.cooldown_seconds))
    }

    /// The expiration window, or `None` when slots never expire.
    pub fn expiration(&self) -> Option<Duration> {
        (self.expiration_seconds > 0).then(|| Duration::seconds(i64::from(self.expiration_seconds)))
    }

    pub fn slots(&self) -> &[SlotConfig] {
        &self.slots
    }

    pub fn slot(&self, key: &str) -> Option<&SlotConfig> {
        self.slot_index(key).map(|i| &self.slots[i])
    }

    /// Position of a slot in the claim sequence.
    pub fn slot_index(&self, key: &str) -> Option<usize> {
        self.slot_index.get(key).copied()
    }

    pub fn contains_slot(&self, key: &str) -> bool {
        self.slot_index.contains_key(key)
    }

    pub fn last_index(&self) -> usize {
        self.slots.len() - 1
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always `false`; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(key: &str) -> SlotConfig {
        SlotConfig::new(key, Payout::new(key, vec![]))
    }

    #[test]
    fn rejects_empty_slot_list() {
        let err = ScheduleConfig::new("daily", 60, 0, false, vec![]).unwrap_err();
        assert_eq!(err, ScheduleError::NoSlots("daily".into()));
    }

    #[test]
    fn rejects_duplicate_slot_keys() {
        let err = ScheduleConfig::new("daily", 60, 0, false, vec![slot("a"), slot("b"), slot("a")])
            .unwrap_err();
        assert!(matches!(err, ScheduleError::DuplicateSlot { ref slot, .. } if slot == "a"));
    }

    #[test]
    fn rejects_blank_keys() {
        assert_eq!(
            ScheduleConfig::new(" ", 60, 0, false, vec![slot("a")]).unwrap_err(),
            ScheduleError::EmptyKey
        );
        assert!(matches!(
            ScheduleConfig::new("daily", 60, 0, false, vec![slot("")]),
            Err(ScheduleError::EmptySlotKey(_))
        ));
    }

    #[test]
    fn indexes_slots_in_order() {
        let cfg = ScheduleConfig::new("daily", 60, 30, false, vec![slot("a"), slot("b"), slot("c")])
            .unwrap();
        assert_eq!(cfg.slot_index("a"), Some(0));
        assert_eq!(cfg.slot_index("c"), Some(2));
        assert_eq!(cfg.slot_index("zzz"), None);
        assert_eq!(cfg.last_index(), 2);
        assert_eq!(cfg.name(), "daily");
        assert_eq!(cfg.expiration(), Some(Duration::seconds(30)));
    }

    #[test]
    fn zero_expiration_means_none() {
        let cfg = ScheduleConfig::new("daily", 60, 0, true, vec![slot("a")]).unwrap();
        assert_eq!(cfg.expiration(), None);
        assert_eq!(cfg.cooldown(), Duration::seconds(60));
    }
}
