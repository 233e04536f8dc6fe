//! Notifications broadcast by the registry.

use serde::Serialize;

use crate::claim::{ClaimReceipt, ClaimStep};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SchedulerEvent {
    ClaimInitiated {
        schedule: String,
        slot: String,
    },
    ClaimProgressed {
        schedule: String,
        slot: String,
        step: ClaimStep,
        total_steps: u8,
    },
    ClaimSucceeded {
        schedule: String,
        slot: String,
        receipt: ClaimReceipt,
    },
    ClaimFailed {
        schedule: String,
        slot: String,
        error: String,
        /// The claim was recorded despite the failure.
        committed: bool,
    },
    /// History was cleared. Always precedes the matching `ScheduleStateChanged`.
    ScheduleReset {
        schedule: String,
    },
    ScheduleStateChanged {
        schedule: String,
    },
}

impl SchedulerEvent {
    pub fn schedule(&self) -> &str {
        match self {
            SchedulerEvent::ClaimInitiated { schedule, .. }
            | SchedulerEvent::ClaimProgressed { schedule, .. }
            | SchedulerEvent::ClaimSucceeded { schedule, .. }
            | SchedulerEvent::ClaimFailed { schedule, .. }
            | SchedulerEvent::ScheduleReset { schedule }
            | SchedulerEvent::ScheduleStateChanged { schedule } => schedule,
        }
    }

    pub fn slot(&self) -> Option<&str> {
        match self {
            SchedulerEvent::ClaimInitiated { slot, .. }
            | SchedulerEvent::ClaimProgressed { slot, .. }
            | SchedulerEvent::ClaimSucceeded { slot, .. }
            | SchedulerEvent::ClaimFailed { slot, .. } => Some(slot),
            SchedulerEvent::ScheduleReset { .. } | SchedulerEvent::ScheduleStateChanged { .. } => None,
        }
    }

    /// Short event name, matching the serialized `event` tag.
    pub fn name(&self) -> &'static str {
        match self {
            SchedulerEvent::ClaimInitiated { .. } => "claim_initiated",
            SchedulerEvent::ClaimProgressed { .. } => "claim_progressed",
            SchedulerEvent::ClaimSucceeded { .. } => "claim_succeeded",
            SchedulerEvent::ClaimFailed { .. } => "claim_failed",
            SchedulerEvent::ScheduleReset { .. } => "schedule_reset",
            SchedulerEvent::ScheduleStateChanged { .. } => "schedule_state_changed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialized_tag_matches_name() {
        let events = [
            SchedulerEvent::ClaimInitiated {
                schedule: "daily".into(),
                slot: "day-1".into(),
            },
            SchedulerEvent::ClaimProgressed {
                schedule: "daily".into(),
                slot: "day-1".into(),
                step: ClaimStep::Committed,
                total_steps: ClaimStep::TOTAL,
            },
            SchedulerEvent::ScheduleReset {
                schedule: "daily".into(),
            },
        ];

        for event in &events {
            let json = serde_json::to_value(event).unwrap();
            assert_eq!(json["event"], event.name());
            assert_eq!(json["schedule"], "daily");
        }
        assert_eq!(events[1].slot(), Some("day-1"));
        assert_eq!(events[2].slot(), None);
    }
}
