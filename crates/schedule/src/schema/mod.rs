//! YAML document schema for reward schedules.
//!
//! A schedule file looks like:
//!
//! ```yaml
//! apiVersion: v1
//! kind: RewardSchedule
//! metadata:
//!   id: daily-login
//!   name: Daily Login
//!   enabled: true
//! spec:
//!   cooldown: 1d
//!   expiration: 1d
//!   resetOnExpire: false
//!   slots:
//!     - key: day-1
//!       payout:
//!         grants:
//!           - { type: currency, currency: gold, amount: 100 }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use cadence_core::parse_duration_secs;

use crate::config::{ScheduleConfig, SlotConfig};
use crate::loader::CatalogError;
use crate::payout::Payout;


/// Supported `apiVersion`.
pub const API_VERSION: &str = "v1";

/// The only `kind` this catalog understands.
pub const SCHEDULE_KIND: &str = "RewardSchedule";

/// A duration in YAML: bare seconds (`3600`) or a string (`"1h"`, `"2d12h"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DurationValue {
    Seconds(u32),
    Text(String),
}

impl DurationValue {
    pub fn as_secs(&self) -> Result<u32, CatalogError> {
        match self {
            DurationValue::Seconds(s) => Ok(*s),
            DurationValue::Text(t) => Ok(parse_duration_secs(t)?),
        }
    }
}

impl fmt::Display for DurationValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DurationValue::Seconds(s) => write!(f, "{}s", s),
            DurationValue::Text(t) => write!(f, "{}", t),
        }
    }
}

/// Metadata block shared by every schedule document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleMetadata {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// One slot entry under `spec.slots`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotSpec {
    pub key: String,
    #[serde(default = "empty_payout")]
    pub payout: Payout,
}

fn empty_payout() -> Payout {
    Payout::new("", Vec::new())
}

/// Cadence rules under `spec`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSpec {
    pub cooldown: DurationValue,
    /// Absent or zero means slots never expire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<DurationValue>,
    #[serde(default)]
    pub reset_on_expire: bool,
    pub slots: Vec<SlotSpec>,
}

/// A full `RewardSchedule` YAML document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleDocument {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: ScheduleMetadata,
    pub spec: ScheduleSpec,
}

impl ScheduleDocument {
    /// Check header fields and build the immutable [`ScheduleConfig`].
    ///
    /// Slots without an explicit payout id inherit the slot key.
    pub fn to_config(&self) -> Result<ScheduleConfig, CatalogError> {
        if self.api_version != API_VERSION {
            return Err(CatalogError::Validation(format!(
                "schedule '{}': unsupported apiVersion '{}'",
                self.metadata.id, self.api_version
            )));
        }
        if self.kind != SCHEDULE_KIND {
            return Err(CatalogError::Validation(format!(
                "schedule '{}': unsupported kind '{}'",
                self.metadata.id, self.kind
            )));
        }

        let cooldown = self.spec.cooldown.as_secs()?;
        let expiration = match &self.spec.expiration {
            Some(value) => value.as_secs()?,
            None => 0,
        };

        let slots = self
            .spec
            .slots
            .iter()
            .map(|slot| {
                let mut payout = slot.payout.clone();
                if payout.id.is_empty() {
                    payout.id = slot.key.clone();
                }
                SlotConfig::new(slot.key.clone(), payout)
            })
            .collect();

        let config = ScheduleConfig::new(
            self.metadata.id.clone(),
            cooldown,
            expiration,
            self.spec.reset_on_expire,
            slots,
        )?;
        Ok(config.with_name(self.metadata.name.clone()))
    }

    /// Serialize back to YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
