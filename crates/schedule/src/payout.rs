//! Payout descriptors attached to schedule slots.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One thing a payout grants.
///
/// Tradable kinds are matched exhaustively wherever payouts are applied, so a
/// new kind is a compile-time addition rather than a runtime type check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payoutable {
    /// A fungible balance, e.g. `gold`.
    Currency { currency: String, amount: u64 },
    /// An inventory item that stacks into a count.
    StackableItem { item: String, quantity: u32 },
    /// A singleton item the holder either has or does not.
    UnitItem { item: String },
}

impl fmt::Display for Payoutable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payoutable::Currency { currency, amount } => write!(f, "{} {}", amount, currency),
            Payoutable::StackableItem { item, quantity } => write!(f, "{}x {}", quantity, item),
            Payoutable::UnitItem { item } => write!(f, "{}", item),
        }
    }
}

/// The reward bundle granted when a slot is claimed.
///
/// Opaque to the scheduling logic; only the payout collaborator looks inside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    /// Identifier of the payout. Defaults to the slot key when omitted in YAML.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub grants: Vec<Payoutable>,
}

impl Payout {
    pub fn new(id: impl Into<String>, grants: Vec<Payoutable>) -> Self {
        Self {
            id: id.into(),
            grants,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }
}
