//! Payout collaborator trait and the in-memory reference ledger.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use cadence_schedule::{Payout, Payoutable};

/// Errors from granting a payout.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayoutError {
    #[error("unit item '{0}' is already owned")]
    AlreadyOwned(String),

    #[error("granting {amount} {currency} would overflow the balance")]
    CurrencyOverflow { currency: String, amount: u64 },

    #[error("granting {quantity} x {item} would overflow the stack")]
    StackOverflow { item: String, quantity: u32 },

    #[error("payout rejected: {0}")]
    Rejected(String),
}

/// What a successful grant handed out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutDescriptor {
    pub payout_id: String,
    pub granted: Vec<Payoutable>,
}

impl PayoutDescriptor {
    pub fn summary(&self) -> String {
        if self.granted.is_empty() {
            return "nothing".to_string();
        }
        self.granted
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Grants a slot's payout to the player.
///
/// Invoked once per accepted claim, after the claim has been committed.
#[async_trait]
pub trait PayoutGranter: Send + Sync {
    async fn grant(&self, payout: &Payout) -> Result<PayoutDescriptor, PayoutError>;
}

/// Player holdings tracked by [`InventoryLedger`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    pub currencies: BTreeMap<String, u64>,
    #[serde(default)]
    pub stacks: BTreeMap<String, u32>,
    #[serde(default)]
    pub unit_items: BTreeSet<String>,
}

impl Inventory {
    /// Apply every grant or none of them.
    fn apply(&mut self, payout: &Payout) -> Result<(), PayoutError> {
        let mut staged = self.clone();
        for grant in &payout.grants {
            match grant {
                Payoutable::Currency { currency, amount } => {
                    let balance = staged.currencies.entry(currency.clone()).or_default();
                    *balance = balance.checked_add(*amount).ok_or_else(|| PayoutError::CurrencyOverflow {
                        currency: currency.clone(),
                        amount: *amount,
                    })?;
                }
                Payoutable::StackableItem { item, quantity } => {
                    let stack = staged.stacks.entry(item.clone()).or_default();
                    *stack = stack.checked_add(*quantity).ok_or_else(|| PayoutError::StackOverflow {
                        item: item.clone(),
                        quantity: *quantity,
                    })?;
                }
                Payoutable::UnitItem { item } => {
                    if !staged.unit_items.insert(item.clone()) {
                        return Err(PayoutError::AlreadyOwned(item.clone()));
                    }
                }
            }
        }
        *self = staged;
        Ok(())
    }
}

/// In-memory wallet and inventory implementing [`PayoutGranter`].
#[derive(Debug, Default)]
pub struct InventoryLedger {
    inventory: Mutex<Inventory>,
}

impl InventoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_inventory(inventory: Inventory) -> Self {
        Self {
            inventory: Mutex::new(inventory),
        }
    }

    /// Snapshot of the current holdings.
    pub fn inventory(&self) -> Inventory {
        self.inventory.lock().expect("inventory lock poisoned").clone()
    }

    pub fn balance(&self, currency: &str) -> u64 {
        self.inventory
            .lock()
            .expect("inventory lock poisoned")
            .currencies
            .get(currency)
            .copied()
            .unwrap_or(0)
    }

    pub fn quantity(&self, item: &str) -> u32 {
        self.inventory
            .lock()
            .expect("inventory lock poisoned")
            .stacks
            .get(item)
            .copied()
            .unwrap_or(0)
    }

    pub fn owns(&self, item: &str) -> bool {
        self.inventory
            .lock()
            .expect("inventory lock poisoned")
            .unit_items
            .contains(item)
    }
}

#[async_trait]
impl PayoutGranter for InventoryLedger {
    async fn grant(&self, payout: &Payout) -> Result<PayoutDescriptor, PayoutError> {
        self.inventory
            .lock()
            .expect("inventory lock poisoned")
            .apply(payout)?;

        if payout.is_empty() {
            debug!(payout = %payout.id, "granted empty payout");
        } else {
            info!(payout = %payout.id, grants = payout.grants.len(), "granted payout");
        }

        Ok(PayoutDescriptor {
            payout_id: payout.id.clone(),
            granted: payout.grants.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gold(amount: u64) -> Payoutable {
        Payoutable::Currency {
            currency: "gold".into(),
            amount,
        }
    }

    #[tokio::test]
    async fn grants_accumulate() {
        let ledger = InventoryLedger::new();
        let payout = Payout::new(
            "day-1",
            vec![
                gold(100),
                Payoutable::StackableItem {
                    item: "potion".into(),
                    quantity: 3,
                },
            ],
        );

        let descriptor = ledger.grant(&payout).await.unwrap();
        ledger.grant(&payout).await.unwrap();

        assert_eq!(descriptor.payout_id, "day-1");
        assert_eq!(descriptor.granted, payout.grants);
        assert_eq!(ledger.balance("gold"), 200);
        assert_eq!(ledger.quantity("potion"), 6);
        assert_eq!(ledger.balance("gems"), 0);
    }

    #[tokio::test]
    async fn owned_unit_item_fails_without_partial_grant() {
        let ledger = InventoryLedger::new();
        let crown = Payoutable::UnitItem { item: "crown".into() };
        ledger.grant(&Payout::new("a", vec![crown.clone()])).await.unwrap();

        let err = ledger
            .grant(&Payout::new("b", vec![gold(50), crown]))
            .await
            .unwrap_err();

        assert_eq!(err, PayoutError::AlreadyOwned("crown".into()));
        assert!(ledger.owns("crown"));
        assert_eq!(ledger.balance("gold"), 0);
    }

    #[tokio::test]
    async fn currency_overflow_is_rejected() {
        let mut inventory = Inventory::default();
        inventory.currencies.insert("gold".into(), u64::MAX);
        let ledger = InventoryLedger::from_inventory(inventory);

        let err = ledger.grant(&Payout::new("x", vec![gold(1)])).await.unwrap_err();
        assert!(matches!(err, PayoutError::CurrencyOverflow { .. }));
        assert_eq!(ledger.balance("gold"), u64::MAX);
    }

    #[test]
    fn descriptor_summary() {
        let descriptor = PayoutDescriptor {
            payout_id: "p".into(),
            granted: vec![],
        };
        assert_eq!(descriptor.summary(), "nothing");
    }
}
