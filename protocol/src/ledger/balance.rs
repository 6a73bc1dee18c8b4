//! # In-Memory Balance Ledger
//!
//! A [`BalanceLedger`] maps each [`Address`] to a [`HolderBalance`] and keeps
//! a running sum of everything held across all holders. Records are created
//! on first credit and never removed; a drained holder simply rests at zero.
//!
//! All arithmetic is checked. An overflow is reported as
//! [`LedgerError::Overflow`] and leaves the ledger untouched.
//!
//! Thread safety is handled by the owner of the ledger (the token façade
//! keeps it behind a `parking_lot::Mutex`); a `BalanceLedger` is plain data.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Ledger, LedgerError};
use crate::types::{Address, Amount};

// ---------------------------------------------------------------------------
// HolderBalance
// ---------------------------------------------------------------------------

/// The two counters kept for every holder.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolderBalance {
    /// Full balance.
    pub total: Amount,
    /// Sum of the values of the holder's active holds.
    pub held: Amount,
}

impl HolderBalance {
    /// `total - held`.
    pub fn spendable(&self) -> Amount {
        self.total.saturating_sub(self.held)
    }

    /// Returns `true` if both counters are zero.
    pub fn is_zero(&self) -> bool {
        self.total == 0 && self.held == 0
    }
}

// ---------------------------------------------------------------------------
// BalanceLedger
// ---------------------------------------------------------------------------

/// The default [`Ledger`]: a `HashMap<Address, HolderBalance>` plus the
/// aggregate held amount.
///
/// Deserialization goes through [`LedgerSnapshot`] and refuses any state
/// where a holder's `held` exceeds its `total` or the aggregate disagrees
/// with the per-holder counters.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(try_from = "LedgerSnapshot")]
pub struct BalanceLedger {
    balances: HashMap<Address, HolderBalance>,
    total_held: Amount,
}

/// Unchecked wire form of a [`BalanceLedger`].
#[derive(Deserialize)]
struct LedgerSnapshot {
    balances: HashMap<Address, HolderBalance>,
    total_held: Amount,
}

/// Reasons a serialized ledger is refused on load.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    /// A holder has more locked than it owns.
    #[error("{holder} holds {held} but owns only {total}")]
    HeldExceedsTotal {
        holder: Address,
        total: Amount,
        held: Amount,
    },

    /// The recorded aggregate does not match the per-holder counters.
    #[error("aggregate held is {recorded}, holders sum to {actual}")]
    TotalHeldMismatch { recorded: Amount, actual: u128 },
}

impl TryFrom<LedgerSnapshot> for BalanceLedger {
    type Error = SnapshotError;

    fn try_from(snapshot: LedgerSnapshot) -> Result<Self, Self::Error> {
        let mut actual: u128 = 0;
        for (holder, balance) in &snapshot.balances {
            if balance.held > balance.total {
                return Err(SnapshotError::HeldExceedsTotal {
                    holder: *holder,
                    total: balance.total,
                    held: balance.held,
                });
            }
            actual += balance.held as u128;
        }
        if actual != snapshot.total_held as u128 {
            return Err(SnapshotError::TotalHeldMismatch {
                recorded: snapshot.total_held,
                actual,
            });
        }
        Ok(Self {
            balances: snapshot.balances,
            total_held: snapshot.total_held,
        })
    }
}

impl BalanceLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the full record for a holder, or `None` if the holder has
    /// never been credited.
    pub fn get(&self, holder: &Address) -> Option<&HolderBalance> {
        self.balances.get(holder)
    }

    /// Iterates over every holder the ledger has seen.
    pub fn iter(&self) -> impl Iterator<Item = (&Address, &HolderBalance)> {
        self.balances.iter()
    }

    /// Number of holder records (including zero balances).
    pub fn holder_count(&self) -> usize {
        self.balances.len()
    }

    /// Sum of `total` across every holder.
    pub fn sum_of_totals(&self) -> u128 {
        self.balances.values().map(|b| b.total as u128).sum()
    }
}

impl Ledger for BalanceLedger {
    fn total(&self, holder: &Address) -> Amount {
        self.balances.get(holder).map(|b| b.total).unwrap_or(0)
    }

    fn held(&self, holder: &Address) -> Amount {
        self.balances.get(holder).map(|b| b.held).unwrap_or(0)
    }

    fn total_held(&self) -> Amount {
        self.total_held
    }

    fn credit_total(&mut self, holder: Address, amount: Amount) -> Result<Amount, LedgerError> {
        let balance = self.balances.entry(holder).or_default();

        let new_total = balance
            .total
            .checked_add(amount)
            .ok_or(LedgerError::Overflow {
                holder,
                current: balance.total,
                amount,
            })?;

        balance.total = new_total;
        Ok(new_total)
    }

    fn debit_total(&mut self, holder: Address, amount: Amount) -> Result<Amount, LedgerError> {
        self.ensure_spendable(&holder, amount)?;
        if amount == 0 {
            return Ok(self.total(&holder));
        }

        // ensure_spendable succeeded with a non-zero amount, so the record exists.
        let balance = self.balances.entry(holder).or_default();
        balance.total -= amount;
        Ok(balance.total)
    }

    fn lock(&mut self, holder: Address, amount: Amount) -> Result<Amount, LedgerError> {
        self.ensure_spendable(&holder, amount)?;

        let new_total_held = self
            .total_held
            .checked_add(amount)
            .ok_or(LedgerError::Overflow {
                holder,
                current: self.total_held,
                amount,
            })?;

        let balance = self.balances.entry(holder).or_default();
        // held + amount <= total, so this cannot overflow.
        balance.held += amount;
        self.total_held = new_total_held;
        Ok(balance.held)
    }

    fn unlock(&mut self, holder: Address, amount: Amount) -> Result<Amount, LedgerError> {
        let held = self.held(&holder);
        if amount > held {
            return Err(LedgerError::UnlockExceedsHeld {
                holder,
                held,
                requested: amount,
            });
        }

        let balance = self.balances.entry(holder).or_default();
        balance.held -= amount;
        self.total_held -= amount;
        Ok(balance.held)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Address {
        Address::from_label("alice")
    }

    fn bob() -> Address {
        Address::from_label("bob")
    }

    #[test]
    fn credit_creates_new_entry() {
        let mut ledger = BalanceLedger::new();
        assert!(ledger.get(&alice()).is_none());

        assert_eq!(ledger.credit_total(alice(), 1000).unwrap(), 1000);
        assert_eq!(ledger.total(&alice()), 1000);
        assert_eq!(ledger.spendable(&alice()), 1000);
        assert_eq!(ledger.held(&alice()), 0);
    }

    #[test]
    fn credit_accumulates() {
        let mut ledger = BalanceLedger::new();
        ledger.credit_total(alice(), 500).unwrap();
        ledger.credit_total(alice(), 300).unwrap();
        assert_eq!(ledger.total(&alice()), 800);
    }

    #[test]
    fn credit_overflow_rejected() {
        let mut ledger = BalanceLedger::new();
        ledger.credit_total(alice(), u64::MAX).unwrap();

        let err = ledger.credit_total(alice(), 1).unwrap_err();
        assert!(matches!(err, LedgerError::Overflow { .. }));
        assert_eq!(ledger.total(&alice()), u64::MAX);
    }

    #[test]
    fn lock_reduces_spendable_but_not_total() {
        let mut ledger = BalanceLedger::new();
        ledger.credit_total(alice(), 1000).unwrap();

        assert_eq!(ledger.lock(alice(), 900).unwrap(), 900);
        assert_eq!(ledger.total(&alice()), 1000);
        assert_eq!(ledger.held(&alice()), 900);
        assert_eq!(ledger.spendable(&alice()), 100);
        assert_eq!(ledger.total_held(), 900);
    }

    #[test]
    fn lock_beyond_spendable_rejected() {
        let mut ledger = BalanceLedger::new();
        ledger.credit_total(alice(), 1000).unwrap();
        ledger.lock(alice(), 900).unwrap();

        let err = ledger.lock(alice(), 101).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientSpendableBalance {
                holder: alice(),
                spendable: 100,
                requested: 101,
            }
        );
        assert_eq!(ledger.held(&alice()), 900);
    }

    #[test]
    fn lock_without_balance_rejected() {
        let mut ledger = BalanceLedger::new();
        let err = ledger.lock(bob(), 1).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientSpendableBalance { .. }));
        assert!(ledger.get(&bob()).is_none());
    }

    #[test]
    fn ensure_spendable_checks_against_unheld_balance() {
        let mut ledger = BalanceLedger::new();
        ledger.credit_total(alice(), 100).unwrap();
        ledger.lock(alice(), 40).unwrap();

        assert!(ledger.ensure_spendable(&alice(), 60).is_ok());
        assert_eq!(
            ledger.ensure_spendable(&alice(), 61),
            Err(LedgerError::InsufficientSpendableBalance {
                holder: alice(),
                spendable: 60,
                requested: 61,
            })
        );
        assert!(ledger.ensure_spendable(&bob(), 0).is_ok());
    }

    #[test]
    fn debit_is_bounded_by_spendable_not_total() {
        let mut ledger = BalanceLedger::new();
        ledger.credit_total(alice(), 1000).unwrap();
        ledger.lock(alice(), 900).unwrap();

        // Total would cover it, spendable does not.
        let err = ledger.debit_total(alice(), 200).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientSpendableBalance {
                spendable: 100,
                requested: 200,
                ..
            }
        ));

        assert_eq!(ledger.debit_total(alice(), 100).unwrap(), 900);
        assert_eq!(ledger.spendable(&alice()), 0);
        assert_eq!(ledger.held(&alice()), 900);
    }

    #[test]
    fn debit_zero_from_unknown_holder_is_a_noop() {
        let mut ledger = BalanceLedger::new();
        assert_eq!(ledger.debit_total(bob(), 0).unwrap(), 0);
        assert_eq!(ledger.holder_count(), 0);
    }

    #[test]
    fn unlock_restores_spendable() {
        let mut ledger = BalanceLedger::new();
        ledger.credit_total(alice(), 123).unwrap();
        ledger.lock(alice(), 100).unwrap();

        assert_eq!(ledger.unlock(alice(), 100).unwrap(), 0);
        assert_eq!(ledger.spendable(&alice()), 123);
        assert_eq!(ledger.total_held(), 0);
    }

    #[test]
    fn unlock_more_than_held_rejected() {
        let mut ledger = BalanceLedger::new();
        ledger.credit_total(alice(), 10).unwrap();
        ledger.lock(alice(), 5).unwrap();

        let err = ledger.unlock(alice(), 6).unwrap_err();
        assert!(matches!(err, LedgerError::UnlockExceedsHeld { held: 5, .. }));
        assert!(err.is_permanent());
        assert_eq!(ledger.held(&alice()), 5);
    }

    #[test]
    fn total_held_spans_holders() {
        let mut ledger = BalanceLedger::new();
        ledger.credit_total(alice(), 50).unwrap();
        ledger.credit_total(bob(), 70).unwrap();
        ledger.lock(alice(), 20).unwrap();
        ledger.lock(bob(), 30).unwrap();
        ledger.lock(bob(), 40).unwrap();

        assert_eq!(ledger.total_held(), 90);
        ledger.unlock(bob(), 30).unwrap();
        assert_eq!(ledger.total_held(), 60);
        assert_eq!(ledger.sum_of_totals(), 120);
    }

    #[test]
    fn insufficient_balance_is_retryable() {
        let err = LedgerError::InsufficientSpendableBalance {
            holder: alice(),
            spendable: 0,
            requested: 1,
        };
        assert!(!err.is_permanent());
    }

    #[test]
    fn ledger_serialization_roundtrip() {
        let mut ledger = BalanceLedger::new();
        ledger.credit_total(alice(), 42).unwrap();
        ledger.lock(alice(), 2).unwrap();

        let json = serde_json::to_string(&ledger).expect("serialize");
        let recovered: BalanceLedger = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(recovered.total(&alice()), 42);
        assert_eq!(recovered.held(&alice()), 2);
        assert_eq!(recovered.total_held(), 2);
    }

    #[test]
    fn deserialize_rejects_held_above_total() {
        let json = format!(
            r#"{{"balances":{{"{}":{{"total":5,"held":6}}}},"total_held":6}}"#,
            alice()
        );
        let err = serde_json::from_str::<BalanceLedger>(&json).unwrap_err();
        assert!(err.to_string().contains("owns only 5"));
    }

    #[test]
    fn deserialize_rejects_aggregate_mismatch() {
        let json = format!(
            r#"{{"balances":{{"{}":{{"total":10,"held":4}}}},"total_held":3}}"#,
            alice()
        );
        let err = serde_json::from_str::<BalanceLedger>(&json).unwrap_err();
        assert!(err.to_string().contains("aggregate held is 3"));
    }
}
