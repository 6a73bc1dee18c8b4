//! # Balance Ledger
//!
//! The ledger tracks two counters per holder:
//!
//! - `total`: everything the holder owns.
//! - `held`: the part of `total` currently locked by active holds.
//!
//! and derives `spendable = total - held`. Every debit and every new lock is
//! checked against `spendable`, never against `total`. That is the whole
//! point of the ledger: an outstanding hold is a claim on the holder's
//! balance, and nothing else may race ahead of it.
//!
//! The [`Ledger`] trait is the seam between the hold state machine and the
//! container that actually stores balances. [`BalanceLedger`] is the
//! in-memory implementation; a partitioned token would provide one ledger
//! per partition and reuse the same state machine unchanged.

pub mod balance;

pub use balance::{BalanceLedger, HolderBalance, SnapshotError};

use thiserror::Error;

use crate::types::{Address, Amount};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Attempted to debit or lock more than the holder can spend.
    #[error(
        "insufficient spendable balance: {holder} can spend {spendable}, requested {requested}"
    )]
    InsufficientSpendableBalance {
        /// The holder being debited or locked.
        holder: Address,
        /// Spendable balance at the time of the request.
        spendable: Amount,
        /// The amount that was requested.
        requested: Amount,
    },

    /// Arithmetic overflow while crediting or locking.
    #[error("balance overflow: {holder} has {current}, adding {amount}")]
    Overflow {
        /// The holder whose counter would overflow.
        holder: Address,
        /// The counter value before the failed operation.
        current: Amount,
        /// The amount that caused the overflow.
        amount: Amount,
    },

    /// Tried to unlock more than is currently held. Indicates a broken
    /// invariant in the caller, since every unlock pairs with an earlier lock.
    #[error("unlock exceeds held balance: {holder} holds {held}, unlock {requested}")]
    UnlockExceedsHeld {
        /// The holder being unlocked.
        holder: Address,
        /// The current held amount.
        held: Amount,
        /// The amount that was requested.
        requested: Amount,
    },
}

impl LedgerError {
    /// Returns `true` if retrying the same request can never succeed on its
    /// own. An insufficient balance clears up once holds are released or
    /// funds arrive; the other kinds do not.
    pub fn is_permanent(&self) -> bool {
        !matches!(self, LedgerError::InsufficientSpendableBalance { .. })
    }
}

// ---------------------------------------------------------------------------
// Ledger trait
// ---------------------------------------------------------------------------

/// Balance container consumed by the hold state machine and the token
/// façade.
///
/// Implementations must keep `held(h) <= total(h)` for every holder. The
/// default [`spendable`](Ledger::spendable) relies on it.
pub trait Ledger {
    /// The holder's full balance.
    fn total(&self, holder: &Address) -> Amount;

    /// The portion of the holder's balance locked by active holds.
    fn held(&self, holder: &Address) -> Amount;

    /// Sum of `held` across every holder.
    fn total_held(&self) -> Amount;

    /// `total - held`.
    fn spendable(&self, holder: &Address) -> Amount {
        self.total(holder).saturating_sub(self.held(holder))
    }

    /// Fails with [`LedgerError::InsufficientSpendableBalance`] unless the
    /// holder can spend `amount`.
    fn ensure_spendable(&self, holder: &Address, amount: Amount) -> Result<(), LedgerError> {
        let spendable = self.spendable(holder);
        if amount > spendable {
            return Err(LedgerError::InsufficientSpendableBalance {
                holder: *holder,
                spendable,
                requested: amount,
            });
        }
        Ok(())
    }

    /// Adds `amount` to the holder's total. Returns the new total.
    fn credit_total(&mut self, holder: Address, amount: Amount) -> Result<Amount, LedgerError>;

    /// Removes `amount` from the holder's total, bounded by spendable.
    /// Returns the new total.
    fn debit_total(&mut self, holder: Address, amount: Amount) -> Result<Amount, LedgerError>;

    /// Moves `amount` of the holder's spendable balance into `held`.
    /// Returns the new held amount.
    fn lock(&mut self, holder: Address, amount: Amount) -> Result<Amount, LedgerError>;

    /// Returns `amount` from `held` to spendable. Returns the new held amount.
    fn unlock(&mut self, holder: Address, amount: Amount) -> Result<Amount, LedgerError>;
}
