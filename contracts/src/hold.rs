//! # Holds
//!
//! A hold is a reservation of part of a holder's balance in favour of a
//! (possibly not yet known) recipient, controlled by a notary. Its lifecycle:
//!
//! 1. **Held**: the value is locked; the holder's total is unchanged but
//!    the value is no longer spendable.
//! 2. **Executed**: the notary moved the value to the recipient.
//! 3. **Released**: the notary unlocked the value back to the holder.
//! 4. **ReleasedOnExpiration**: the holder unlocked it after expiry.
//!
//! `Held` is the only non-terminal status. Every transition out of it
//! happens exactly once; the record is kept forever for auditing.
//!
//! The state machine that drives these transitions lives in
//! [`crate::hold_engine`]; this module only defines the data.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use holdfast_protocol::config::NO_EXPIRATION;
use holdfast_protocol::{Address, Amount, HashLock, HoldId, LedgerError, Timestamp};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during hold operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HoldError {
    /// The holder's spendable balance is too low, or a ledger counter would
    /// overflow.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// A hold with this id already exists (in any status).
    #[error("duplicate hold id: {0}")]
    DuplicateHoldId(HoldId),

    /// No hold with this id exists.
    #[error("hold not found: {0}")]
    HoldNotFound(HoldId),

    /// The hold has already been executed or released.
    #[error("hold {id} is not held: status is {status}")]
    HoldNotHeld {
        /// The hold that was targeted.
        id: HoldId,
        /// Its current (terminal) status.
        status: HoldStatus,
    },

    /// The caller is not allowed to perform this operation on the hold.
    #[error("unauthorized: {caller} may not {action} hold {id}")]
    Unauthorized {
        /// The hold that was targeted.
        id: HoldId,
        /// The rejected caller.
        caller: Address,
        /// The attempted operation ("execute" or "release").
        action: &'static str,
    },

    /// The holder tried to release before the expiration time.
    #[error("hold {id} has not expired: expires at {expiration}, now {now}")]
    NotYetExpired {
        /// The hold that was targeted.
        id: HoldId,
        /// The hold's expiration timestamp.
        expiration: Timestamp,
        /// The clock reading at the time of the request.
        now: Timestamp,
    },

    /// The notary of a new hold is the zero address.
    #[error("notary must not be the zero address")]
    ZeroNotary,

    /// The value of a new hold is zero.
    #[error("hold value must be greater than zero")]
    ZeroValue,

    /// Execution resolved to the zero address as recipient.
    #[error("recipient must not be the zero address")]
    ZeroRecipient,

    /// A recipient was passed to execution, but the hold already names one.
    #[error("hold {id} already designates recipient {recipient}")]
    RecipientAlreadySet {
        /// The hold that was targeted.
        id: HoldId,
        /// The recipient fixed at creation.
        recipient: Address,
    },

    /// The hold names no recipient and execution did not supply one.
    #[error("hold {0} has no recipient and none was supplied")]
    RecipientRequired(HoldId),

    /// The preimage is missing or does not hash to the hold's lock.
    #[error("preimage does not open the hash lock of hold {0}")]
    PreimageMismatch(HoldId),

    /// A status change targeted `Held`, which is only ever set at creation.
    #[error("hold {id} cannot move to non-terminal status {status}")]
    NonTerminalStatus {
        /// The hold that was targeted.
        id: HoldId,
        /// The rejected target status.
        status: HoldStatus,
    },
}

impl HoldError {
    /// Returns `true` if retrying the same request can never succeed on its
    /// own. Only the passage of time (`NotYetExpired`) or incoming funds
    /// (insufficient spendable balance) can change the outcome.
    pub fn is_permanent(&self) -> bool {
        match self {
            HoldError::Ledger(e) => e.is_permanent(),
            HoldError::NotYetExpired { .. } => false,
            _ => true,
        }
    }
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The current status of a hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HoldStatus {
    /// Active; the value is locked.
    Held,
    /// The value was moved to the recipient.
    Executed,
    /// The notary unlocked the value.
    Released,
    /// The holder unlocked the value after expiry.
    ReleasedOnExpiration,
}

impl HoldStatus {
    /// Returns `true` for every status other than `Held`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, HoldStatus::Held)
    }
}

impl std::fmt::Display for HoldStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HoldStatus::Held => write!(f, "Held"),
            HoldStatus::Executed => write!(f, "Executed"),
            HoldStatus::Released => write!(f, "Released"),
            HoldStatus::ReleasedOnExpiration => write!(f, "ReleasedOnExpiration"),
        }
    }
}

/// Parameters for a new hold. The holder is the caller and is passed
/// separately.
///
/// ```
/// use holdfast_contracts::hold::HoldRequest;
/// use holdfast_protocol::{Address, HoldId};
///
/// let request = HoldRequest::new(HoldId::random(), Address::from_label("notary"), 30)
///     .recipient(Address::from_label("shop"))
///     .expiration(1_700_000_000);
/// assert!(request.hash_lock.is_zero());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldRequest {
    /// Caller-chosen unique id.
    pub id: HoldId,
    /// Designated recipient; the zero address leaves it open until execution.
    pub recipient: Address,
    /// Party allowed to execute or release at any time.
    pub notary: Address,
    /// Amount to lock.
    pub value: Amount,
    /// Unix seconds after which the holder may release. `0` means the hold
    /// is expired from the start.
    pub expiration: Timestamp,
    /// Commitment gating execution. The zero lock means none.
    pub hash_lock: HashLock,
}

impl HoldRequest {
    /// A request with open recipient, no expiration and no hash lock.
    pub fn new(id: HoldId, notary: Address, value: Amount) -> Self {
        Self {
            id,
            recipient: Address::ZERO,
            notary,
            value,
            expiration: NO_EXPIRATION,
            hash_lock: HashLock::ZERO,
        }
    }

    /// Sets the designated recipient.
    pub fn recipient(mut self, recipient: Address) -> Self {
        self.recipient = recipient;
        self
    }

    /// Sets the expiration timestamp.
    pub fn expiration(mut self, expiration: Timestamp) -> Self {
        self.expiration = expiration;
        self
    }

    /// Sets the hash lock.
    pub fn hash_lock(mut self, hash_lock: HashLock) -> Self {
        self.hash_lock = hash_lock;
        self
    }

    /// Checks the fields that must hold for any record built from this
    /// request, independent of balances and stored holds.
    ///
    /// # Errors
    ///
    /// [`HoldError::ZeroNotary`], then [`HoldError::ZeroValue`].
    pub fn validate(&self) -> Result<(), HoldError> {
        if self.notary.is_zero() {
            return Err(HoldError::ZeroNotary);
        }
        if self.value == 0 {
            return Err(HoldError::ZeroValue);
        }
        Ok(())
    }
}

/// A hold record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hold {
    /// Unique identifier.
    pub id: HoldId,
    /// Account whose balance is locked.
    pub holder: Address,
    /// Designated recipient, or the zero address if open.
    pub recipient: Address,
    /// Controlling party.
    pub notary: Address,
    /// Locked amount. Always positive.
    pub value: Amount,
    /// Expiration timestamp (`0` = expired from the start).
    pub expiration: Timestamp,
    /// Execution commitment (zero = none).
    pub hash_lock: HashLock,
    /// Lifecycle status.
    pub status: HoldStatus,
}

impl Hold {
    /// Builds a fresh `Held` record from a request.
    pub fn from_request(holder: Address, request: &HoldRequest) -> Self {
        Self {
            id: request.id,
            holder,
            recipient: request.recipient,
            notary: request.notary,
            value: request.value,
            expiration: request.expiration,
            hash_lock: request.hash_lock,
            status: HoldStatus::Held,
        }
    }

    /// Returns `true` while the hold is active.
    pub fn is_held(&self) -> bool {
        self.status == HoldStatus::Held
    }

    /// Returns `true` if a recipient was designated at creation.
    pub fn has_recipient(&self) -> bool {
        !self.recipient.is_zero()
    }

    /// Returns `true` if the holder may release at time `now`. A zero
    /// expiration is expired from the start; otherwise the hold expires at
    /// `expiration` inclusive.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        self.expiration == NO_EXPIRATION || now >= self.expiration
    }

    /// Returns `true` if `preimage` satisfies this hold's hash lock. A hold
    /// with no lock accepts any preimage, including none.
    pub fn accepts_preimage(&self, preimage: Option<&[u8]>) -> bool {
        match preimage {
            Some(p) => self.hash_lock.is_opened_by(p),
            None => self.hash_lock.is_zero(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_hold() -> Hold {
        let request = HoldRequest::new(
            HoldId::from_bytes([7u8; 32]),
            Address::from_label("notary"),
            30,
        )
        .expiration(1_000);
        Hold::from_request(Address::from_label("holder"), &request)
    }

    #[test]
    fn new_hold_starts_held() {
        let hold = sample_hold();
        assert_eq!(hold.status, HoldStatus::Held);
        assert!(hold.is_held());
        assert!(!hold.has_recipient());
        assert_eq!(hold.holder, Address::from_label("holder"));
    }

    #[test]
    fn only_held_is_non_terminal() {
        assert!(!HoldStatus::Held.is_terminal());
        assert!(HoldStatus::Executed.is_terminal());
        assert!(HoldStatus::Released.is_terminal());
        assert!(HoldStatus::ReleasedOnExpiration.is_terminal());
    }

    #[test]
    fn expiry_is_inclusive() {
        let hold = sample_hold();
        assert!(!hold.is_expired_at(999));
        assert!(hold.is_expired_at(1_000));
        assert!(hold.is_expired_at(1_001));
    }

    #[test]
    fn zero_expiration_is_expired_from_the_start() {
        let mut hold = sample_hold();
        hold.expiration = NO_EXPIRATION;
        assert!(hold.is_expired_at(0));
    }

    #[test]
    fn preimage_rules() {
        let mut hold = sample_hold();
        // No lock: anything goes.
        assert!(hold.accepts_preimage(None));
        assert!(hold.accepts_preimage(Some(b"whatever")));

        hold.hash_lock = HashLock::from_preimage(b"secret");
        assert!(hold.accepts_preimage(Some(b"secret")));
        assert!(!hold.accepts_preimage(Some(b"wrong")));
        assert!(!hold.accepts_preimage(None));
    }

    #[test]
    fn status_display() {
        assert_eq!(
            HoldStatus::ReleasedOnExpiration.to_string(),
            "ReleasedOnExpiration"
        );
    }

    #[test]
    fn request_validation() {
        let id = HoldId::from_bytes([3u8; 32]);
        let notary = Address::from_label("notary");
        assert_eq!(
            HoldRequest::new(id, Address::ZERO, 0).validate(),
            Err(HoldError::ZeroNotary)
        );
        assert_eq!(
            HoldRequest::new(id, notary, 0).validate(),
            Err(HoldError::ZeroValue)
        );
        assert_eq!(HoldRequest::new(id, notary, 1).validate(), Ok(()));
    }

    #[test]
    fn error_permanence() {
        let id = HoldId::from_bytes([1u8; 32]);
        let early = HoldError::NotYetExpired {
            id,
            expiration: 10,
            now: 5,
        };
        assert!(!early.is_permanent());
        assert!(HoldError::HoldNotFound(id).is_permanent());

        let short = HoldError::from(LedgerError::InsufficientSpendableBalance {
            holder: Address::from_label("holder"),
            spendable: 0,
            requested: 1,
        });
        assert!(!short.is_permanent());
    }

    #[test]
    fn hold_serialization_roundtrip() {
        let hold = sample_hold();
        let json = serde_json::to_string(&hold).expect("serialize");
        let recovered: Hold = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(recovered, hold);
    }
}
