//! # Hold Engine
//!
//! The state machine that places, releases and executes holds against a
//! [`Ledger`]. The engine borrows everything it touches for the duration of
//! one call; the caller (normally [`crate::token::HoldableToken`]) owns the
//! ledger and registry and serializes access to them.
//!
//! Every operation validates completely before its first mutation, so a
//! rejected request leaves the ledger, the registry and the event stream
//! exactly as they were.
//!
//! | Operation        | Caller            | Balance effect on holder          |
//! |------------------|-------------------|-----------------------------------|
//! | `hold`           | holder            | held += value                     |
//! | `release_hold`   | notary            | held -= value                     |
//! | `release_hold`   | holder, expired   | held -= value                     |
//! | `execute_hold`   | notary            | held -= value, total -= value     |

use tracing::{debug, info};

use holdfast_protocol::{
    Address, Clock, EventSink, HoldId, Ledger, LedgerError, LedgerEvent, ReleaseKind,
};

use crate::hold::{Hold, HoldError, HoldRequest, HoldStatus};
use crate::hold_registry::HoldRegistry;

/// Borrowed view over one ledger and its hold registry.
pub struct HoldEngine<'a, L: Ledger> {
    ledger: &'a mut L,
    registry: &'a mut HoldRegistry,
    clock: &'a dyn Clock,
    events: &'a dyn EventSink,
}

impl<'a, L: Ledger> HoldEngine<'a, L> {
    /// Creates an engine over the given state.
    pub fn new(
        ledger: &'a mut L,
        registry: &'a mut HoldRegistry,
        clock: &'a dyn Clock,
        events: &'a dyn EventSink,
    ) -> Self {
        Self {
            ledger,
            registry,
            clock,
            events,
        }
    }

    /// Places a hold on `holder`'s balance.
    ///
    /// # Errors
    ///
    /// In order of checking: [`HoldError::ZeroNotary`], [`HoldError::ZeroValue`],
    /// an insufficient spendable balance, [`HoldError::DuplicateHoldId`].
    pub fn hold(&mut self, holder: Address, request: &HoldRequest) -> Result<HoldId, HoldError> {
        let result = self.try_hold(holder, request);
        match &result {
            Ok(id) => info!(
                hold_id = %id,
                holder = %holder,
                notary = %request.notary,
                value = request.value,
                expiration = request.expiration,
                "hold created"
            ),
            Err(err) => {
                debug!(hold_id = %request.id, holder = %holder, error = %err, "hold rejected")
            }
        }
        result
    }

    /// Releases a held hold, returning its value to the holder's spendable
    /// balance. The notary may release at any time; the holder only once the
    /// hold has expired.
    ///
    /// Returns the new status: `Released` when the notary acted,
    /// `ReleasedOnExpiration` when the holder did. A caller who is both
    /// holder and notary acts as notary.
    ///
    /// # Errors
    ///
    /// [`HoldError::HoldNotFound`], [`HoldError::HoldNotHeld`],
    /// [`HoldError::NotYetExpired`] or [`HoldError::Unauthorized`].
    pub fn release_hold(&mut self, caller: Address, id: &HoldId) -> Result<HoldStatus, HoldError> {
        let result = self.try_release(caller, id);
        match &result {
            Ok(status) => info!(hold_id = %id, caller = %caller, status = %status, "hold released"),
            Err(err) => debug!(hold_id = %id, caller = %caller, error = %err, "release rejected"),
        }
        result
    }

    /// Executes a held hold, moving its value from the holder to the
    /// recipient. Only the notary may execute.
    ///
    /// `recipient` must be `None` when the hold already designates one, and
    /// must be `Some` non-zero address otherwise. `preimage` must open the
    /// hash lock when one is set.
    ///
    /// Returns the credited recipient.
    ///
    /// # Errors
    ///
    /// In order of checking: [`HoldError::HoldNotFound`],
    /// [`HoldError::HoldNotHeld`], [`HoldError::Unauthorized`],
    /// [`HoldError::RecipientAlreadySet`] / [`HoldError::RecipientRequired`] /
    /// [`HoldError::ZeroRecipient`], [`HoldError::PreimageMismatch`], and a
    /// ledger overflow on the recipient.
    pub fn execute_hold(
        &mut self,
        caller: Address,
        id: &HoldId,
        preimage: Option<&[u8]>,
        recipient: Option<Address>,
    ) -> Result<Address, HoldError> {
        let result = self.try_execute(caller, id, preimage, recipient);
        match &result {
            Ok(to) => info!(hold_id = %id, recipient = %to, "hold executed"),
            Err(err) => debug!(hold_id = %id, caller = %caller, error = %err, "execution rejected"),
        }
        result
    }

    fn try_hold(&mut self, holder: Address, request: &HoldRequest) -> Result<HoldId, HoldError> {
        // The registry repeats these checks in `create`; running them here
        // keeps them ahead of the lock.
        request.validate()?;
        self.ledger.ensure_spendable(&holder, request.value)?;
        if self.registry.contains(&request.id) {
            return Err(HoldError::DuplicateHoldId(request.id));
        }

        self.ledger.lock(holder, request.value)?;
        let hold = self.registry.create(holder, request)?;

        self.events.emit(LedgerEvent::HoldCreated {
            hold_id: hold.id,
            holder: hold.holder,
            recipient: hold.recipient,
            notary: hold.notary,
            value: hold.value,
            expiration: hold.expiration,
            hash_lock: hold.hash_lock,
        });
        Ok(hold.id)
    }

    fn try_release(&mut self, caller: Address, id: &HoldId) -> Result<HoldStatus, HoldError> {
        let hold = self.held(id)?;

        let (status, released_by) = if caller == hold.notary {
            (HoldStatus::Released, ReleaseKind::Notary)
        } else if caller == hold.holder {
            let now = self.clock.now();
            if !hold.is_expired_at(now) {
                return Err(HoldError::NotYetExpired {
                    id: *id,
                    expiration: hold.expiration,
                    now,
                });
            }
            (HoldStatus::ReleasedOnExpiration, ReleaseKind::Expiration)
        } else {
            return Err(HoldError::Unauthorized {
                id: *id,
                caller,
                action: "release",
            });
        };

        self.ledger.unlock(hold.holder, hold.value)?;
        self.registry.set_status(id, status)?;

        self.events.emit(LedgerEvent::HoldReleased {
            hold_id: *id,
            holder: hold.holder,
            value: hold.value,
            released_by,
        });
        Ok(status)
    }

    fn try_execute(
        &mut self,
        caller: Address,
        id: &HoldId,
        preimage: Option<&[u8]>,
        recipient: Option<Address>,
    ) -> Result<Address, HoldError> {
        let hold = self.held(id)?;

        if caller != hold.notary {
            return Err(HoldError::Unauthorized {
                id: *id,
                caller,
                action: "execute",
            });
        }

        let to = match (hold.has_recipient(), recipient) {
            (true, None) => hold.recipient,
            (true, Some(_)) => {
                return Err(HoldError::RecipientAlreadySet {
                    id: *id,
                    recipient: hold.recipient,
                })
            }
            (false, Some(r)) if r.is_zero() => return Err(HoldError::ZeroRecipient),
            (false, Some(r)) => r,
            (false, None) => return Err(HoldError::RecipientRequired(*id)),
        };

        if !hold.accepts_preimage(preimage) {
            return Err(HoldError::PreimageMismatch(*id));
        }

        // The credit is the only step that can still fail once the holder's
        // side is touched, so check it up front.
        if to != hold.holder {
            let current = self.ledger.total(&to);
            if current.checked_add(hold.value).is_none() {
                return Err(LedgerError::Overflow {
                    holder: to,
                    current,
                    amount: hold.value,
                }
                .into());
            }
        }

        self.ledger.unlock(hold.holder, hold.value)?;
        self.ledger.debit_total(hold.holder, hold.value)?;
        self.ledger.credit_total(to, hold.value)?;
        self.registry.set_status(id, HoldStatus::Executed)?;

        self.events.emit(LedgerEvent::HoldExecuted {
            hold_id: *id,
            holder: hold.holder,
            recipient: to,
            value: hold.value,
        });
        Ok(to)
    }

    /// Copy of the record, provided it is still `Held`.
    fn held(&self, id: &HoldId) -> Result<Hold, HoldError> {
        let hold = self.registry.get(id)?;
        if !hold.is_held() {
            return Err(HoldError::HoldNotHeld {
                id: *id,
                status: hold.status,
            });
        }
        Ok(hold.clone())
    }
}
