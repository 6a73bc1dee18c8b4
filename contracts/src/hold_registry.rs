//! # Hold Registry
//!
//! Keyed storage of hold records. The registry enforces the record-level
//! rules on its own: every stored hold has a non-zero notary and a positive
//! value, ids are unique across every status, and a record leaves `Held`
//! exactly once, for a terminal status. Balance effects are the engine's
//! job.
//!
//! The registry serializes for audit export but does not deserialize; holds
//! only enter it through [`HoldRegistry::create`].

use std::collections::HashMap;

use serde::Serialize;

use holdfast_protocol::{Address, Amount, HoldId};

use crate::hold::{Hold, HoldError, HoldRequest, HoldStatus};

/// All holds ever created, keyed by id.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HoldRegistry {
    holds: HashMap<HoldId, Hold>,
}

impl HoldRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a new `Held` record for `holder`.
    ///
    /// # Errors
    ///
    /// [`HoldError::ZeroNotary`] or [`HoldError::ZeroValue`] for a malformed
    /// request, then [`HoldError::DuplicateHoldId`] if the id was ever used.
    pub fn create(&mut self, holder: Address, request: &HoldRequest) -> Result<&Hold, HoldError> {
        request.validate()?;
        if self.holds.contains_key(&request.id) {
            return Err(HoldError::DuplicateHoldId(request.id));
        }
        let hold = Hold::from_request(holder, request);
        Ok(self.holds.entry(request.id).or_insert(hold))
    }

    /// Looks up a hold.
    ///
    /// # Errors
    ///
    /// Returns [`HoldError::HoldNotFound`] for an unknown id.
    pub fn get(&self, id: &HoldId) -> Result<&Hold, HoldError> {
        self.holds.get(id).ok_or(HoldError::HoldNotFound(*id))
    }

    /// Moves a `Held` record to the terminal `status`.
    ///
    /// # Errors
    ///
    /// Returns [`HoldError::NonTerminalStatus`] when `status` is `Held`,
    /// [`HoldError::HoldNotFound`] for an unknown id and
    /// [`HoldError::HoldNotHeld`] if the record already left `Held`.
    pub fn set_status(&mut self, id: &HoldId, status: HoldStatus) -> Result<&Hold, HoldError> {
        if !status.is_terminal() {
            return Err(HoldError::NonTerminalStatus { id: *id, status });
        }
        let hold = self.holds.get_mut(id).ok_or(HoldError::HoldNotFound(*id))?;
        if !hold.is_held() {
            return Err(HoldError::HoldNotHeld {
                id: *id,
                status: hold.status,
            });
        }
        hold.status = status;
        Ok(hold)
    }

    /// Current status, or `None` for an unknown id.
    pub fn status(&self, id: &HoldId) -> Option<HoldStatus> {
        self.holds.get(id).map(|h| h.status)
    }

    /// Returns `true` if the id was ever used.
    pub fn contains(&self, id: &HoldId) -> bool {
        self.holds.contains_key(id)
    }

    /// Iterates over the active holds of one holder.
    pub fn active_holds_of<'a>(&'a self, holder: &'a Address) -> impl Iterator<Item = &'a Hold> {
        self.holds
            .values()
            .filter(move |h| h.is_held() && h.holder == *holder)
    }

    /// Sum of the values of `holder`'s active holds, widened so it cannot
    /// overflow.
    pub fn active_value_of(&self, holder: &Address) -> u128 {
        self.active_holds_of(holder).map(|h| h.value as u128).sum()
    }

    /// Iterates over every record.
    pub fn iter(&self) -> impl Iterator<Item = &Hold> {
        self.holds.values()
    }

    /// Number of records in any status.
    pub fn len(&self) -> usize {
        self.holds.len()
    }

    /// Returns `true` if no hold was ever created.
    pub fn is_empty(&self) -> bool {
        self.holds.is_empty()
    }

    /// Number of records currently `Held`.
    pub fn active_count(&self) -> usize {
        self.holds.values().filter(|h| h.is_held()).count()
    }

    /// Sum of every active hold's value.
    pub fn active_value(&self) -> Amount {
        self.holds
            .values()
            .filter(|h| h.is_held())
            .fold(0, |acc: Amount, h| acc.saturating_add(h.value))
    }
}
