//! # Holdable Token
//!
//! A fungible token whose holders can place holds on their own balance. This
//! is the public surface of Holdfast: the ordinary transfer / approve / burn /
//! mint operations plus `hold`, `release_hold` and `execute_hold`, all sharing
//! one critical section.
//!
//! ## Spendable, not total
//!
//! Every operation that takes value away from an account, or promises it to
//! someone else, is checked against the account's *spendable* balance:
//!
//! - `transfer`, `transfer_from`, `burn`, `burn_from` debit through
//!   [`Ledger::debit_total`].
//! - `approve` and `increase_allowance` refuse to grant more than is
//!   currently spendable.
//! - `mint` is the exception; it only adds.
//!
//! ## Concurrency
//!
//! All mutable state sits behind one `parking_lot::Mutex`, held from the
//! first read of an operation to its last write. Events are emitted while
//! the lock is held, so sinks observe them in commit order. Share the token
//! across threads with `Arc<HoldableToken>`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info};

use holdfast_protocol::config::PROTOCOL_VERSION;
use holdfast_protocol::{
    Address, Amount, BalanceLedger, Clock, EventSink, HoldId, Ledger, LedgerError, LedgerEvent,
    SystemClock, TracingSink,
};

use crate::config::{ConfigError, TokenConfig};
use crate::hold::{Hold, HoldError, HoldRequest, HoldStatus};
use crate::hold_engine::HoldEngine;
use crate::hold_registry::HoldRegistry;
use crate::metrics::HoldMetrics;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during token operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Insufficient spendable balance, or a balance counter would overflow.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// A hold operation failed.
    #[error(transparent)]
    Hold(#[from] HoldError),

    /// The token configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The spender's allowance does not cover the request.
    #[error(
        "insufficient allowance: {spender} may spend {allowance} of {owner}, requested {requested}"
    )]
    InsufficientAllowance {
        /// Account that granted the allowance.
        owner: Address,
        /// Account trying to spend it.
        spender: Address,
        /// Current allowance.
        allowance: Amount,
        /// Amount requested.
        requested: Amount,
    },

    /// Increasing the allowance would overflow.
    #[error("allowance overflow: {current} + {added} exceeds u64::MAX")]
    AllowanceOverflow {
        /// Current allowance.
        current: Amount,
        /// Amount that was added.
        added: Amount,
    },

    /// The zero address was used as a recipient or spender.
    #[error("the zero address is not a valid counterparty")]
    ZeroAddress,

    /// The caller lacks the role for this operation.
    #[error("unauthorized: {caller} may not {action}")]
    Unauthorized {
        /// The rejected caller.
        caller: Address,
        /// The attempted operation.
        action: &'static str,
    },

    /// Minting is turned off for this token.
    #[error("minting is disabled")]
    MintingDisabled,

    /// Burning is turned off for this token.
    #[error("burning is disabled")]
    BurningDisabled,

    /// A supply overflow would occur.
    #[error("supply overflow: minting {amount} would exceed u64::MAX")]
    SupplyOverflow {
        /// The amount that was attempted.
        amount: Amount,
    },

    /// Minting would push the supply past the configured cap.
    #[error("supply cap exceeded: minting {amount} would take supply past {max}")]
    SupplyCapExceeded {
        /// The amount that was attempted.
        amount: Amount,
        /// The configured cap.
        max: Amount,
    },
}

impl TokenError {
    /// Returns `true` if retrying the same request can never succeed on its
    /// own.
    pub fn is_permanent(&self) -> bool {
        match self {
            TokenError::Ledger(e) => e.is_permanent(),
            TokenError::Hold(e) => e.is_permanent(),
            TokenError::InsufficientAllowance { .. } => false,
            _ => true,
        }
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Everything guarded by the token's lock.
#[derive(Debug, Default)]
struct TokenState<L> {
    ledger: L,
    holds: HoldRegistry,
    allowances: HashMap<(Address, Address), Amount>,
    minters: HashSet<Address>,
    total_supply: Amount,
}

impl<L: Ledger> TokenState<L> {
    fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.allowances
            .get(&(*owner, *spender))
            .copied()
            .unwrap_or(0)
    }

    fn set_allowance(&mut self, owner: Address, spender: Address, amount: Amount) {
        if amount == 0 {
            self.allowances.remove(&(owner, spender));
        } else {
            self.allowances.insert((owner, spender), amount);
        }
    }

    /// Debits `from` and credits `to`, or does nothing.
    fn move_value(&mut self, from: Address, to: Address, amount: Amount) -> Result<(), TokenError> {
        if from != to {
            let current = self.ledger.total(&to);
            if current.checked_add(amount).is_none() {
                return Err(LedgerError::Overflow {
                    holder: to,
                    current,
                    amount,
                }
                .into());
            }
        }
        self.ledger.debit_total(from, amount)?;
        self.ledger.credit_total(to, amount)?;
        Ok(())
    }

    fn mint(
        &mut self,
        max_supply: Option<Amount>,
        to: Address,
        amount: Amount,
    ) -> Result<(), TokenError> {
        let new_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(TokenError::SupplyOverflow { amount })?;
        if let Some(max) = max_supply {
            if new_supply > max {
                return Err(TokenError::SupplyCapExceeded { amount, max });
            }
        }
        // total(to) <= total_supply, so this cannot overflow once the supply check passed.
        self.ledger.credit_total(to, amount)?;
        self.total_supply = new_supply;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// HoldableToken
// ---------------------------------------------------------------------------

/// A fungible token with holds.
pub struct HoldableToken<L: Ledger = BalanceLedger> {
    config: TokenConfig,
    state: Mutex<TokenState<L>>,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
    metrics: Option<HoldMetrics>,
}

impl HoldableToken<BalanceLedger> {
    /// Creates a token backed by a [`BalanceLedger`], reading wall-clock time
    /// and logging events through `tracing`.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Config`] if the configuration is invalid.
    pub fn new(config: TokenConfig) -> Result<Self, TokenError> {
        Self::with_parts(config, Arc::new(SystemClock), Arc::new(TracingSink))
    }
}

impl<L: Ledger + Default> HoldableToken<L> {
    /// Creates a token with an explicit clock and event sink. The configured
    /// initial supply is minted to the owner, emitting a `Transfer` from the
    /// zero address.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Config`] if the configuration is invalid.
    pub fn with_parts(
        config: TokenConfig,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventSink>,
    ) -> Result<Self, TokenError> {
        config.validate()?;

        let mut state = TokenState::<L>::default();
        state.minters.insert(config.owner);
        if config.initial_supply > 0 {
            state.mint(config.max_supply, config.owner, config.initial_supply)?;
            events.emit(LedgerEvent::Transfer {
                from: Address::ZERO,
                to: config.owner,
                value: config.initial_supply,
            });
        }

        info!(
            version = PROTOCOL_VERSION,
            name = %config.name,
            symbol = %config.symbol,
            owner = %config.owner,
            initial_supply = config.initial_supply,
            "token created"
        );

        Ok(Self {
            config,
            state: Mutex::new(state),
            clock,
            events,
            metrics: None,
        })
    }
}

impl<L: Ledger> HoldableToken<L> {
    /// Attaches Prometheus metrics, updated on every hold operation.
    pub fn with_metrics(mut self, metrics: HoldMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    // -- metadata ----------------------------------------------------------

    /// Display name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Ticker symbol.
    pub fn symbol(&self) -> &str {
        &self.config.symbol
    }

    /// Display precision.
    pub fn decimals(&self) -> u8 {
        self.config.decimals
    }

    /// The configured owner.
    pub fn owner(&self) -> Address {
        self.config.owner
    }

    /// The full configuration.
    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    /// Attached metrics, if any.
    pub fn metrics(&self) -> Option<&HoldMetrics> {
        self.metrics.as_ref()
    }

    // -- queries -----------------------------------------------------------

    /// Sum of every account's total balance.
    pub fn total_supply(&self) -> Amount {
        self.state.lock().total_supply
    }

    /// Sum of every active hold's value.
    pub fn total_supply_on_hold(&self) -> Amount {
        self.state.lock().ledger.total_held()
    }

    /// Total balance of `account`, held part included.
    pub fn balance_of(&self, account: &Address) -> Amount {
        self.state.lock().ledger.total(account)
    }

    /// The part of `account`'s balance not locked by holds.
    pub fn spendable_balance_of(&self, account: &Address) -> Amount {
        self.state.lock().ledger.spendable(account)
    }

    /// The part of `account`'s balance locked by holds.
    pub fn balance_on_hold(&self, account: &Address) -> Amount {
        self.state.lock().ledger.held(account)
    }

    /// How much `spender` may still move out of `owner`'s balance.
    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.state.lock().allowance(owner, spender)
    }

    /// Returns `true` if `account` may mint.
    pub fn is_minter(&self, account: &Address) -> bool {
        self.state.lock().minters.contains(account)
    }

    /// Status of a hold, or `None` if the id was never used.
    pub fn hold_status(&self, id: &HoldId) -> Option<HoldStatus> {
        self.state.lock().holds.status(id)
    }

    /// Full record of a hold.
    ///
    /// # Errors
    ///
    /// Returns [`HoldError::HoldNotFound`] for an unknown id.
    pub fn retrieve_hold_data(&self, id: &HoldId) -> Result<Hold, HoldError> {
        self.state.lock().holds.get(id).cloned()
    }

    /// Runs `f` against a consistent view of the ledger and hold registry.
    pub fn inspect<R>(&self, f: impl FnOnce(&L, &HoldRegistry) -> R) -> R {
        let state = self.state.lock();
        f(&state.ledger, &state.holds)
    }

    // -- transfers and allowances -----------------------------------------

    /// Moves `amount` from `caller` to `to`.
    ///
    /// # Errors
    ///
    /// [`TokenError::ZeroAddress`] or an insufficient spendable balance.
    pub fn transfer(&self, caller: Address, to: Address, amount: Amount) -> Result<(), TokenError> {
        if to.is_zero() {
            return Err(TokenError::ZeroAddress);
        }

        let mut state = self.state.lock();
        state.move_value(caller, to, amount)?;
        self.events.emit(LedgerEvent::Transfer {
            from: caller,
            to,
            value: amount,
        });

        debug!(from = %caller, to = %to, amount, "transfer");
        Ok(())
    }

    /// Moves `amount` from `from` to `to` on behalf of `caller`, consuming
    /// `caller`'s allowance.
    ///
    /// # Errors
    ///
    /// [`TokenError::ZeroAddress`], [`TokenError::InsufficientAllowance`], or
    /// an insufficient spendable balance on `from`. The allowance is left
    /// untouched on failure.
    pub fn transfer_from(
        &self,
        caller: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), TokenError> {
        if to.is_zero() {
            return Err(TokenError::ZeroAddress);
        }

        let mut state = self.state.lock();
        let allowance = state.allowance(&from, &caller);
        if amount > allowance {
            return Err(TokenError::InsufficientAllowance {
                owner: from,
                spender: caller,
                allowance,
                requested: amount,
            });
        }

        state.move_value(from, to, amount)?;
        state.set_allowance(from, caller, allowance - amount);
        self.events.emit(LedgerEvent::Transfer {
            from,
            to,
            value: amount,
        });

        debug!(spender = %caller, from = %from, to = %to, amount, "transfer_from");
        Ok(())
    }

    /// Sets `spender`'s allowance over `caller`'s balance to `amount`.
    ///
    /// # Errors
    ///
    /// [`TokenError::ZeroAddress`], or an insufficient spendable balance if
    /// `amount` exceeds what `caller` can currently spend.
    pub fn approve(
        &self,
        caller: Address,
        spender: Address,
        amount: Amount,
    ) -> Result<(), TokenError> {
        if spender.is_zero() {
            return Err(TokenError::ZeroAddress);
        }

        let mut state = self.state.lock();
        state.ledger.ensure_spendable(&caller, amount)?;
        state.set_allowance(caller, spender, amount);
        self.events.emit(LedgerEvent::Approval {
            owner: caller,
            spender,
            value: amount,
        });

        debug!(owner = %caller, spender = %spender, amount, "approve");
        Ok(())
    }

    /// Raises `spender`'s allowance by `added`. The resulting allowance is
    /// subject to the same spendable check as [`approve`](Self::approve).
    pub fn increase_allowance(
        &self,
        caller: Address,
        spender: Address,
        added: Amount,
    ) -> Result<Amount, TokenError> {
        if spender.is_zero() {
            return Err(TokenError::ZeroAddress);
        }

        let mut state = self.state.lock();
        let current = state.allowance(&caller, &spender);
        let new_allowance = current
            .checked_add(added)
            .ok_or(TokenError::AllowanceOverflow { current, added })?;
        state.ledger.ensure_spendable(&caller, new_allowance)?;
        state.set_allowance(caller, spender, new_allowance);
        self.events.emit(LedgerEvent::Approval {
            owner: caller,
            spender,
            value: new_allowance,
        });
        Ok(new_allowance)
    }

    /// Lowers `spender`'s allowance by `subtracted`.
    ///
    /// # Errors
    ///
    /// [`TokenError::InsufficientAllowance`] if the allowance would go below
    /// zero.
    pub fn decrease_allowance(
        &self,
        caller: Address,
        spender: Address,
        subtracted: Amount,
    ) -> Result<Amount, TokenError> {
        let mut state = self.state.lock();
        let current = state.allowance(&caller, &spender);
        let new_allowance = current
            .checked_sub(subtracted)
            .ok_or(TokenError::InsufficientAllowance {
                owner: caller,
                spender,
                allowance: current,
                requested: subtracted,
            })?;
        state.set_allowance(caller, spender, new_allowance);
        self.events.emit(LedgerEvent::Approval {
            owner: caller,
            spender,
            value: new_allowance,
        });
        Ok(new_allowance)
    }

    // -- supply ------------------------------------------------------------

    /// Creates `amount` new tokens in `to`'s balance. Holds do not constrain
    /// minting.
    ///
    /// # Errors
    ///
    /// [`TokenError::MintingDisabled`], [`TokenError::Unauthorized`] for a
    /// non-minter, [`TokenError::ZeroAddress`],
    /// [`TokenError::SupplyOverflow`] or [`TokenError::SupplyCapExceeded`].
    pub fn mint(&self, caller: Address, to: Address, amount: Amount) -> Result<(), TokenError> {
        if !self.config.mintable {
            return Err(TokenError::MintingDisabled);
        }
        if to.is_zero() {
            return Err(TokenError::ZeroAddress);
        }

        let mut state = self.state.lock();
        if !state.minters.contains(&caller) {
            return Err(TokenError::Unauthorized {
                caller,
                action: "mint",
            });
        }
        state.mint(self.config.max_supply, to, amount)?;
        self.events.emit(LedgerEvent::Transfer {
            from: Address::ZERO,
            to,
            value: amount,
        });

        info!(minter = %caller, to = %to, amount, supply = state.total_supply, "mint");
        Ok(())
    }

    /// Destroys `amount` of `caller`'s spendable balance.
    ///
    /// # Errors
    ///
    /// [`TokenError::BurningDisabled`] or an insufficient spendable balance.
    pub fn burn(&self, caller: Address, amount: Amount) -> Result<(), TokenError> {
        if !self.config.burnable {
            return Err(TokenError::BurningDisabled);
        }

        let mut state = self.state.lock();
        state.ledger.debit_total(caller, amount)?;
        // total(caller) <= total_supply
        state.total_supply -= amount;
        self.events.emit(LedgerEvent::Transfer {
            from: caller,
            to: Address::ZERO,
            value: amount,
        });

        info!(holder = %caller, amount, supply = state.total_supply, "burn");
        Ok(())
    }

    /// Destroys `amount` of `from`'s spendable balance on behalf of `caller`,
    /// consuming `caller`'s allowance.
    ///
    /// # Errors
    ///
    /// [`TokenError::BurningDisabled`], [`TokenError::InsufficientAllowance`],
    /// or an insufficient spendable balance on `from`.
    pub fn burn_from(
        &self,
        caller: Address,
        from: Address,
        amount: Amount,
    ) -> Result<(), TokenError> {
        if !self.config.burnable {
            return Err(TokenError::BurningDisabled);
        }

        let mut state = self.state.lock();
        let allowance = state.allowance(&from, &caller);
        if amount > allowance {
            return Err(TokenError::InsufficientAllowance {
                owner: from,
                spender: caller,
                allowance,
                requested: amount,
            });
        }

        state.ledger.debit_total(from, amount)?;
        state.total_supply -= amount;
        state.set_allowance(from, caller, allowance - amount);
        self.events.emit(LedgerEvent::Transfer {
            from,
            to: Address::ZERO,
            value: amount,
        });

        info!(spender = %caller, holder = %from, amount, supply = state.total_supply, "burn_from");
        Ok(())
    }

    /// Grants minting rights. Owner only.
    pub fn add_minter(&self, caller: Address, account: Address) -> Result<(), TokenError> {
        self.ensure_owner(caller)?;
        if account.is_zero() {
            return Err(TokenError::ZeroAddress);
        }
        self.state.lock().minters.insert(account);
        info!(account = %account, "minter added");
        Ok(())
    }

    /// Revokes minting rights. Owner only.
    pub fn remove_minter(&self, caller: Address, account: Address) -> Result<(), TokenError> {
        self.ensure_owner(caller)?;
        self.state.lock().minters.remove(&account);
        info!(account = %account, "minter removed");
        Ok(())
    }

    fn ensure_owner(&self, caller: Address) -> Result<(), TokenError> {
        if caller != self.config.owner {
            return Err(TokenError::Unauthorized {
                caller,
                action: "manage minters",
            });
        }
        Ok(())
    }

    // -- holds ---------------------------------------------------------------

    /// Places a hold on `caller`'s balance. See [`HoldEngine::hold`].
    pub fn hold(&self, caller: Address, request: HoldRequest) -> Result<HoldId, HoldError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let result = HoldEngine::new(
            &mut state.ledger,
            &mut state.holds,
            self.clock.as_ref(),
            self.events.as_ref(),
        )
        .hold(caller, &request);

        self.observe(state, "hold", &result, |m, _| m.holds_created_total.inc());
        result
    }

    /// Releases a hold. See [`HoldEngine::release_hold`].
    pub fn release_hold(&self, caller: Address, id: &HoldId) -> Result<HoldStatus, HoldError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let result = HoldEngine::new(
            &mut state.ledger,
            &mut state.holds,
            self.clock.as_ref(),
            self.events.as_ref(),
        )
        .release_hold(caller, id);

        self.observe(state, "release", &result, |m, status| {
            m.record_release(*status)
        });
        result
    }

    /// Executes a hold. See [`HoldEngine::execute_hold`].
    pub fn execute_hold(
        &self,
        caller: Address,
        id: &HoldId,
        preimage: Option<&[u8]>,
        recipient: Option<Address>,
    ) -> Result<Address, HoldError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let result = HoldEngine::new(
            &mut state.ledger,
            &mut state.holds,
            self.clock.as_ref(),
            self.events.as_ref(),
        )
        .execute_hold(caller, id, preimage, recipient);

        self.observe(state, "execute", &result, |m, _| {
            m.holds_executed_total.inc()
        });
        result
    }

    fn observe<T>(
        &self,
        state: &TokenState<L>,
        operation: &str,
        result: &Result<T, HoldError>,
        on_success: impl FnOnce(&HoldMetrics, &T),
    ) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        match result {
            Ok(value) => on_success(metrics, value),
            Err(_) => metrics.record_rejection(operation),
        }
        metrics.observe_state(state.holds.active_count(), state.ledger.total_held());
    }
}

impl<L: Ledger> std::fmt::Debug for HoldableToken<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HoldableToken")
            .field("name", &self.config.name)
            .field("symbol", &self.config.symbol)
            .field("owner", &self.config.owner)
            .finish_non_exhaustive()
    }
}
