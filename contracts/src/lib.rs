//! # Holdfast Contracts
//!
//! Holds and the token that carries them:
//!
//! - **Hold**: the record, its status and the request that creates it.
//! - **Hold Registry**: keyed storage enforcing id uniqueness and
//!   one-way status transitions.
//! - **Hold Engine**: the state machine that places, releases and executes holds
//!   against any [`holdfast_protocol::Ledger`].
//! - **Holdable Token**: the public surface, transfer / approve / burn /
//!   mint plus the hold operations, behind one lock.
//!
//! ## Design Principles
//!
//! 1. All monetary operations check for overflow. `checked_add` and
//!    `checked_sub` everywhere.
//! 2. State transitions are explicit: enum variants, not boolean flags.
//! 3. Validation strictly precedes mutation; a rejected call changes nothing.
//! 4. Every public record is serializable (serde) for audit export.

pub mod config;
pub mod hold;
pub mod hold_engine;
pub mod hold_registry;
pub mod metrics;
pub mod token;

pub use config::{ConfigError, TokenConfig};
pub use hold::{Hold, HoldError, HoldRequest, HoldStatus};
pub use hold_engine::HoldEngine;
pub use hold_registry::HoldRegistry;
pub use metrics::HoldMetrics;
pub use token::{HoldableToken, TokenError};
