// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Holdfast Protocol Core Library
//!
//! The primitives underneath holdable tokens: who owns what, how much of it
//! is locked, what time it is, and how state changes are announced.
//!
//! ## Architecture
//!
//! - **types**: `Address`, `HoldId`, `HashLock` and the numeric aliases.
//! - **crypto**: SHA-256 and hash-lock secret generation.
//! - **ledger**: the `Ledger` trait and the in-memory `BalanceLedger`
//!   (total / held / spendable bookkeeping).
//! - **clock**: injected time sources for expiry checks.
//! - **events**: the `LedgerEvent` model and event sinks.
//! - **logging**: `tracing` subscriber setup.
//! - **config**: protocol constants.
//!
//! The hold state machine and the token surface built on top of these live
//! in the `holdfast-contracts` crate.
//!
//! ## Design Philosophy
//!
//! 1. Spendable, not total, is what every debit is checked against.
//! 2. All monetary arithmetic is checked. Overflow is an error, never a wrap.
//! 3. Time and event delivery are injected, never read from ambient state.

pub mod clock;
pub mod config;
pub mod crypto;
pub mod events;
pub mod ledger;
pub mod logging;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use events::{EventSink, LedgerEvent, NoopSink, RecordingSink, ReleaseKind, TracingSink};
pub use ledger::{BalanceLedger, HolderBalance, Ledger, LedgerError, SnapshotError};
pub use types::{Address, Amount, HashLock, HoldId, Timestamp};
