//! # Protocol Constants
//!
//! Every fixed size and sentinel value Holdfast relies on lives here.
//! Token-level settings (name, symbol, supply cap, ...) are runtime
//! configuration and live in the contracts crate instead.

/// Protocol version string reported in logs when a token is created.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Identifier Sizes
// ---------------------------------------------------------------------------

/// Account addresses are 20 bytes, the same width as EVM addresses, so that
/// holds can reference external accounts without re-encoding.
pub const ADDRESS_LENGTH: usize = 20;

/// Hold identifiers are opaque 32-byte values chosen by the caller.
pub const HOLD_ID_LENGTH: usize = 32;

/// Hash locks are SHA-256 digests.
pub const HASH_LOCK_LENGTH: usize = 32;

// ---------------------------------------------------------------------------
// Sentinels
// ---------------------------------------------------------------------------

/// Expiration value meaning "already expired": the holder may release the
/// hold at any moment.
pub const NO_EXPIRATION: u64 = 0;

// ---------------------------------------------------------------------------
// Token Defaults
// ---------------------------------------------------------------------------

/// Decimal places for a token when none are configured.
pub const DEFAULT_DECIMALS: u8 = 18;

// ---------------------------------------------------------------------------
// Runtime
// ---------------------------------------------------------------------------

/// Capacity of the broadcast channel used to fan out ledger events.
/// Slow subscribers that fall further behind than this lose events.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Log filter used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "holdfast_protocol=info,holdfast_contracts=info";

/// Prometheus namespace for every exported metric.
pub const METRICS_NAMESPACE: &str = "holdfast";
