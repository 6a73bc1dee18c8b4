//! # Primitive Types
//!
//! Fixed-width identifiers shared by every Holdfast component:
//!
//! - [`Address`]: a 20-byte account address. [`Address::ZERO`] is the
//!   "unspecified" sentinel (no recipient, no notary).
//! - [`HoldId`]: the caller-chosen 32-byte identifier of a hold.
//! - [`HashLock`]: a 32-byte SHA-256 commitment gating hold execution.
//!   [`HashLock::ZERO`] means "no preimage required".
//!
//! All three render as `0x`-prefixed lowercase hex and parse from hex with
//! or without the prefix. They serialize as hex strings so that JSON
//! configuration and event logs stay human-readable.

use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::config::{ADDRESS_LENGTH, HASH_LOCK_LENGTH, HOLD_ID_LENGTH};
use crate::crypto::hash::sha256_array;

/// Amounts are plain `u64` values in the token's smallest unit.
pub type Amount = u64;

/// Unix timestamp in seconds.
pub type Timestamp = u64;

/// Decodes a hex string (optionally `0x`-prefixed) into a fixed-size array.
fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], hex::FromHexError> {
    let trimmed = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    let mut out = [0u8; N];
    hex::decode_to_slice(trimmed, &mut out)?;
    Ok(out)
}

/// Generates the shared hex/serde/Display plumbing for a byte-array newtype.
macro_rules! hex_newtype {
    ($name:ident, $len:expr) => {
        impl $name {
            /// Wraps raw bytes.
            pub const fn from_bytes(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            /// Returns the raw bytes.
            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// Returns `true` if every byte is zero.
            pub fn is_zero(&self) -> bool {
                self.0.iter().all(|b| *b == 0)
            }

            /// Returns the `0x`-prefixed hex encoding.
            pub fn to_hex(&self) -> String {
                format!("0x{}", hex::encode(self.0))
            }

            /// Parses a hex string, with or without the `0x` prefix.
            pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
                decode_fixed::<$len>(s).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({}...)", stringify!($name), &self.to_hex()[..12])
            }
        }

        impl std::str::FromStr for $name {
            type Err = hex::FromHexError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_hex(s)
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::from_hex(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A 20-byte account address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; ADDRESS_LENGTH]);

hex_newtype!(Address, ADDRESS_LENGTH);

impl Address {
    /// The zero address. Used as the "unspecified" sentinel for hold
    /// recipients and rejected wherever a real party is required.
    pub const ZERO: Address = Address([0u8; ADDRESS_LENGTH]);

    /// Builds a deterministic address from a short label.
    ///
    /// Handy for fixtures: `Address::from_label("holder")` is always the same
    /// address and never the zero address for a non-empty label.
    pub fn from_label(label: &str) -> Self {
        let digest = sha256_array(label.as_bytes());
        let mut out = [0u8; ADDRESS_LENGTH];
        out.copy_from_slice(&digest[..ADDRESS_LENGTH]);
        Self(out)
    }
}

// ---------------------------------------------------------------------------
// HoldId
// ---------------------------------------------------------------------------

/// Caller-chosen identifier of a hold. Opaque to the system; only
/// uniqueness matters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HoldId([u8; HOLD_ID_LENGTH]);

hex_newtype!(HoldId, HOLD_ID_LENGTH);

impl HoldId {
    /// Generates a random hold id from the thread-local CSPRNG.
    pub fn random() -> Self {
        let mut bytes = [0u8; HOLD_ID_LENGTH];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }
}

// ---------------------------------------------------------------------------
// HashLock
// ---------------------------------------------------------------------------

/// SHA-256 commitment that the notary must open to execute a hold.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct HashLock([u8; HASH_LOCK_LENGTH]);

hex_newtype!(HashLock, HASH_LOCK_LENGTH);

impl HashLock {
    /// The "no preimage required" sentinel.
    pub const ZERO: HashLock = HashLock([0u8; HASH_LOCK_LENGTH]);

    /// Commits to `preimage` by hashing it with SHA-256.
    pub fn from_preimage(preimage: &[u8]) -> Self {
        Self(sha256_array(preimage))
    }

    /// Returns `true` if `preimage` opens this lock.
    ///
    /// The zero sentinel is opened by anything, including an empty preimage.
    pub fn is_opened_by(&self, preimage: &[u8]) -> bool {
        self.is_zero() || sha256_array(preimage) == self.0
    }
}
