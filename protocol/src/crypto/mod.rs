//! # Cryptographic Primitives
//!
//! Holdfast needs exactly one primitive: SHA-256, for the commit-reveal hash
//! locks that gate hold execution. It is a thin wrapper around the audited
//! `sha2` crate, plus a helper that generates fresh secret/lock pairs.

pub mod hash;

pub use hash::{new_secret_hash_pair, sha256, sha256_array, Secret};
