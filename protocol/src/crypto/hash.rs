//! # Hashing Utilities
//!
//! SHA-256 is used for hash locks so that commitments interoperate with
//! the rest of the ecosystem (an external party commits with
//! `sha256(secret)` and reveals `secret` to the notary out of band).
//!
//! A [`Secret`] is the 32-byte preimage. [`new_secret_hash_pair`] produces a
//! random secret together with its [`HashLock`], the way a holder would
//! before calling `hold`.

use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::types::HashLock;

/// Compute the SHA-256 hash of the input data.
///
/// # Example
///
/// ```
/// use holdfast_protocol::crypto::sha256;
///
/// let hash = sha256(b"holdfast");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Compute the SHA-256 hash and return a fixed-size array.
pub fn sha256_array(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// A 32-byte hash-lock preimage.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret([u8; 32]);

impl Secret {
    /// Generates a random secret from the thread-local CSPRNG.
    pub fn random() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Wraps existing bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The raw preimage bytes, as passed to `execute_hold`.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The lock this secret opens.
    pub fn hash_lock(&self) -> HashLock {
        HashLock::from_preimage(&self.0)
    }

    /// Hex encoding of the secret.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

// Secrets must not leak into logs.
impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret(..)")
    }
}

/// Generates a random secret and the hash lock that commits to it.
pub fn new_secret_hash_pair() -> (Secret, HashLock) {
    let secret = Secret::random();
    let lock = secret.hash_lock();
    (secret, lock)
}
