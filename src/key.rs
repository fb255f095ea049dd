//! Per-nonce key material.
//!
//! A [`DerivedKey`] pairs a nonce-specific tweak with a key derived from the
//! server secret. Both halves are pure functions of their inputs, which is what
//! lets `generate` and `validate` agree without storing anything.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::error::ConfigError;

/// BLAKE3 key-derivation context for the server secret.
const SECRET_CONTEXT: &str = "encrypted-token 2024-01-01 feistel secret v1";

/// Bytes of the nonce digest kept as the tweak.
pub const TWEAK_LEN: usize = 16;

/// Key material for a single nonce.
#[derive(Clone, PartialEq, Eq)]
pub struct DerivedKey {
    tweak: [u8; TWEAK_LEN],
    key: [u8; 32],
}

impl DerivedKey {
    /// Truncated SHA-256 of the nonce.
    pub fn tweak(&self) -> &[u8; TWEAK_LEN] {
        &self.tweak
    }

    /// The tweak as 32 lowercase hex characters.
    pub fn tweak_hex(&self) -> String {
        hex::encode(self.tweak)
    }

    pub(crate) fn key(&self) -> &[u8; 32] {
        &self.key
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedKey")
            .field("tweak", &self.tweak_hex())
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Derives [`DerivedKey`]s for a fixed server secret.
#[derive(Clone)]
pub struct KeyDeriver {
    secret_key: [u8; 32],
}

impl KeyDeriver {
    /// Fails with [`ConfigError::SecretMissing`] when `secret` is empty.
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, ConfigError> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(ConfigError::SecretMissing);
        }
        Ok(Self {
            secret_key: blake3::derive_key(SECRET_CONTEXT, secret),
        })
    }

    pub fn derive(&self, nonce: &str) -> DerivedKey {
        let digest = Sha256::digest(nonce.as_bytes());
        let mut tweak = [0u8; TWEAK_LEN];
        tweak.copy_from_slice(&digest[..TWEAK_LEN]);
        DerivedKey {
            tweak,
            key: self.secret_key,
        }
    }
}

impl fmt::Debug for KeyDeriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyDeriver").finish_non_exhaustive()
    }
}

/// One-shot derivation of the key material for `(nonce, secret)`.
pub fn derive_key(nonce: &str, secret: &[u8]) -> Result<DerivedKey, ConfigError> {
    Ok(KeyDeriver::new(secret)?.derive(nonce))
}
