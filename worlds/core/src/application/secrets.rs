// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Shared-Secret Hashing
//!
//! Argon2id with per-secret salts. Cost parameters come from
//! [`AccessControlConfig`] so operators can tune them without a code change;
//! verification reads the parameters back out of the PHC string, so old
//! hashes keep verifying after a cost bump.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use thiserror::Error;
use tracing::warn;

use crate::domain::config::AccessControlConfig;
use crate::domain::access::SecretHash;

#[derive(Debug, Error)]
pub enum SecretHashError {
    #[error("Invalid Argon2 cost parameters: {0}")]
    InvalidParams(String),

    #[error("Secret hashing failed: {0}")]
    Hashing(String),
}

/// Hashes and verifies world shared secrets.
#[derive(Clone)]
pub struct SecretHasher {
    memory_kib: u32,
    iterations: u32,
}

impl SecretHasher {
    pub fn new(config: &AccessControlConfig) -> Self {
        Self {
            memory_kib: config.secret_hash_memory_kib,
            iterations: config.secret_hash_iterations,
        }
    }

    fn hasher(&self) -> Result<Argon2<'static>, SecretHashError> {
        let params = Params::new(self.memory_kib, self.iterations, Params::DEFAULT_P_COST, None)
            .map_err(|e| SecretHashError::InvalidParams(e.to_string()))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    pub fn hash(&self, secret: &str) -> Result<SecretHash, SecretHashError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .hasher()?
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| SecretHashError::Hashing(e.to_string()))?;
        Ok(SecretHash::new(hash.to_string()))
    }

    /// Constant-time verification. A stored hash that fails to parse counts
    /// as a mismatch (fail closed) and is logged without the hash material.
    pub fn verify(stored: &SecretHash, candidate: &str) -> bool {
        let parsed = match PasswordHash::new(stored.encoded()) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "Stored secret hash is not a valid PHC string");
                return false;
            }
        };
        Argon2::default()
            .verify_password(candidate.as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hasher = SecretHasher::new(&AccessControlConfig::default());
        let hash = hasher.hash("hunter2").unwrap();
        assert!(SecretHasher::verify(&hash, "hunter2"));
        assert!(!SecretHasher::verify(&hash, "hunter3"));
    }

    #[test]
    fn distinct_salts_per_hash() {
        let hasher = SecretHasher::new(&AccessControlConfig::default());
        let a = hasher.hash("same").unwrap();
        let b = hasher.hash("same").unwrap();
        assert_ne!(a.encoded(), b.encoded());
    }

    #[test]
    fn garbage_stored_hash_fails_closed() {
        let stored = SecretHash::new("not-a-phc-string".to_string());
        assert!(!SecretHasher::verify(&stored, "anything"));
    }
}
