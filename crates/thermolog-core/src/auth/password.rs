//! Password hashing and verification.
//!
//! New hashes are Argon2id PHC strings with a random per-record salt.
//! Records written by the earlier tool hold an unsalted SHA-256 hex digest;
//! those still verify, and are flagged for rehashing.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::AuthError;

/// Minimum password length, in characters.
pub const MIN_PASSWORD_LENGTH: usize = 4;

/// Length of a hex-encoded SHA-256 digest.
const LEGACY_DIGEST_LEN: usize = 64;

/// Argon2 cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl HashParams {
    pub const fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Self {
        Self {
            memory_kib,
            iterations,
            parallelism,
        }
    }
}

impl Default for HashParams {
    fn default() -> Self {
        Self::new(
            Params::DEFAULT_M_COST,
            Params::DEFAULT_T_COST,
            Params::DEFAULT_P_COST,
        )
    }
}

/// Result of checking a password against a stored hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordCheck {
    Valid,
    /// Correct password, but the stored hash is legacy or uses stale parameters.
    ValidNeedsRehash,
    Invalid,
}

impl PasswordCheck {
    pub fn is_valid(self) -> bool {
        !matches!(self, PasswordCheck::Invalid)
    }
}

#[derive(Debug, Clone)]
pub struct CredentialHasher {
    params: Params,
}

impl CredentialHasher {
    pub fn new(params: HashParams) -> Result<Self, AuthError> {
        let params = Params::new(
            params.memory_kib,
            params.iterations,
            params.parallelism,
            None,
        )
        .map_err(|e| AuthError::Hashing(e.to_string()))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a password with a fresh random salt.
    pub fn hash(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::Hashing(e.to_string()))?;
        Ok(hash.to_string())
    }

    /// Check `password` against a stored hash of either format.
    pub fn verify(&self, password: &str, stored: &str) -> PasswordCheck {
        if is_legacy_digest(stored) {
            return if legacy_digest(password) == stored.to_ascii_lowercase() {
                PasswordCheck::ValidNeedsRehash
            } else {
                PasswordCheck::Invalid
            };
        }

        let parsed = match PasswordHash::new(stored) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "Stored password hash is malformed");
                return PasswordCheck::Invalid;
            }
        };

        if self
            .argon2()
            .verify_password(password.as_bytes(), &parsed)
            .is_err()
        {
            return PasswordCheck::Invalid;
        }

        if self.is_current(&parsed) {
            PasswordCheck::Valid
        } else {
            PasswordCheck::ValidNeedsRehash
        }
    }

    fn is_current(&self, parsed: &PasswordHash<'_>) -> bool {
        if parsed.algorithm != Algorithm::Argon2id.ident() {
            return false;
        }
        match Params::try_from(parsed) {
            Ok(stored) => {
                stored.m_cost() == self.params.m_cost()
                    && stored.t_cost() == self.params.t_cost()
                    && stored.p_cost() == self.params.p_cost()
            }
            Err(_) => false,
        }
    }
}

/// Unsalted single-round SHA-256 of the password bytes, hex encoded.
///
/// Only used to verify records created before Argon2 hashing.
pub fn legacy_digest(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

fn is_legacy_digest(stored: &str) -> bool {
    stored.len() == LEGACY_DIGEST_LEN && stored.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Reject passwords shorter than `min_length` characters.
pub fn check_strength(password: &str, min_length: usize) -> Result<(), AuthError> {
    if password.chars().count() < min_length {
        return Err(AuthError::WeakPassword { min: min_length });
    }
    Ok(())
}

#[cfg(test)]
pub(crate) fn test_hasher() -> CredentialHasher {
    // Lowest cost argon2 accepts; keeps tests fast.
    CredentialHasher::new(HashParams::new(8, 1, 1)).unwrap()
}
