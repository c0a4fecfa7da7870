//! Password digest capability.

use argon2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString};
use argon2::Argon2;
use rand::rngs::OsRng;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HashError {
    #[error("password hashing failed: {0}")]
    Hash(String),
}

/// Derives and verifies password digests.
///
/// A trait seam rather than free functions so the flows can be tested with a
/// cheap fake; Argon2 is deliberately slow.
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, HashError>;

    /// Constant-shape check: any failure (bad digest, mismatch) is `false`.
    fn verify(&self, password: &str, digest: &str) -> bool;
}

/// Argon2id with default parameters and a per-digest random salt.
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Hasher;

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String, HashError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| HashError::Hash(e.to_string()))
    }

    fn verify(&self, password: &str, digest: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(digest) else {
            return false;
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_verifies_original_password() {
        let hasher = Argon2Hasher;
        let digest = hasher.hash("hunter2!").unwrap();

        assert!(hasher.verify("hunter2!", &digest));
        assert!(!hasher.verify("hunter3!", &digest));
    }

    #[test]
    fn digests_are_salted() {
        let hasher = Argon2Hasher;
        let a = hasher.hash("same-password").unwrap();
        let b = hasher.hash("same-password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_digest_never_verifies() {
        assert!(!Argon2Hasher.verify("anything", "not-a-phc-string"));
    }
}
