//! Opaque password hashing boundary.

use anyhow::{Context, Result};
use bcrypt::{hash, verify, DEFAULT_COST};

/// bcrypt-backed verifier. Callers only ever see opaque hash strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct PasswordHasher;

impl PasswordHasher {
    pub fn hash(&self, password: &str) -> Result<String> {
        hash(password, DEFAULT_COST).context("failed to hash password")
    }

    /// A malformed stored hash verifies as false rather than erroring, so
    /// login failures stay indistinguishable.
    pub fn verify(&self, stored_hash: &str, candidate: &str) -> bool {
        verify(candidate, stored_hash).unwrap_or(false)
    }
}
