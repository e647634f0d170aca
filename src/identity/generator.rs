//! Identifier sources.
//!
//! Production identifiers are 32 lowercase hex characters condensed from 64
//! bytes of operating system randomness. Tests and non-interactive hosts swap
//! in a [`FixedIdentifierGenerator`] or a closure.

use crate::identity::error::IdentityError;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

/// Number of random bytes drawn per identifier.
pub const RANDOM_SOURCE_BYTES: usize = 64;

/// Length of a generated identifier in hex characters (128 bits).
pub const IDENTIFIER_HEX_LEN: usize = 32;

/// A source of fresh visitor identifiers.
///
/// Any `Fn() -> Result<String, IdentityError>` closure is a generator too.
/// Returned identifiers must be non-empty and must not contain `|`.
pub trait IdentifierGenerator: Send + Sync {
    fn generate(&self) -> Result<String, IdentityError>;
}

impl<F> IdentifierGenerator for F
where
    F: Fn() -> Result<String, IdentityError> + Send + Sync,
{
    fn generate(&self) -> Result<String, IdentityError> {
        self()
    }
}

/// Draws from the OS CSPRNG and hashes down to [`IDENTIFIER_HEX_LEN`] hex chars.
///
/// A failing random source is reported as
/// [`IdentityError::RandomSourceUnavailable`]; there is no fallback.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIdentifierGenerator;

impl RandomIdentifierGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl IdentifierGenerator for RandomIdentifierGenerator {
    fn generate(&self) -> Result<String, IdentityError> {
        let mut seed = [0u8; RANDOM_SOURCE_BYTES];
        OsRng
            .try_fill_bytes(&mut seed)
            .map_err(|e| IdentityError::RandomSourceUnavailable(e.to_string()))?;

        let digest = Sha256::digest(seed);
        Ok(hex::encode(&digest[..IDENTIFIER_HEX_LEN / 2]))
    }
}

/// Always returns the same identifier.
#[derive(Debug, Clone)]
pub struct FixedIdentifierGenerator {
    identifier: String,
}

impl FixedIdentifierGenerator {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
        }
    }
}

impl IdentifierGenerator for FixedIdentifierGenerator {
    fn generate(&self) -> Result<String, IdentityError> {
        Ok(self.identifier.clone())
    }
}
