//! Keyed signatures over visitor identifiers.
//!
//! The credential carries a MAC over its identifier so the server can tell
//! an identifier it issued apart from one a client made up. HMAC-SHA256 is
//! the only algorithm shipped; the trait exists so a host can plug in a
//! different keyed MAC without touching the codec.

use crate::identity::error::IdentityError;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

/// Length of an HMAC-SHA256 signature in hex characters.
const SIGNATURE_HEX_LEN: usize = 64;

/// A keyed message authentication algorithm used to sign identifiers.
///
/// # Implementation Notes
///
/// - `sign` must be a deterministic function of the key and the message
/// - The output must be transport safe and must not contain `|`
/// - `verify` must compare in constant time and return `false` for any
///   malformed signature rather than failing
pub trait SignatureAlgorithm: Send + Sync {
    /// Short identifier of the algorithm, e.g. `"hmac-sha256"`.
    fn name(&self) -> &'static str;

    /// Produce the signature for `message`.
    fn sign(&self, message: &[u8]) -> String;

    /// Check `signature` against `message` in constant time.
    fn verify(&self, message: &[u8], signature: &str) -> bool;
}

/// HMAC-SHA256 with lowercase hex output.
///
/// # Example
///
/// ```rust
/// use visitor_id::signature::{HmacSha256Algorithm, SignatureAlgorithm};
///
/// let algorithm = HmacSha256Algorithm::new(b"my_secret_key")?;
/// let signature = algorithm.sign(b"0123456789abcdef0123456789abcdef");
///
/// assert_eq!(signature.len(), 64);
/// assert!(algorithm.verify(b"0123456789abcdef0123456789abcdef", &signature));
/// # Ok::<(), visitor_id::IdentityError>(())
/// ```
#[derive(Clone)]
pub struct HmacSha256Algorithm {
    mac: Hmac<Sha256>,
}

impl HmacSha256Algorithm {
    /// Create a new HMAC-SHA256 algorithm keyed with `key`.
    pub fn new(key: &[u8]) -> Result<Self, IdentityError> {
        let mac = Hmac::<Sha256>::new_from_slice(key)
            .map_err(|e| IdentityError::CryptoError(format!("Invalid HMAC key: {e}")))?;
        Ok(Self { mac })
    }
}

impl fmt::Debug for HmacSha256Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HmacSha256Algorithm").finish_non_exhaustive()
    }
}

impl SignatureAlgorithm for HmacSha256Algorithm {
    fn name(&self) -> &'static str {
        "hmac-sha256"
    }

    fn sign(&self, message: &[u8]) -> String {
        let mut mac = self.mac.clone();
        mac.update(message);
        hex::encode(mac.finalize().into_bytes())
    }

    fn verify(&self, message: &[u8], signature: &str) -> bool {
        // Only the exact form `sign` emits; `hex::decode` would also take uppercase
        if !is_canonical_hex(signature) {
            return false;
        }
        let Ok(provided) = hex::decode(signature) else {
            return false;
        };

        let mut mac = self.mac.clone();
        mac.update(message);

        // Constant-time comparison
        mac.verify_slice(&provided).is_ok()
    }
}

fn is_canonical_hex(signature: &str) -> bool {
    signature.len() == SIGNATURE_HEX_LEN
        && signature
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
