//! # Visitor ID
//!
//! Durable, tamper-evident pseudo-identities for visitors without a session.
//!
//! One-time tokens (nonces) are usually bound to the logged-in user. For
//! anonymous visitors that user is empty, so every anonymous visitor would
//! share the same token. This crate gives each anonymous visitor a random
//! identifier of their own and keeps it on the client in a signed cookie, so
//! the server stays stateless.
//!
//! ## Features
//!
//! - **Random Identifiers**: 128-bit hex identifiers condensed from 64 bytes of OS randomness
//! - **HMAC-SHA256 Signing**: Forged or foreign credentials are detected and replaced
//! - **Proactive Renewal**: Credentials with a day or less left are reissued
//! - **Stateless**: Nothing is stored on the server
//! - **Swappable Providers**: A fixed provider stands in for tests and command-line runs
//!
//! ## Quick Start
//!
//! ```rust
//! use visitor_id::{
//!     CookieHeaderStore, IdentityConfig, IdentityProvider, build_provider, nonce_user_key,
//! };
//!
//! # fn example() -> Result<(), visitor_id::IdentityError> {
//! // Once, at startup
//! let config = IdentityConfig {
//!     secret: Some("a-long-random-server-side-secret".to_string()),
//!     ..IdentityConfig::builtin()
//! };
//! let provider = build_provider(&config)?;
//!
//! // Per request
//! let mut store = CookieHeaderStore::from_header("theme=dark");
//! provider.initialize(&mut store)?;
//!
//! let key = nonce_user_key(None, provider.as_ref(), &store);
//! assert_eq!(key.map(|k| k.len()), Some(32));
//!
//! for header in store.set_cookie_headers() {
//!     println!("Set-Cookie: {header}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! [`IdentityConfig::default`] reads `VISITOR_ID_*` environment variables;
//! see [`ConfigPreset::FromEnv`] for the list.
//!
//! ## Architecture
//!
//! - **[`CredentialCodec`]**: Encodes, decodes, signs and validates credentials
//! - **[`IdentityProvider`]**: Decides per request whether to issue a new identity
//! - **[`CredentialStore`]**: Request-scoped view of the client's cookies
//! - **[`Credential`]**: The identifier, expiry and signature held by the client

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod identity;

// Re-export commonly used types
pub use identity::{
    ConfigPreset, CookieHeaderStore, CookieProvider, CredentialCodec, CredentialStore,
    FixedProvider, IdentityConfig, IdentityError, IdentityProvider, IssuedCredential,
    MemoryStore, ProviderKind, build_provider, nonce_user_key,
};
pub use identity::{signature, store};

/// The record an anonymous visitor carries between requests.
///
/// Serialized by [`Display`](fmt::Display) as `identifier|expiry|signature`,
/// or `identifier|expiry` when unsigned.
///
/// # Fields
///
/// - `identifier`: opaque random token for one visitor
/// - `expiry`: Unix timestamp (seconds) after which the credential is void
/// - `signature`: MAC over the identifier, absent when signing is disabled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// The visitor's identifier.
    pub identifier: String,

    /// Absolute expiry, seconds since the Unix epoch.
    pub expiry: i64,

    /// Hex-encoded MAC over `identifier`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.identifier, identity::DELIMITER, self.expiry)?;
        if let Some(signature) = &self.signature {
            write!(f, "{}{}", identity::DELIMITER, signature)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::identity::{CredentialCodec, IdentityProvider, MemoryStore};
    use crate::{CookieProvider, Credential, IdentityConfig};
    use std::time::Duration;

    const TEST_SECRET: &str = "test_secret_key_123";

    #[test]
    fn test_credential_display() {
        let signed = Credential {
            identifier: "abc".to_string(),
            expiry: 1_800_000_000,
            signature: Some("f00d".to_string()),
        };
        assert_eq!(signed.to_string(), "abc|1800000000|f00d");

        let unsigned = Credential {
            signature: None,
            ..signed
        };
        assert_eq!(unsigned.to_string(), "abc|1800000000");
    }

    #[test]
    fn test_serialization() {
        let codec =
            CredentialCodec::new(Duration::from_secs(86_400 * 7), Some(b"k".as_slice())).unwrap();
        let credential = codec.issue("0123456789abcdef0123456789abcdef").unwrap();

        let json = serde_json::to_string(&credential).unwrap();
        let deserialized: Credential = serde_json::from_str(&json).unwrap();
        assert_eq!(credential, deserialized);

        let unsigned: Credential =
            serde_json::from_str(r#"{"identifier":"x","expiry":5}"#).unwrap();
        assert!(unsigned.signature.is_none());
    }

    #[test]
    fn test_visitor_keeps_identity_across_requests() {
        let provider = CookieProvider::new(IdentityConfig {
            secret: Some(TEST_SECRET.to_string()),
            ..IdentityConfig::builtin()
        })
        .unwrap();

        // First contact
        let mut first = MemoryStore::new();
        provider.initialize(&mut first).unwrap();
        let id = provider.current_identifier(&first).unwrap();

        // Client sends the cookie back
        let mut second = first.next_request();
        provider.initialize(&mut second).unwrap();
        assert!(second.issued().is_empty());
        assert_eq!(provider.current_identifier(&second), Some(id));
    }

    #[test]
    fn test_concurrent_first_contact_mints_separate_identities() {
        let provider = CookieProvider::new(IdentityConfig {
            secret: Some(TEST_SECRET.to_string()),
            ..IdentityConfig::builtin()
        })
        .unwrap();

        // Two requests race before the client has stored either cookie
        let mut a = MemoryStore::new();
        let mut b = MemoryStore::new();
        provider.initialize(&mut a).unwrap();
        provider.initialize(&mut b).unwrap();

        assert_ne!(
            provider.current_identifier(&a),
            provider.current_identifier(&b)
        );
    }
}
