// Core architecture components
mod codec;
mod config;
mod error;
mod generator;
mod provider;
mod time_utils;

// Client transport
pub mod store;

// Signature algorithms
pub mod signature;

// Core components exports
pub use codec::{CredentialCodec, CredentialRejection, DELIMITER, TimeProviderFn};
pub use config::{
    ConfigPreset, DEFAULT_COOKIE_NAME, DEFAULT_FIXED_IDENTIFIER, DEFAULT_TTL, IdentityConfig,
    MAX_TTL, ProviderKind,
};
pub use error::IdentityError;
pub use generator::{
    FixedIdentifierGenerator, IDENTIFIER_HEX_LEN, IdentifierGenerator, RANDOM_SOURCE_BYTES,
    RandomIdentifierGenerator,
};
pub use provider::{
    CookieProvider, FixedProvider, IdentityProvider, build_provider, nonce_user_key,
};
pub use time_utils::MIN_REMAINING_HORIZON;

// Store exports
pub use store::{CookieHeaderStore, CredentialStore, IssuedCredential, MemoryStore};

// Signature algorithm exports
pub use signature::{HmacSha256Algorithm, SignatureAlgorithm};
