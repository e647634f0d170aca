use thiserror::Error;

/// Error types that can occur while resolving an anonymous identity.
///
/// The set is deliberately small. A missing, malformed, expiring or forged
/// credential is never an error: the codec reports it as absent or invalid
/// and the provider quietly issues a fresh identity. What remains are the
/// conditions under which no trustworthy identity can be produced at all.
///
/// # Example
///
/// ```rust
/// use visitor_id::{CookieProvider, IdentityConfig, IdentityError, IdentityProvider, MemoryStore};
///
/// # fn example() -> Result<(), IdentityError> {
/// let provider = CookieProvider::new(IdentityConfig::default())?;
/// let mut store = MemoryStore::new();
///
/// match provider.initialize(&mut store) {
///     Ok(()) => println!("visitor is {:?}", provider.current_identifier(&store)),
///     Err(IdentityError::RandomSourceUnavailable(e)) => eprintln!("no entropy: {e}"),
///     Err(e) => eprintln!("other error: {e}"),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Error, Debug)]
pub enum IdentityError {
    /// The operating system random source could not be read.
    ///
    /// Identifier generation never degrades to a weaker source, so this
    /// aborts `initialize` instead of being swallowed.
    #[error("Random source unavailable: {0}")]
    RandomSourceUnavailable(String),

    /// A cryptographic primitive rejected its input, e.g. the HMAC key.
    #[error("Crypto error: {0}")]
    CryptoError(String),

    /// The system clock reports a time before the Unix epoch.
    #[error("Clock error: {0}")]
    ClockError(String),

    /// Configuration could not be parsed or is unusable.
    ///
    /// # When This Occurs
    ///
    /// - `IdentityConfig::from_json` is given malformed JSON
    /// - The credential name is empty or contains characters that cannot
    ///   appear in a cookie name
    /// - The fixed provider is selected without an identifier
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<serde_json::Error> for IdentityError {
    fn from(err: serde_json::Error) -> Self {
        IdentityError::ConfigError(err.to_string())
    }
}
