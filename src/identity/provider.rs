use crate::identity::codec::{CredentialCodec, CredentialRejection, DELIMITER};
use crate::identity::config::{IdentityConfig, ProviderKind};
use crate::identity::error::IdentityError;
use crate::identity::generator::{IdentifierGenerator, RandomIdentifierGenerator};
use crate::identity::store::{CredentialStore, IssuedCredential};

/// Source of anonymous visitor identities.
///
/// Hosts construct one provider at startup (see [`build_provider`]) and pass
/// it by reference into request handling. Per request, call
/// [`initialize`](Self::initialize) first, then
/// [`current_identifier`](Self::current_identifier) wherever an anonymous key
/// is needed.
pub trait IdentityProvider: Send + Sync {
    /// Makes sure the client holds a valid credential, issuing a new one
    /// into `store` if not.
    ///
    /// Only an unusable random source or clock is an error; bad input from
    /// the client just leads to reissuance.
    fn initialize(&self, store: &mut dyn CredentialStore) -> Result<(), IdentityError>;

    /// The visitor's identifier, or `None` if the store holds no credential.
    fn current_identifier(&self, store: &dyn CredentialStore) -> Option<String>;
}

/// Keeps the identifier in a signed, client-held cookie.
///
/// # Example
///
/// ```rust
/// use visitor_id::{
///     CookieProvider, CredentialStore, IdentityConfig, IdentityProvider, MemoryStore,
/// };
///
/// # fn example() -> Result<(), visitor_id::IdentityError> {
/// let provider = CookieProvider::new(IdentityConfig {
///     secret: Some("server-side-signing-secret".to_string()),
///     ..IdentityConfig::builtin()
/// })?;
///
/// let mut store = MemoryStore::new();
/// provider.initialize(&mut store)?;
///
/// let id = provider.current_identifier(&store).expect("issued above");
/// assert_eq!(id.len(), 32);
/// assert_eq!(store.issued().len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct CookieProvider {
    config: IdentityConfig,
    codec: CredentialCodec,
    generator: Box<dyn IdentifierGenerator>,
}

impl CookieProvider {
    /// Creates a provider using OS randomness for new identifiers.
    pub fn new(config: IdentityConfig) -> Result<Self, IdentityError> {
        config.check()?;
        for warning in config.validate() {
            tracing::warn!(cookie = %config.cookie_name, "{}", warning);
        }

        let codec = CredentialCodec::from_config(&config)?;
        tracing::debug!("Visitor identity provider ready: {}", config.summary());

        Ok(Self {
            config,
            codec,
            generator: Box::new(RandomIdentifierGenerator::new()),
        })
    }

    /// Replaces the identifier source.
    pub fn with_generator<G>(mut self, generator: G) -> Self
    where
        G: IdentifierGenerator + 'static,
    {
        self.generator = Box::new(generator);
        self
    }

    /// Replaces the codec, e.g. to pin its clock.
    pub fn with_codec(mut self, codec: CredentialCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn config(&self) -> &IdentityConfig {
        &self.config
    }

    pub fn codec(&self) -> &CredentialCodec {
        &self.codec
    }

    fn mint(&self) -> Result<String, IdentityError> {
        let identifier = self.generator.generate()?;
        if identifier.is_empty() || identifier.contains(DELIMITER) {
            return Err(IdentityError::ConfigError(
                "Identifier generator produced an empty or delimited identifier".to_string(),
            ));
        }
        Ok(identifier)
    }
}

impl IdentityProvider for CookieProvider {
    fn initialize(&self, store: &mut dyn CredentialStore) -> Result<(), IdentityError> {
        let name = &self.config.cookie_name;

        match store.get(name).and_then(|raw| self.codec.decode(&raw)) {
            None => tracing::debug!(cookie = %name, "No usable visitor credential"),
            Some(credential) => match self.codec.rejection(&credential) {
                None => {
                    tracing::trace!(cookie = %name, "Visitor credential still valid");
                    return Ok(());
                }
                Some(CredentialRejection::BadSignature) => tracing::warn!(
                    cookie = %name,
                    "Visitor credential signature mismatch, discarding identifier"
                ),
                Some(reason) => {
                    tracing::debug!(cookie = %name, %reason, "Refreshing visitor credential")
                }
            },
        }

        let identifier = self.mint()?;
        let (value, expires) = self.codec.encode(&identifier)?;

        store.issue(IssuedCredential {
            name: name.clone(),
            value,
            expires,
            path: self.config.path.clone(),
            domain: self.config.domain.clone(),
            secure: self.config.secure,
        });
        tracing::debug!(cookie = %name, expires, "Issued new visitor credential");

        Ok(())
    }

    fn current_identifier(&self, store: &dyn CredentialStore) -> Option<String> {
        store
            .get(&self.config.cookie_name)
            .and_then(|raw| self.codec.decode(&raw))
            .map(|credential| credential.identifier)
    }
}

/// Hands every caller the same identifier without touching client storage.
///
/// Meant for command-line runs, background jobs and tests.
#[derive(Debug, Clone)]
pub struct FixedProvider {
    identifier: String,
}

impl FixedProvider {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
        }
    }
}

impl IdentityProvider for FixedProvider {
    fn initialize(&self, _store: &mut dyn CredentialStore) -> Result<(), IdentityError> {
        Ok(())
    }

    fn current_identifier(&self, _store: &dyn CredentialStore) -> Option<String> {
        Some(self.identifier.clone())
    }
}

/// Constructs the provider selected by `config.provider`.
///
/// Hosts that need their own provider can skip this and use any
/// `impl IdentityProvider` directly.
pub fn build_provider(
    config: &IdentityConfig,
) -> Result<Box<dyn IdentityProvider>, IdentityError> {
    match config.provider {
        ProviderKind::Cookie => Ok(Box::new(CookieProvider::new(config.clone())?)),
        ProviderKind::Fixed => {
            config.check()?;
            tracing::debug!("Using fixed visitor identity provider");
            Ok(Box::new(FixedProvider::new(config.fixed_identifier())))
        }
    }
}

/// The key a one-time-token mechanism should bind to.
///
/// An authenticated, non-empty `user_id` is returned as is; otherwise the
/// anonymous identifier from `provider` stands in for it.
pub fn nonce_user_key(
    user_id: Option<&str>,
    provider: &dyn IdentityProvider,
    store: &dyn CredentialStore,
) -> Option<String> {
    match user_id.filter(|id| !id.is_empty()) {
        Some(id) => Some(id.to_string()),
        None => provider.current_identifier(store),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::generator::FixedIdentifierGenerator;
    use crate::identity::store::MemoryStore;
    use std::time::Duration;

    const NOW: i64 = 1_700_000_000;
    const DAY: i64 = 86_400;
    const SECRET: &str = "provider-test-secret";

    fn config(secret: Option<&str>) -> IdentityConfig {
        IdentityConfig {
            secret: secret.map(str::to_string),
            ..IdentityConfig::builtin()
        }
    }

    fn provider_with_secret(secret: Option<&str>) -> CookieProvider {
        let config = config(secret);
        let codec = CredentialCodec::from_config(&config)
            .unwrap()
            .with_time_provider(|| Ok(NOW));
        CookieProvider::new(config).unwrap().with_codec(codec)
    }

    fn provider() -> CookieProvider {
        provider_with_secret(Some(SECRET))
    }

    #[test]
    fn test_empty_store_issues_signed_credential() {
        let provider = provider();
        let mut store = MemoryStore::new();

        provider.initialize(&mut store).unwrap();

        let issued = store.issued();
        assert_eq!(issued.len(), 1);
        let fields: Vec<&str> = issued[0].value.split('|').collect();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0].len(), 32);
        assert!(fields[0].chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(fields[1], (NOW + 28 * DAY).to_string());
        assert_eq!(fields[2], provider.codec().sign(fields[0]).unwrap());

        assert_eq!(issued[0].expires, NOW + 28 * DAY);
        assert_eq!(issued[0].name, "_visitor_id");
        assert_eq!(issued[0].path, "/");
        assert!(!issued[0].secure);

        assert_eq!(
            provider.current_identifier(&store).as_deref(),
            Some(fields[0])
        );
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let provider = provider();
        let mut store = MemoryStore::new();

        provider.initialize(&mut store).unwrap();
        let first = provider.current_identifier(&store);
        provider.initialize(&mut store).unwrap();

        assert_eq!(store.issued().len(), 1);
        assert_eq!(provider.current_identifier(&store), first);
    }

    #[test]
    fn test_valid_credential_is_kept() {
        let provider = provider();
        let id = "feedfacefeedfacefeedfacefeedface";
        let signature = provider.codec().sign(id).unwrap();
        let raw = format!("{id}|{}|{signature}", NOW + 2 * DAY);
        let mut store = MemoryStore::new().with_value("_visitor_id", raw);

        provider.initialize(&mut store).unwrap();

        assert!(store.issued().is_empty());
        assert_eq!(provider.current_identifier(&store).as_deref(), Some(id));
    }

    #[test]
    fn test_foreign_signature_is_discarded() {
        let provider = provider();
        let foreign = provider_with_secret(Some("some-other-secret"));
        let mut foreign_store = MemoryStore::new();
        foreign.initialize(&mut foreign_store).unwrap();
        let foreign_id = foreign.current_identifier(&foreign_store).unwrap();

        let mut store = foreign_store.next_request();
        provider.initialize(&mut store).unwrap();

        assert_eq!(store.issued().len(), 1);
        let new_id = provider.current_identifier(&store).unwrap();
        assert_ne!(new_id, foreign_id);
        let issued = provider.codec().decode(&store.issued()[0].value).unwrap();
        assert!(provider.codec().is_valid(&issued));
    }

    #[test]
    fn test_expiring_credential_is_refreshed() {
        let provider = provider();
        let id = "feedfacefeedfacefeedfacefeedface";
        let signature = provider.codec().sign(id).unwrap();
        let raw = format!("{id}|{}|{signature}", NOW + DAY);
        let mut store = MemoryStore::new().with_value("_visitor_id", raw);

        provider.initialize(&mut store).unwrap();

        assert_eq!(store.issued().len(), 1);
        assert_ne!(provider.current_identifier(&store).as_deref(), Some(id));
    }

    #[test]
    fn test_malformed_credentials_are_replaced() {
        let provider = provider();

        for raw in ["", "garbage", "a|b", "a|1|2|3", "id|notanumber|sig"] {
            let mut store = MemoryStore::new().with_value("_visitor_id", raw);
            provider.initialize(&mut store).unwrap();
            assert_eq!(store.issued().len(), 1, "no reissue for {raw:?}");
            assert!(provider.current_identifier(&store).is_some());
        }
    }

    #[test]
    fn test_unsigned_mode_uses_two_fields() {
        let provider = provider_with_secret(None);
        let mut store = MemoryStore::new();

        provider.initialize(&mut store).unwrap();

        let value = &store.issued()[0].value;
        assert_eq!(value.split('|').count(), 2);

        // A signed credential is not understood in unsigned mode
        let signed = provider_with_secret(Some(SECRET));
        let mut signed_store = MemoryStore::new();
        signed.initialize(&mut signed_store).unwrap();
        assert!(provider.current_identifier(&signed_store).is_none());
    }

    #[test]
    fn test_custom_generator_and_scope() {
        let config = IdentityConfig {
            secret: Some(SECRET.to_string()),
            secure: true,
            path: "/forum".to_string(),
            domain: Some("example.com".to_string()),
            ttl: Duration::from_secs(3 * 86_400),
            ..IdentityConfig::builtin()
        };
        let provider = CookieProvider::new(config)
            .unwrap()
            .with_generator(FixedIdentifierGenerator::new("deterministic"));
        let mut store = MemoryStore::new();

        provider.initialize(&mut store).unwrap();

        let issued = &store.issued()[0];
        assert!(issued.secure);
        assert_eq!(issued.path, "/forum");
        assert_eq!(issued.domain.as_deref(), Some("example.com"));
        assert_eq!(
            provider.current_identifier(&store).as_deref(),
            Some("deterministic")
        );
    }

    #[test]
    fn test_random_source_failure_aborts() {
        let provider = provider().with_generator(|| -> Result<String, IdentityError> {
            Err(IdentityError::RandomSourceUnavailable("no entropy".to_string()))
        });
        let mut store = MemoryStore::new();

        assert!(matches!(
            provider.initialize(&mut store),
            Err(IdentityError::RandomSourceUnavailable(_))
        ));
        assert!(store.issued().is_empty());
    }

    #[test]
    fn test_delimited_identifier_is_rejected() {
        let provider = provider().with_generator(FixedIdentifierGenerator::new("a|b"));
        let mut store = MemoryStore::new();

        assert!(provider.initialize(&mut store).is_err());
        assert!(store.issued().is_empty());
    }

    #[test]
    fn test_current_identifier_without_credential() {
        let provider = provider();
        assert!(provider.current_identifier(&MemoryStore::new()).is_none());
    }

    #[test]
    fn test_fixed_provider_never_touches_store() {
        let provider = FixedProvider::new("cli");
        let mut store = MemoryStore::new();

        provider.initialize(&mut store).unwrap();

        assert!(store.issued().is_empty());
        assert!(store.get("_visitor_id").is_none());
        assert_eq!(provider.current_identifier(&store).as_deref(), Some("cli"));
    }

    #[test]
    fn test_build_provider_selects_kind() {
        let fixed = build_provider(&IdentityConfig {
            provider: ProviderKind::Fixed,
            fixed_identifier: Some("job-runner".to_string()),
            ..IdentityConfig::builtin()
        })
        .unwrap();
        let mut store = MemoryStore::new();
        fixed.initialize(&mut store).unwrap();
        assert_eq!(
            fixed.current_identifier(&store).as_deref(),
            Some("job-runner")
        );
        assert!(store.issued().is_empty());

        let cookie = build_provider(&config(Some(SECRET))).unwrap();
        cookie.initialize(&mut store).unwrap();
        assert_eq!(store.issued().len(), 1);
    }

    #[test]
    fn test_build_provider_rejects_bad_config() {
        let result = build_provider(&IdentityConfig {
            cookie_name: "bad name".to_string(),
            ..IdentityConfig::builtin()
        });
        assert!(matches!(result, Err(IdentityError::ConfigError(_))));

        let result = build_provider(&IdentityConfig {
            ttl: Duration::from_secs(u64::MAX),
            ..config(Some(SECRET))
        });
        assert!(matches!(result, Err(IdentityError::ConfigError(_))));

        let result = build_provider(&IdentityConfig {
            path: "/\r\nSet-Cookie: admin=1".to_string(),
            ..config(Some(SECRET))
        });
        assert!(matches!(result, Err(IdentityError::ConfigError(_))));
    }

    #[test]
    fn test_nonce_user_key() {
        let provider = FixedProvider::new("anon-key");
        let store = MemoryStore::new();

        assert_eq!(
            nonce_user_key(Some("42"), &provider, &store).as_deref(),
            Some("42")
        );
        assert_eq!(
            nonce_user_key(Some(""), &provider, &store).as_deref(),
            Some("anon-key")
        );
        assert_eq!(
            nonce_user_key(None, &provider, &store).as_deref(),
            Some("anon-key")
        );
    }
}
