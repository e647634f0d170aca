use crate::identity::error::IdentityError;
use crate::identity::time_utils::MIN_REMAINING_HORIZON;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default name of the credential cookie.
pub const DEFAULT_COOKIE_NAME: &str = "_visitor_id";

/// Default credential lifetime: four weeks.
pub const DEFAULT_TTL: Duration = Duration::from_secs(4 * 7 * 24 * 60 * 60);

/// Longest accepted credential lifetime: 400 days, the cap browsers put on
/// cookie expiry.
pub const MAX_TTL: Duration = Duration::from_secs(400 * 24 * 60 * 60);

/// Identifier handed out by the fixed provider when none is configured.
pub const DEFAULT_FIXED_IDENTIFIER: &str = "00000000000000000000000000000000";

/// Which identity provider the host wires up at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Signed credential kept in a client cookie.
    #[default]
    Cookie,
    /// Deterministic stand-in for non-interactive contexts; never touches
    /// client storage.
    Fixed,
}

impl FromStr for ProviderKind {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cookie" => Ok(ProviderKind::Cookie),
            "fixed" => Ok(ProviderKind::Fixed),
            other => Err(IdentityError::ConfigError(format!(
                "Unknown provider kind: {other}"
            ))),
        }
    }
}

/// Predefined configuration presets for common deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigPreset {
    /// Cookie provider, secure-only transport, four week TTL.
    ///
    /// The signing secret still has to be supplied by the host.
    Production,

    /// Cookie provider over plain HTTP, four week TTL.
    Development,

    /// Fixed provider returning [`DEFAULT_FIXED_IDENTIFIER`].
    Testing,

    /// Load configuration from environment variables.
    ///
    /// Reads configuration from:
    /// - `VISITOR_ID_COOKIE_NAME`: credential cookie name (default: `_visitor_id`)
    /// - `VISITOR_ID_TTL`: credential lifetime in seconds (default: 2419200)
    /// - `VISITOR_ID_SECURE`: `true`/`1`/`yes` for secure-only cookies (default: false)
    /// - `VISITOR_ID_SECRET`: signing secret (default: unset, unsigned credentials)
    /// - `VISITOR_ID_COOKIE_PATH`: cookie path (default: `/`)
    /// - `VISITOR_ID_COOKIE_DOMAIN`: cookie domain (default: unset)
    /// - `VISITOR_ID_PROVIDER`: `cookie` or `fixed` (default: `cookie`)
    /// - `VISITOR_ID_FIXED_ID`: identifier for the fixed provider
    FromEnv,
}

/// Configuration for anonymous visitor identities.
///
/// Resolved once at process startup and handed to the provider, which keeps
/// it for the life of the process.
///
/// # Example
///
/// ```rust
/// use visitor_id::IdentityConfig;
/// use std::time::Duration;
///
/// let config = IdentityConfig {
///     secret: Some("a-long-random-server-side-secret".to_string()),
///     ttl: Duration::from_secs(7 * 24 * 60 * 60),
///     ..IdentityConfig::builtin()
/// };
/// assert!(config.signing_secret().is_some());
/// ```
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(default = "IdentityConfig::builtin")]
pub struct IdentityConfig {
    /// Key under which the credential is stored and read back
    pub cookie_name: String,
    /// Lifetime added to "now" when a credential is issued
    #[serde(rename = "ttl_secs", with = "duration_secs")]
    pub ttl: Duration,
    /// Restrict the credential to encrypted transport
    pub secure: bool,
    /// Signing secret; `None` or empty selects the unsigned two-field form
    pub secret: Option<String>,
    /// Cookie path scope
    pub path: String,
    /// Cookie domain scope
    pub domain: Option<String>,
    /// Provider selected at startup
    pub provider: ProviderKind,
    /// Identifier used by [`ProviderKind::Fixed`]
    pub fixed_identifier: Option<String>,
}

mod duration_secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

impl fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("cookie_name", &self.cookie_name)
            .field("ttl", &self.ttl)
            .field("secure", &self.secure)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("path", &self.path)
            .field("domain", &self.domain)
            .field("provider", &self.provider)
            .field("fixed_identifier", &self.fixed_identifier)
            .finish()
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        let builtin = Self::builtin();
        Self {
            cookie_name: env_string("VISITOR_ID_COOKIE_NAME").unwrap_or(builtin.cookie_name),
            ttl: std::env::var("VISITOR_ID_TTL")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(builtin.ttl),
            secure: std::env::var("VISITOR_ID_SECURE")
                .ok()
                .map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(builtin.secure),
            secret: env_string("VISITOR_ID_SECRET"),
            path: env_string("VISITOR_ID_COOKIE_PATH").unwrap_or(builtin.path),
            domain: env_string("VISITOR_ID_COOKIE_DOMAIN"),
            provider: std::env::var("VISITOR_ID_PROVIDER")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(builtin.provider),
            fixed_identifier: env_string("VISITOR_ID_FIXED_ID"),
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.is_empty())
}

impl IdentityConfig {
    /// Built-in defaults, ignoring the environment.
    pub fn builtin() -> Self {
        Self {
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            ttl: DEFAULT_TTL,
            secure: false,
            secret: None,
            path: "/".to_string(),
            domain: None,
            provider: ProviderKind::Cookie,
            fixed_identifier: None,
        }
    }

    /// Parse a JSON document; missing keys take their built-in defaults.
    ///
    /// ```rust
    /// use visitor_id::{IdentityConfig, ProviderKind};
    ///
    /// let config = IdentityConfig::from_json(r#"{"ttl_secs": 604800, "secure": true}"#)?;
    /// assert_eq!(config.ttl.as_secs(), 604800);
    /// assert_eq!(config.provider, ProviderKind::Cookie);
    /// # Ok::<(), visitor_id::IdentityError>(())
    /// ```
    pub fn from_json(json: &str) -> Result<Self, IdentityError> {
        let config: Self = serde_json::from_str(json)?;
        config.check()?;
        Ok(config)
    }

    /// The signing key, or `None` when signing is disabled.
    pub fn signing_secret(&self) -> Option<&[u8]> {
        self.secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(str::as_bytes)
    }

    /// Identifier the fixed provider hands out.
    pub fn fixed_identifier(&self) -> &str {
        self.fixed_identifier
            .as_deref()
            .unwrap_or(DEFAULT_FIXED_IDENTIFIER)
    }

    /// Rejects configurations no provider can work with.
    pub fn check(&self) -> Result<(), IdentityError> {
        if self.cookie_name.is_empty() {
            return Err(IdentityError::ConfigError(
                "Cookie name must not be empty".to_string(),
            ));
        }
        if let Some(c) = self.cookie_name.chars().find(|c| !is_cookie_name_char(*c)) {
            return Err(IdentityError::ConfigError(format!(
                "Cookie name contains invalid character {c:?}"
            )));
        }
        if self.ttl > MAX_TTL {
            return Err(IdentityError::ConfigError(format!(
                "TTL of {}s exceeds the maximum of {}s",
                self.ttl.as_secs(),
                MAX_TTL.as_secs()
            )));
        }
        check_attribute("Cookie path", &self.path)?;
        if let Some(domain) = &self.domain {
            check_attribute("Cookie domain", domain)?;
        }
        let fixed = self.fixed_identifier();
        if fixed.is_empty() || fixed.contains('|') {
            return Err(IdentityError::ConfigError(
                "Fixed identifier must be non-empty and must not contain '|'".to_string(),
            ));
        }
        Ok(())
    }

    /// Validates the configuration and returns any warnings.
    ///
    /// # Returns
    ///
    /// A vector of warning messages for potentially problematic settings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        match self.signing_secret() {
            None => warnings.push(
                "No signing secret configured; credentials are unsigned and can be forged"
                    .to_string(),
            ),
            Some(secret) if secret.len() < 32 => {
                warnings.push("Signing secret shorter than 32 bytes".to_string())
            }
            Some(_) => {}
        }

        if self.ttl <= MIN_REMAINING_HORIZON {
            warnings.push(
                "TTL not longer than the one-day refresh horizon; \
                 every request will reissue the credential"
                    .to_string(),
            );
        }

        if !self.secure {
            warnings.push("Credential cookie may travel over unencrypted transport".to_string());
        }

        if self.provider == ProviderKind::Fixed {
            warnings.push("Fixed provider gives every visitor the same identifier".to_string());
        }

        warnings
    }

    /// Returns a summary of the current configuration, without the secret.
    pub fn summary(&self) -> String {
        format!(
            "IdentityConfig {{ Name: {}, TTL: {}s, Secure: {}, Signed: {}, \
             Path: {}, Domain: {}, Provider: {:?} }}",
            self.cookie_name,
            self.ttl.as_secs(),
            self.secure,
            self.signing_secret().is_some(),
            self.path,
            self.domain.as_deref().unwrap_or("-"),
            self.provider,
        )
    }
}

// Path and domain are pasted into `Set-Cookie` as-is
fn check_attribute(what: &str, value: &str) -> Result<(), IdentityError> {
    match value.chars().find(|c| *c == ';' || c.is_control()) {
        Some(c) => Err(IdentityError::ConfigError(format!(
            "{what} contains invalid character {c:?}"
        ))),
        None => Ok(()),
    }
}

// RFC 6265 cookie-name token characters
fn is_cookie_name_char(c: char) -> bool {
    c.is_ascii_graphic() && !"()<>@,;:\\\"/[]?={}".contains(c)
}

impl From<ConfigPreset> for IdentityConfig {
    fn from(preset: ConfigPreset) -> Self {
        match preset {
            ConfigPreset::Production => Self {
                secure: true,
                ..Self::builtin()
            },
            ConfigPreset::Development => Self::builtin(),
            ConfigPreset::Testing => Self {
                provider: ProviderKind::Fixed,
                ..Self::builtin()
            },
            ConfigPreset::FromEnv => Self::default(),
        }
    }
}
