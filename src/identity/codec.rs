use crate::Credential;
use crate::identity::config::IdentityConfig;
use crate::identity::error::IdentityError;
use crate::identity::signature::{HmacSha256Algorithm, SignatureAlgorithm};
use crate::identity::time_utils::{current_timestamp, has_min_horizon};
use std::fmt;
use std::time::Duration;

/// Separator between credential fields. Never appears inside a field.
pub const DELIMITER: char = '|';

/// A function that provides the current Unix timestamp in seconds.
pub type TimeProviderFn = Box<dyn Fn() -> Result<i64, IdentityError> + Send + Sync>;

/// Why a decoded credential was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialRejection {
    /// Expired, or within the one-day refresh horizon.
    Expiring,
    /// Signature missing or does not match the identifier.
    BadSignature,
    /// The clock could not be read, so expiry cannot be judged.
    ClockUnavailable,
}

impl fmt::Display for CredentialRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialRejection::Expiring => write!(f, "expired or expiring within a day"),
            CredentialRejection::BadSignature => write!(f, "signature mismatch"),
            CredentialRejection::ClockUnavailable => write!(f, "clock unavailable"),
        }
    }
}

/// Converts between [`Credential`] and its client-held string form.
///
/// The serialized form is `identifier|expiry|signature`, or
/// `identifier|expiry` when no signing secret is configured. The codec
/// never fails on bad input: anything it cannot parse is simply absent,
/// and anything it cannot trust is simply invalid.
///
/// # Example
///
/// ```rust
/// use visitor_id::CredentialCodec;
/// use std::time::Duration;
///
/// let codec = CredentialCodec::new(Duration::from_secs(7 * 86400), Some(b"secret".as_slice()))?
///     .with_time_provider(|| Ok(1_700_000_000));
///
/// let (raw, expiry) = codec.encode("0123456789abcdef0123456789abcdef")?;
/// assert_eq!(expiry, 1_700_000_000 + 7 * 86400);
///
/// let credential = codec.decode(&raw).expect("freshly encoded");
/// assert!(codec.is_valid(&credential));
/// # Ok::<(), visitor_id::IdentityError>(())
/// ```
pub struct CredentialCodec {
    ttl: Duration,
    algorithm: Option<Box<dyn SignatureAlgorithm>>,
    time_provider: TimeProviderFn,
}

impl fmt::Debug for CredentialCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialCodec")
            .field("ttl", &self.ttl)
            .field("algorithm", &self.algorithm.as_ref().map(|a| a.name()))
            .finish_non_exhaustive()
    }
}

impl CredentialCodec {
    /// Creates a codec. A `None` or empty `secret` selects the unsigned form.
    pub fn new(ttl: Duration, secret: Option<&[u8]>) -> Result<Self, IdentityError> {
        let algorithm = match secret.filter(|s| !s.is_empty()) {
            Some(key) => {
                let algorithm: Box<dyn SignatureAlgorithm> =
                    Box::new(HmacSha256Algorithm::new(key)?);
                Some(algorithm)
            }
            None => None,
        };

        Ok(Self {
            ttl,
            algorithm,
            time_provider: Box::new(current_timestamp),
        })
    }

    /// Creates a codec from the TTL and secret in `config`.
    pub fn from_config(config: &IdentityConfig) -> Result<Self, IdentityError> {
        Self::new(config.ttl, config.signing_secret())
    }

    /// Replaces the signature algorithm, enabling signing if it was off.
    pub fn with_signature_algorithm<A>(mut self, algorithm: A) -> Self
    where
        A: SignatureAlgorithm + 'static,
    {
        self.algorithm = Some(Box::new(algorithm));
        self
    }

    /// Sets a custom time provider function.
    ///
    /// The default provider uses system time.
    pub fn with_time_provider<F>(mut self, provider: F) -> Self
    where
        F: Fn() -> Result<i64, IdentityError> + Send + Sync + 'static,
    {
        self.time_provider = Box::new(provider);
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn is_signed(&self) -> bool {
        self.algorithm.is_some()
    }

    /// Number of delimited fields in the serialized form.
    pub fn field_count(&self) -> usize {
        if self.is_signed() { 3 } else { 2 }
    }

    /// Parses a raw credential.
    ///
    /// Returns `None` unless `raw` splits into exactly [`field_count`](Self::field_count)
    /// non-empty fields and the expiry is a plain decimal integer (digits with
    /// an optional leading `-`, so each expiry has one spelling). Expiry and signature are
    /// not checked here.
    pub fn decode(&self, raw: &str) -> Option<Credential> {
        let fields: Vec<&str> = raw.split(DELIMITER).collect();
        if fields.len() != self.field_count() || fields.iter().any(|f| f.is_empty()) {
            return None;
        }

        let identifier = fields[0].to_string();
        let expiry = parse_expiry(fields[1])?;
        let signature = fields.get(2).map(|s| s.to_string());

        Some(Credential {
            identifier,
            expiry,
            signature,
        })
    }

    /// Returns whether `credential` can be trusted as of now.
    ///
    /// Requires more than one day of remaining lifetime and, when signing
    /// is enabled, a signature that matches the identifier.
    pub fn is_valid(&self, credential: &Credential) -> bool {
        self.rejection(credential).is_none()
    }

    /// Like [`is_valid`](Self::is_valid), but says why a credential is refused.
    pub fn rejection(&self, credential: &Credential) -> Option<CredentialRejection> {
        let Ok(now) = (self.time_provider)() else {
            return Some(CredentialRejection::ClockUnavailable);
        };

        if !has_min_horizon(credential.expiry, now) {
            return Some(CredentialRejection::Expiring);
        }

        if let Some(algorithm) = &self.algorithm {
            let verified = credential
                .signature
                .as_deref()
                .is_some_and(|sig| algorithm.verify(credential.identifier.as_bytes(), sig));
            if !verified {
                return Some(CredentialRejection::BadSignature);
            }
        }

        None
    }

    /// Signature over `identifier`, or `None` when signing is disabled.
    pub fn sign(&self, identifier: &str) -> Option<String> {
        self.algorithm
            .as_ref()
            .map(|algorithm| algorithm.sign(identifier.as_bytes()))
    }

    /// Builds the serialized credential for `identifier`.
    ///
    /// Returns the raw string together with its absolute expiry so the
    /// transport can apply the same expiry to the cookie.
    pub fn encode(&self, identifier: &str) -> Result<(String, i64), IdentityError> {
        let credential = self.issue(identifier)?;
        Ok((credential.to_string(), credential.expiry))
    }

    /// Builds a signed [`Credential`] for `identifier` expiring `ttl` from now.
    pub fn issue(&self, identifier: &str) -> Result<Credential, IdentityError> {
        let now = (self.time_provider)()?;
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);

        Ok(Credential {
            identifier: identifier.to_string(),
            expiry: now.saturating_add(ttl),
            signature: self.sign(identifier),
        })
    }
}

fn parse_expiry(field: &str) -> Option<i64> {
    let digits = field.strip_prefix('-').unwrap_or(field);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}
