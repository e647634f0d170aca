//! Client-side credential transport.
//!
//! The credential lives with the client; on the server it only exists for
//! the length of one request. A [`CredentialStore`] is that request-scoped
//! view: it exposes the values the client sent and collects the credential
//! the provider wants to send back.

use crate::identity::time_utils::http_date;
use std::collections::HashMap;

/// A credential ready to be written back to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCredential {
    /// Key the credential is stored under
    pub name: String,
    /// Serialized credential
    pub value: String,
    /// Absolute expiry, Unix seconds
    pub expires: i64,
    /// Path scope
    pub path: String,
    /// Domain scope; host-only when `None`
    pub domain: Option<String>,
    /// Only send over encrypted transport
    pub secure: bool,
}

impl IssuedCredential {
    /// Renders a `Set-Cookie` header value.
    ///
    /// ```rust
    /// use visitor_id::IssuedCredential;
    ///
    /// let issued = IssuedCredential {
    ///     name: "_visitor_id".to_string(),
    ///     value: "abc|784111777".to_string(),
    ///     expires: 784111777,
    ///     path: "/".to_string(),
    ///     domain: None,
    ///     secure: true,
    /// };
    /// assert_eq!(
    ///     issued.to_set_cookie(),
    ///     "_visitor_id=abc|784111777; Expires=Sun, 06 Nov 1994 08:49:37 GMT; Path=/; Secure"
    /// );
    /// ```
    pub fn to_set_cookie(&self) -> String {
        let mut header = format!(
            "{}={}; Expires={}",
            self.name,
            self.value,
            http_date(self.expires)
        );
        if !self.path.is_empty() {
            header.push_str("; Path=");
            header.push_str(&self.path);
        }
        if let Some(domain) = &self.domain {
            header.push_str("; Domain=");
            header.push_str(domain);
        }
        if self.secure {
            header.push_str("; Secure");
        }
        header
    }
}

/// Request-scoped access to client-held credentials.
///
/// After [`issue`](Self::issue), [`get`](Self::get) for the same name must
/// return the issued value, so later code in the same request sees the new
/// identity before the client has stored it.
pub trait CredentialStore {
    /// Value the client holds under `name`, if any.
    fn get(&self, name: &str) -> Option<String>;

    /// Queue `credential` for the client and make it visible to `get`.
    fn issue(&mut self, credential: IssuedCredential);
}

/// In-memory store, for tests and hosts that manage transport themselves.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<String, String>,
    issued: Vec<IssuedCredential>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a value as if the client had sent it.
    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Credentials issued during this request, oldest first.
    pub fn issued(&self) -> &[IssuedCredential] {
        &self.issued
    }

    /// Starts the next request from the client's point of view: issued
    /// credentials become incoming values and the outbound queue is cleared.
    pub fn next_request(&self) -> Self {
        Self {
            values: self.values.clone(),
            issued: Vec::new(),
        }
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }

    fn issue(&mut self, credential: IssuedCredential) {
        self.values
            .insert(credential.name.clone(), credential.value.clone());
        self.issued.push(credential);
    }
}

/// Store backed by an HTTP `Cookie` request header.
///
/// Issued credentials are rendered with
/// [`set_cookie_headers`](Self::set_cookie_headers) for the response.
#[derive(Debug, Default, Clone)]
pub struct CookieHeaderStore {
    cookies: HashMap<String, String>,
    outgoing: Vec<IssuedCredential>,
}

impl CookieHeaderStore {
    /// Parses a `Cookie` header (`a=1; b=2`). The first occurrence of a
    /// name wins; pairs without `=` are skipped.
    pub fn from_header(header: &str) -> Self {
        Self::from_headers([header])
    }

    /// Parses every `Cookie` header of a request, in order, as one list.
    ///
    /// HTTP/2 clients may split cookies across several header fields; the
    /// first occurrence of a name across all of them wins.
    pub fn from_headers<'a, I>(headers: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut cookies = HashMap::new();
        for pair in headers.into_iter().flat_map(|header| header.split(';')) {
            if let Some((name, value)) = pair.trim().split_once('=') {
                let name = name.trim();
                if name.is_empty() {
                    continue;
                }
                cookies
                    .entry(name.to_string())
                    .or_insert_with(|| value.trim().trim_matches('"').to_string());
            }
        }
        Self {
            cookies,
            outgoing: Vec::new(),
        }
    }

    /// `Set-Cookie` header values for everything issued so far.
    pub fn set_cookie_headers(&self) -> Vec<String> {
        self.outgoing
            .iter()
            .map(IssuedCredential::to_set_cookie)
            .collect()
    }
}

impl CredentialStore for CookieHeaderStore {
    fn get(&self, name: &str) -> Option<String> {
        self.cookies.get(name).cloned()
    }

    fn issue(&mut self, credential: IssuedCredential) {
        self.cookies
            .insert(credential.name.clone(), credential.value.clone());
        self.outgoing.push(credential);
    }
}
