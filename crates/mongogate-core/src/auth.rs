use base64::{engine::general_purpose::STANDARD as b64, Engine};
use subtle::ConstantTimeEq;

pub const BASIC_SCHEME: &str = "Basic ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Decode an `Authorization` header value of the form
    /// `Basic base64(username:password)`. Returns `None` for anything that
    /// does not decode cleanly.
    pub fn from_basic_header(value: &str) -> Option<Self> {
        let payload = value.strip_prefix(BASIC_SCHEME)?.trim();
        let raw = b64.decode(payload).ok()?;
        let text = String::from_utf8(raw).ok()?;
        // split on the first colon; passwords may contain more
        let (username, password) = text.split_once(':')?;
        Some(Self::new(username, password))
    }

    fn matches(&self, other: &Credentials) -> bool {
        let user = self.username.as_bytes().ct_eq(other.username.as_bytes());
        let pass = self.password.as_bytes().ct_eq(other.password.as_bytes());
        (user & pass).into()
    }
}

/// Holds the single configured credential pair. Built once at startup and
/// shared read-only between requests.
#[derive(Debug, Clone, Default)]
pub struct Authenticator {
    expected: Option<Credentials>,
}

impl Authenticator {
    /// With either half unset nothing can authenticate.
    pub fn new(username: Option<String>, password: Option<String>) -> Self {
        let expected = match (username, password) {
            (Some(u), Some(p)) => Some(Credentials::new(u, p)),
            _ => None,
        };
        Self { expected }
    }

    pub fn is_configured(&self) -> bool {
        self.expected.is_some()
    }

    pub fn verify(&self, header: Option<&str>) -> bool {
        let Some(expected) = &self.expected else {
            return false;
        };
        header
            .and_then(Credentials::from_basic_header)
            .map(|given| expected.matches(&given))
            .unwrap_or(false)
    }
}
