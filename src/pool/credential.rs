//! Opaque API credentials.

use secrecy::{ExposeSecret, SecretString};

/// A single opaque API credential.
///
/// The value is held in a [`SecretString`] so it never appears in `Debug`
/// output or logs. Only the last four characters (the [`suffix`]) are safe
/// to surface.
///
/// [`suffix`]: Credential::suffix
#[derive(Clone)]
pub struct Credential {
    value: SecretString,
}

impl Credential {
    /// Create a credential from its secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: SecretString::from(value.into()),
        }
    }

    /// Get the secret value for use in a request.
    ///
    /// This method exposes the secret - use carefully.
    pub fn expose_secret(&self) -> &str {
        self.value.expose_secret()
    }

    /// Last four characters of the value, safe to surface in logs.
    pub fn suffix(&self) -> String {
        let value = self.value.expose_secret();
        let skip = value.chars().count().saturating_sub(4);
        value.chars().skip(skip).collect()
    }

    /// Parse a comma-separated list of credentials.
    ///
    /// Entries are trimmed and empty entries are dropped, so trailing commas
    /// and stray whitespace in configuration are tolerated.
    pub fn parse_list(raw: &str) -> Vec<Credential> {
        raw.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(Credential::new)
            .collect()
    }

    /// Load a comma-separated credential list from an environment variable.
    ///
    /// Returns an empty list when the variable is unset; pool construction
    /// rejects empty lists, so a missing variable fails at startup.
    pub fn from_env(var: &str) -> Vec<Credential> {
        std::env::var(var)
            .map(|raw| Self::parse_list(&raw))
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Credential(...{})", self.suffix())
    }
}

impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        self.value.expose_secret() == other.value.expose_secret()
    }
}

impl Eq for Credential {}

impl From<&str> for Credential {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Credential {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
