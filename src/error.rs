//! Error types for the quota-rotor library.

use thiserror::Error;

/// The main error type for all resilience-layer operations.
#[derive(Error, Debug)]
pub enum RotorError {
    /// Credential pool was constructed with no credentials
    #[error("credential pool is empty: at least one credential is required")]
    EmptyPool,

    /// The wrapped call failed with an error that is not quota exhaustion
    #[error("operation '{operation}' failed: {source}")]
    Fatal {
        /// Name of the logical operation that failed
        operation: String,
        /// The provider error as reported by the wrapped call
        #[source]
        source: ProviderError,
    },

    /// Quota-classified failures persisted across the full attempt budget
    #[error(
        "operation '{operation}' hit quota limits on every attempt: \
         {attempts} attempts across {credentials} credential(s)"
    )]
    QuotaExhausted {
        /// Name of the logical operation that failed
        operation: String,
        /// Number of attempts made before giving up
        attempts: u32,
        /// Number of credentials in the pool
        credentials: usize,
    },

    /// A wait (admission, settling delay or cool-down) was cancelled
    #[error("operation '{operation}' cancelled while waiting")]
    Cancelled {
        /// Name of the logical operation that was cancelled
        operation: String,
    },
}

/// Error reported by a wrapped provider call.
///
/// This is the typed boundary between the resilience layer and the external
/// service: the call site converts whatever its transport produced into a
/// `ProviderError` carrying the HTTP status (when one exists) and the
/// provider's message, so quota classification operates on structured fields
/// instead of string inspection of arbitrary errors.
#[derive(Debug)]
pub struct ProviderError {
    /// HTTP status code, if the failure came from an HTTP response
    pub status: Option<u16>,
    /// Provider-supplied error message
    pub message: String,
    /// Underlying transport error, if any
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {}: {}", status, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl ProviderError {
    /// Create a provider error with a message only (no HTTP status).
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
            source: None,
        }
    }

    /// Create a provider error from an HTTP status and message.
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
            source: None,
        }
    }
}
