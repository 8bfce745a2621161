//! HTTP boundary helpers for callers hitting REST providers.
//!
//! The invoker is transport-agnostic: wrapped calls only need to report
//! failures as [`ProviderError`]. For the common case of an HTTP provider,
//! this module offers a preconfigured middleware client and conversions from
//! `reqwest` errors and responses into the typed boundary error.
//!
//! # Example
//!
//! ```rust,no_run
//! use quota_rotor::error::ProviderError;
//! use quota_rotor::http::build_http_client;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), ProviderError> {
//! let client = build_http_client(None, 0);
//! let response = client
//!     .get("https://example.com/v1/models")
//!     .send()
//!     .await
//!     .map_err(ProviderError::from)?;
//! if !response.status().is_success() {
//!     return Err(ProviderError::from_response(response).await);
//! }
//! # Ok(())
//! # }
//! ```

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use reqwest_tracing::TracingMiddleware;
use serde::Deserialize;

use crate::error::ProviderError;

/// Build an HTTP client with request tracing and transient-failure retries.
///
/// `max_retries` covers transport-level transients only (connection resets
/// and the like). Keep it low: quota handling belongs to
/// [`ResilientInvoker`](crate::invoke::ResilientInvoker), and a middleware
/// retry on 429 would fight the invoker's rotation logic. Pass 0 to let all
/// failures surface to the invoker.
pub fn build_http_client(user_agent: Option<String>, max_retries: u32) -> ClientWithMiddleware {
    let mut headers = HeaderMap::new();
    let user_agent = user_agent
        .unwrap_or_else(|| format!("quota-rotor/{}", env!("CARGO_PKG_VERSION")));
    let header_value = HeaderValue::from_str(&user_agent)
        .unwrap_or_else(|_| HeaderValue::from_static("quota-rotor"));
    headers.insert(USER_AGENT, header_value);

    let reqwest_client = reqwest::Client::builder()
        .default_headers(headers)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new());

    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(max_retries);

    ClientBuilder::new(reqwest_client)
        .with(TracingMiddleware::default())
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build()
}

/// Google-style error payload:
/// `{"error": {"code": 429, "status": "RESOURCE_EXHAUSTED", "message": "..."}}`
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    status: Option<String>,
    message: Option<String>,
}

/// Extract the provider's status/message from a JSON error body, if the body
/// is one.
fn extract_message(body: &str) -> Option<String> {
    let detail = serde_json::from_str::<ErrorBody>(body).ok()?.error?;
    match (detail.status, detail.message) {
        (Some(status), Some(message)) => Some(format!("{status}: {message}")),
        (Some(status), None) => Some(status),
        (None, Some(message)) => Some(message),
        (None, None) => None,
    }
}

impl ProviderError {
    /// Convert a non-success HTTP response.
    ///
    /// Preserves the status code and extracts the provider's error status
    /// and message when the body carries a Google-style JSON error; falls
    /// back to the raw body text otherwise.
    pub async fn from_response(response: reqwest::Response) -> ProviderError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = extract_message(&body).unwrap_or(body);
        ProviderError::with_status(status, message)
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        Self {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<reqwest_middleware::Error> for ProviderError {
    fn from(err: reqwest_middleware::Error) -> Self {
        match err {
            reqwest_middleware::Error::Reqwest(e) => e.into(),
            reqwest_middleware::Error::Middleware(e) => Self {
                status: None,
                message: e.to_string(),
                source: Some(e.into()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_message_full_google_body() {
        let body = r#"{"error": {"code": 429, "message": "Quota exceeded for metric", "status": "RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(
            extract_message(body).unwrap(),
            "RESOURCE_EXHAUSTED: Quota exceeded for metric"
        );
    }

    #[test]
    fn test_extract_message_status_only() {
        let body = r#"{"error": {"status": "RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(extract_message(body).unwrap(), "RESOURCE_EXHAUSTED");
    }

    #[test]
    fn test_extract_message_non_json_body() {
        assert!(extract_message("<html>Too Many Requests</html>").is_none());
        assert!(extract_message("").is_none());
    }

    #[test]
    fn test_extract_message_json_without_error_field() {
        assert!(extract_message(r#"{"ok": true}"#).is_none());
    }
}
