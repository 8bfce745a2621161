//! Quota-exhaustion classification.

use crate::error::ProviderError;

/// Decides whether a provider error means quota or rate exhaustion.
///
/// Quota-classified failures are retried by the invoker with rotation and
/// backoff; everything else is fatal and propagated on first occurrence.
/// Providers signal exhaustion differently, so the classifier is pluggable.
pub trait QuotaClassifier: Send + Sync {
    /// True when the error signals quota or rate exhaustion.
    fn is_quota_exhausted(&self, error: &ProviderError) -> bool;
}

/// Classifier matching an HTTP status set and textual markers.
///
/// The defaults recognize HTTP 429 plus the markers common to Google-style
/// APIs (`ResourceExhausted`, `RESOURCE_EXHAUSTED`) and generic rate-limit
/// phrasing. Markers are case-sensitive substring matches against the
/// provider message.
#[derive(Debug, Clone)]
pub struct MarkerClassifier {
    status_codes: Vec<u16>,
    markers: Vec<String>,
}

impl MarkerClassifier {
    /// Create a classifier with an explicit status and marker set.
    pub fn new(
        status_codes: impl IntoIterator<Item = u16>,
        markers: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            status_codes: status_codes.into_iter().collect(),
            markers: markers.into_iter().map(Into::into).collect(),
        }
    }

    /// Add a status code to the match set.
    pub fn with_status_code(mut self, status: u16) -> Self {
        self.status_codes.push(status);
        self
    }

    /// Add a textual marker to the match set.
    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.markers.push(marker.into());
        self
    }
}

impl Default for MarkerClassifier {
    fn default() -> Self {
        Self::new(
            [429],
            [
                "ResourceExhausted",
                "RESOURCE_EXHAUSTED",
                "Too Many Requests",
                "rate limit",
                "429",
            ],
        )
    }
}

impl QuotaClassifier for MarkerClassifier {
    fn is_quota_exhausted(&self, error: &ProviderError) -> bool {
        if error
            .status
            .is_some_and(|status| self.status_codes.contains(&status))
        {
            return true;
        }
        self.markers
            .iter()
            .any(|marker| error.message.contains(marker))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_status_429() {
        let classifier = MarkerClassifier::default();
        let error = ProviderError::with_status(429, "slow down");
        assert!(classifier.is_quota_exhausted(&error));
    }

    #[test]
    fn test_matches_resource_exhausted_marker() {
        let classifier = MarkerClassifier::default();
        let error = ProviderError::new("RESOURCE_EXHAUSTED: Quota exceeded for metric");
        assert!(classifier.is_quota_exhausted(&error));
    }

    #[test]
    fn test_ignores_unrelated_errors() {
        let classifier = MarkerClassifier::default();
        assert!(!classifier.is_quota_exhausted(&ProviderError::new("connection refused")));
        assert!(!classifier.is_quota_exhausted(&ProviderError::with_status(
            403,
            "PERMISSION_DENIED: key not valid"
        )));
    }

    #[test]
    fn test_custom_markers_extend_the_match() {
        let classifier = MarkerClassifier::default()
            .with_status_code(503)
            .with_marker("overloaded");
        assert!(classifier.is_quota_exhausted(&ProviderError::with_status(503, "busy")));
        assert!(classifier.is_quota_exhausted(&ProviderError::new("model overloaded")));
    }
}
