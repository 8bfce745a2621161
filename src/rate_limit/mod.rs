//! Sliding-window admission control.
//!
//! Embedding and generation APIs meter both requests per minute and tokens
//! per minute. This module tracks recent request and token-consumption
//! events in a trailing window and answers, before a new call is issued,
//! whether it would fit inside both budgets.
//!
//! Admission is a polling wait, not a queue: blocked callers re-check on a
//! fixed interval and no ordering is enforced between them. This is
//! intentionally simple and approximate; the invariant that matters is that
//! the window limits are re-checked before every new event.
//!
//! # Example
//!
//! ```rust
//! use quota_rotor::rate_limit::{RateWindow, RateWindowConfig};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let window = RateWindow::new(RateWindowConfig::default());
//!
//! // Block until a 1500-token call fits inside both budgets.
//! window.await_admission(1500).await;
//! // ... make the call ...
//! window.record(1500).await;
//! # }
//! ```

mod window;

pub use window::RateWindow;

use std::time::Duration;

/// Configuration for [`RateWindow`].
///
/// The defaults match a conservative free-tier posture: 5 requests and
/// 10 000 tokens per trailing 60 seconds, re-checked every second.
#[derive(Debug, Clone)]
pub struct RateWindowConfig {
    /// Width of the trailing window.
    pub window: Duration,
    /// Maximum request events inside the window.
    pub max_requests: u32,
    /// Maximum summed token cost inside the window.
    pub max_tokens: u64,
    /// How long a blocked waiter sleeps between admission checks.
    pub poll_interval: Duration,
}

impl Default for RateWindowConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            max_requests: 5,
            max_tokens: 10_000,
            poll_interval: Duration::from_secs(1),
        }
    }
}
