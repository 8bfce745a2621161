//! The sliding rate window.

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::rate_limit::RateWindowConfig;

#[derive(Debug, Default)]
struct WindowState {
    /// One timestamp per admitted request.
    requests: Vec<Instant>,
    /// Timestamp plus token cost for each admitted request with cost > 0.
    tokens: Vec<(Instant, u64)>,
}

/// Tracks recent request and token events in a trailing window and gates new
/// work on both the request-count and token-cost budgets.
///
/// Shared process-wide behind an `Arc`; all state sits behind a single async
/// mutex. Expired events are purged lazily, on each admission check and each
/// record.
#[derive(Debug)]
pub struct RateWindow {
    config: RateWindowConfig,
    state: Mutex<WindowState>,
}

impl RateWindow {
    /// Create a rate window with the given limits.
    pub fn new(config: RateWindowConfig) -> Self {
        Self {
            config,
            state: Mutex::new(WindowState::default()),
        }
    }

    /// The configured limits.
    pub fn config(&self) -> &RateWindowConfig {
        &self.config
    }

    /// Check whether an operation of the given token cost is admissible now.
    ///
    /// Purges expired events, then checks both invariants including the
    /// prospective event. Does not record anything and does not block.
    pub async fn admit(&self, cost: u64) -> bool {
        let mut state = self.state.lock().await;
        self.purge(&mut state);
        self.admissible(&state, cost)
    }

    /// Block until an operation of the given token cost is admissible.
    ///
    /// Re-checks on the configured poll interval. There is no fairness
    /// between concurrently blocked waiters; all of them re-check on the
    /// same interval and whichever acquires the lock first after capacity
    /// frees up proceeds first.
    pub async fn await_admission(&self, cost: u64) {
        loop {
            {
                let mut state = self.state.lock().await;
                self.purge(&mut state);
                if self.admissible(&state, cost) {
                    return;
                }
                debug!(
                    cost,
                    requests = state.requests.len(),
                    max_requests = self.config.max_requests,
                    "rate window saturated, waiting"
                );
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Record a completed request of the given token cost.
    ///
    /// Always appends one request event; appends a token event only when the
    /// cost is non-zero, so cost-free callers get requests-only limiting.
    pub async fn record(&self, cost: u64) {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        self.purge(&mut state);
        state.requests.push(now);
        if cost > 0 {
            state.tokens.push((now, cost));
        }
    }

    /// Number of non-expired request events.
    pub async fn requests_in_window(&self) -> usize {
        let mut state = self.state.lock().await;
        self.purge(&mut state);
        state.requests.len()
    }

    /// Sum of non-expired token costs.
    pub async fn tokens_in_window(&self) -> u64 {
        let mut state = self.state.lock().await;
        self.purge(&mut state);
        state.tokens.iter().map(|(_, cost)| cost).sum()
    }

    fn purge(&self, state: &mut WindowState) {
        let window = self.config.window;
        state.requests.retain(|ts| ts.elapsed() < window);
        state.tokens.retain(|(ts, _)| ts.elapsed() < window);
    }

    fn admissible(&self, state: &WindowState, cost: u64) -> bool {
        let token_sum: u64 = state.tokens.iter().map(|(_, cost)| cost).sum();
        (state.requests.len() as u32) < self.config.max_requests
            && token_sum + cost <= self.config.max_tokens
    }
}
