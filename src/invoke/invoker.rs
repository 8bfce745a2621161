//! The retry/rotation state machine.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::error::{ProviderError, RotorError};
use crate::invoke::{QuotaClassifier, RetryConfig, RotationHook};
use crate::pool::{Credential, CredentialPool};
use crate::rate_limit::{RateWindow, RateWindowConfig};

/// Wraps a single logical external call with admission control, quota-error
/// detection, credential rotation and escalating backoff.
///
/// Each [`execute`] call makes at most `pool size x round multiplier`
/// attempts. Quota-classified failures rotate the shared credential pool and
/// retry; any other failure propagates immediately. Pool and window are
/// shared: rotations triggered by one in-flight operation are visible to all
/// others, and every operation draws on the same rate budget.
///
/// Multiple invokers can share one pool and window through the builder, e.g.
/// an ingestion invoker with a generous retry budget next to a query invoker
/// with a small one.
///
/// [`execute`]: ResilientInvoker::execute
pub struct ResilientInvoker {
    pool: Arc<CredentialPool>,
    window: Arc<RateWindow>,
    retry: RetryConfig,
    classifier: Arc<dyn QuotaClassifier>,
    on_rotate: Option<Arc<RotationHook>>,
    cancel: CancellationToken,
}

impl ResilientInvoker {
    /// Create an invoker builder.
    pub fn builder() -> ResilientInvokerBuilder {
        ResilientInvokerBuilder::new()
    }

    /// The shared credential pool.
    pub fn pool(&self) -> &Arc<CredentialPool> {
        &self.pool
    }

    /// The shared rate window.
    pub fn window(&self) -> &Arc<RateWindow> {
        &self.window
    }

    /// Last four characters of the currently active credential, for logging.
    pub fn current_credential_suffix(&self) -> String {
        self.pool.current_suffix()
    }

    /// Execute an external call with admission control and quota-aware retry.
    ///
    /// `operation` names the call in logs and errors. `cost_hint` is the
    /// estimated token cost used for admission and bookkeeping; pass 0 when
    /// the cost cannot be estimated to get requests-only limiting. `op`
    /// receives the freshly-read current credential on every attempt and
    /// must report failures as [`ProviderError`] so they can be classified.
    ///
    /// Exactly one terminal outcome per call:
    /// - `Ok` with the result of the first successful attempt;
    /// - [`RotorError::Fatal`] on the first non-quota failure, immediately,
    ///   with no rotation;
    /// - [`RotorError::QuotaExhausted`] once the attempt budget is spent;
    /// - [`RotorError::Cancelled`] if the cancellation token fires during
    ///   any wait.
    pub async fn execute<T, F, Fut>(
        &self,
        operation: &str,
        cost_hint: u64,
        mut op: F,
    ) -> Result<T, RotorError>
    where
        F: FnMut(Credential) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let pool_size = self.pool.len() as u32;
        let max_attempts = pool_size * self.retry.round_multiplier;
        let mut attempt: u32 = 0;

        while attempt < max_attempts {
            self.wait(operation, self.window.await_admission(cost_hint))
                .await?;

            // Re-read on every attempt: a concurrent operation may have
            // rotated the pool while this one was blocked in admission.
            let credential = self.pool.current();
            self.pool.record_usage();

            match op(credential).await {
                Ok(result) => {
                    self.window.record(cost_hint).await;
                    return Ok(result);
                }
                Err(cause) if self.classifier.is_quota_exhausted(&cause) => {
                    attempt += 1;
                    warn!(
                        operation,
                        attempt,
                        max_attempts,
                        cause = %cause,
                        "quota exhausted, rotating credential"
                    );

                    let fresh = self.wait(operation, self.pool.rotate()).await?;
                    if let Some(hook) = &self.on_rotate {
                        hook(&fresh);
                    }

                    let delay = if attempt % pool_size == 0 {
                        // A full round through the pool failed; escalate.
                        let rounds = attempt / pool_size;
                        warn!(
                            operation,
                            rounds,
                            cooldown_secs = (self.retry.base_cooldown * rounds).as_secs(),
                            "all credentials hit limits, cooling down"
                        );
                        self.retry.base_cooldown * rounds
                    } else {
                        self.retry.attempt_delay
                    };
                    self.wait(operation, tokio::time::sleep(delay)).await?;
                }
                Err(cause) => {
                    return Err(RotorError::Fatal {
                        operation: operation.to_string(),
                        source: cause,
                    });
                }
            }
        }

        error!(
            operation,
            attempts = attempt,
            credentials = self.pool.len(),
            "persistent quota exhaustion"
        );
        Err(RotorError::QuotaExhausted {
            operation: operation.to_string(),
            attempts: attempt,
            credentials: self.pool.len(),
        })
    }

    /// Run a wait-like future, aborting with `Cancelled` if the cancellation
    /// token fires first.
    async fn wait<O>(
        &self,
        operation: &str,
        fut: impl Future<Output = O>,
    ) -> Result<O, RotorError> {
        tokio::select! {
            out = fut => Ok(out),
            _ = self.cancel.cancelled() => Err(RotorError::Cancelled {
                operation: operation.to_string(),
            }),
        }
    }
}

impl std::fmt::Debug for ResilientInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientInvoker")
            .field("pool_size", &self.pool.len())
            .field("retry", &self.retry)
            .finish()
    }
}

/// Builder for [`ResilientInvoker`].
pub struct ResilientInvokerBuilder {
    credentials: Vec<Credential>,
    pool: Option<Arc<CredentialPool>>,
    settle_delay: Option<std::time::Duration>,
    window: Option<Arc<RateWindow>>,
    window_config: RateWindowConfig,
    retry: RetryConfig,
    classifier: Option<Arc<dyn QuotaClassifier>>,
    on_rotate: Option<Arc<RotationHook>>,
    cancel: Option<CancellationToken>,
}

impl ResilientInvokerBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            credentials: Vec::new(),
            pool: None,
            settle_delay: None,
            window: None,
            window_config: RateWindowConfig::default(),
            retry: RetryConfig::default(),
            classifier: None,
            on_rotate: None,
            cancel: None,
        }
    }

    /// Supply the credential list for a new pool.
    ///
    /// Ignored when [`pool`](Self::pool) provides a prebuilt pool.
    pub fn credentials(mut self, credentials: impl IntoIterator<Item = Credential>) -> Self {
        self.credentials = credentials.into_iter().collect();
        self
    }

    /// Share a prebuilt credential pool with other invokers.
    pub fn pool(mut self, pool: Arc<CredentialPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Override the rotation settling delay for a pool built from
    /// [`credentials`](Self::credentials).
    pub fn settle_delay(mut self, delay: std::time::Duration) -> Self {
        self.settle_delay = Some(delay);
        self
    }

    /// Configure the rate window limits.
    ///
    /// Ignored when [`window`](Self::window) provides a shared window.
    pub fn rate_limits(mut self, config: RateWindowConfig) -> Self {
        self.window_config = config;
        self
    }

    /// Share a prebuilt rate window with other invokers.
    pub fn window(mut self, window: Arc<RateWindow>) -> Self {
        self.window = Some(window);
        self
    }

    /// Configure retry and backoff parameters.
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set a custom quota classifier.
    pub fn classifier(mut self, classifier: Arc<dyn QuotaClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Set a hook invoked after every rotation with the new current
    /// credential, so client objects bound to the old credential can be
    /// rebuilt.
    pub fn on_rotate<H>(mut self, hook: H) -> Self
    where
        H: Fn(&Credential) + Send + Sync + 'static,
    {
        self.on_rotate = Some(Arc::new(hook));
        self
    }

    /// Set a cancellation token that aborts admission waits, settling delays
    /// and cool-downs.
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Build the invoker.
    ///
    /// Fails with [`RotorError::EmptyPool`] when no pool was shared and the
    /// credential list is empty.
    pub fn build(self) -> Result<ResilientInvoker, RotorError> {
        let pool = match self.pool {
            Some(pool) => pool,
            None => {
                let pool = match self.settle_delay {
                    Some(delay) => CredentialPool::with_settle_delay(self.credentials, delay)?,
                    None => CredentialPool::new(self.credentials)?,
                };
                Arc::new(pool)
            }
        };

        let window = self
            .window
            .unwrap_or_else(|| Arc::new(RateWindow::new(self.window_config)));

        Ok(ResilientInvoker {
            pool,
            window,
            retry: self.retry,
            classifier: self
                .classifier
                .unwrap_or_else(|| Arc::new(crate::invoke::MarkerClassifier::default())),
            on_rotate: self.on_rotate,
            cancel: self.cancel.unwrap_or_default(),
        })
    }
}

impl Default for ResilientInvokerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn quota_error() -> ProviderError {
        ProviderError::with_status(429, "RESOURCE_EXHAUSTED: Quota exceeded")
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            round_multiplier: 3,
            base_cooldown: Duration::from_secs(20),
            attempt_delay: Duration::from_secs(2),
        }
    }

    fn builder(keys: &[&str]) -> ResilientInvokerBuilder {
        ResilientInvoker::builder()
            .credentials(keys.iter().map(|k| Credential::new(*k)))
            .settle_delay(Duration::ZERO)
            .rate_limits(RateWindowConfig {
                max_requests: 1000,
                max_tokens: 1_000_000,
                ..RateWindowConfig::default()
            })
            .retry(fast_retry())
    }

    #[test]
    fn test_build_rejects_empty_credentials() {
        let result = ResilientInvoker::builder().build();
        assert!(matches!(result, Err(RotorError::EmptyPool)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_records_and_terminates() {
        let invoker = builder(&["key-a"]).build().unwrap();

        let result = invoker
            .execute("embed_query", 250, |credential| async move {
                assert_eq!(credential.expose_secret(), "key-a");
                Ok::<_, ProviderError>(42)
            })
            .await
            .unwrap();

        assert_eq!(result, 42);
        assert_eq!(invoker.window().requests_in_window().await, 1);
        assert_eq!(invoker.window().tokens_in_window().await, 250);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_retries_then_exhaustion() {
        let invoker = builder(&["key-a", "key-b"]).build().unwrap();
        let calls = AtomicU32::new(0);

        let result = invoker
            .execute("add_documents", 0, |_credential| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(quota_error()) }
            })
            .await;

        // pool size 2 x multiplier 3 = 6 attempts, then the distinct error.
        assert_eq!(calls.load(Ordering::SeqCst), 6);
        match result {
            Err(RotorError::QuotaExhausted {
                operation,
                attempts,
                credentials,
            }) => {
                assert_eq!(operation, "add_documents");
                assert_eq!(attempts, 6);
                assert_eq!(credentials, 2);
            }
            other => panic!("expected QuotaExhausted, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_short_circuits() {
        let calls = AtomicU32::new(0);
        let rotations = Arc::new(AtomicU32::new(0));
        let seen = rotations.clone();
        let invoker = builder(&["key-a", "key-b"])
            .on_rotate(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();

        let result = invoker
            .execute("embed_query", 0, |_credential| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(ProviderError::with_status(400, "INVALID_ARGUMENT")) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(rotations.load(Ordering::SeqCst), 0);
        assert_eq!(invoker.current_credential_suffix(), "ey-a");
        assert!(matches!(result, Err(RotorError::Fatal { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_failures_then_success_lands_back_on_first_key() {
        let rotations = Arc::new(AtomicU32::new(0));
        let seen = rotations.clone();
        let invoker = builder(&["key-a", "key-b", "key-c"])
            .on_rotate(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();
        let calls = AtomicU32::new(0);

        let result = invoker
            .execute("add_documents", 0, |credential| {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if call < 3 {
                        Err(quota_error())
                    } else {
                        Ok(credential.suffix())
                    }
                }
            })
            .await
            .unwrap();

        // Attempts 1-3 consume a, b, c; attempt 4 succeeds back on a.
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(rotations.load(Ordering::SeqCst), 3);
        assert_eq!(result, "ey-a");
        assert_eq!(invoker.current_credential_suffix(), "ey-a");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_escalates_per_round() {
        let invoker = builder(&["key-a", "key-b"])
            .retry(RetryConfig {
                round_multiplier: 2,
                base_cooldown: Duration::from_secs(20),
                attempt_delay: Duration::from_secs(2),
            })
            .build()
            .unwrap();

        let start = tokio::time::Instant::now();
        let result = invoker
            .execute("add_documents", 0, |_credential| async {
                Err::<(), _>(quota_error())
            })
            .await;
        assert!(matches!(result, Err(RotorError::QuotaExhausted { .. })));

        // 4 attempts: 2s after attempt 1, 20s x 1 after round one,
        // 2s after attempt 3, 20s x 2 after round two. Settle delay is zero.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(64), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(65), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_aborts_blocked_admission() {
        let token = CancellationToken::new();
        let invoker = builder(&["key-a"])
            .rate_limits(RateWindowConfig {
                max_requests: 1,
                ..RateWindowConfig::default()
            })
            .cancellation_token(token.clone())
            .build()
            .unwrap();

        // Saturate the window so execute blocks in admission.
        invoker.window().record(0).await;
        token.cancel();

        let result = invoker
            .execute("embed_query", 0, |_credential| async {
                Ok::<_, ProviderError>(())
            })
            .await;
        assert!(matches!(result, Err(RotorError::Cancelled { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_pool_rotation_visible_across_invokers() {
        let pool = Arc::new(
            CredentialPool::with_settle_delay(
                vec![Credential::new("key-a"), Credential::new("key-b")],
                Duration::ZERO,
            )
            .unwrap(),
        );
        let window = Arc::new(RateWindow::new(RateWindowConfig::default()));

        let ingest = ResilientInvoker::builder()
            .pool(pool.clone())
            .window(window.clone())
            .retry(fast_retry())
            .build()
            .unwrap();
        let query = ResilientInvoker::builder()
            .pool(pool.clone())
            .window(window)
            .retry(RetryConfig {
                round_multiplier: 2,
                ..fast_retry()
            })
            .build()
            .unwrap();

        pool.rotate().await;
        assert_eq!(ingest.current_credential_suffix(), "ey-b");
        assert_eq!(query.current_credential_suffix(), "ey-b");
    }
}
