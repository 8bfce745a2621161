//! The shared credential pool.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use tracing::warn;

use crate::error::RotorError;
use crate::pool::Credential;

/// Settling delay applied after each rotation so a freshly-rotated credential
/// is not hammered by a tight retry loop.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// An ordered pool of credentials shared by all in-flight operations.
///
/// Exactly one credential is current at any instant. [`rotate`] advances the
/// cursor circularly and the change is visible to every holder of the pool:
/// once one operation discovers an exhausted credential, the others move past
/// it without re-discovering the exhaustion themselves.
///
/// The cursor and usage counters are atomics, so `current` and `rotate` are
/// safe under N-way concurrent use. Concurrent rotations compound rather than
/// coalesce: two operations that both hit quota errors advance the cursor
/// twice.
///
/// [`rotate`]: CredentialPool::rotate
#[derive(Debug)]
pub struct CredentialPool {
    credentials: Vec<Credential>,
    cursor: AtomicUsize,
    usage: Vec<AtomicU64>,
    settle_delay: Duration,
}

impl CredentialPool {
    /// Create a pool with the default settling delay.
    ///
    /// Fails with [`RotorError::EmptyPool`] if the list is empty.
    pub fn new(credentials: Vec<Credential>) -> Result<Self, RotorError> {
        Self::with_settle_delay(credentials, DEFAULT_SETTLE_DELAY)
    }

    /// Create a pool with a custom settling delay.
    ///
    /// Fails with [`RotorError::EmptyPool`] if the list is empty.
    pub fn with_settle_delay(
        credentials: Vec<Credential>,
        settle_delay: Duration,
    ) -> Result<Self, RotorError> {
        if credentials.is_empty() {
            return Err(RotorError::EmptyPool);
        }
        let usage = credentials.iter().map(|_| AtomicU64::new(0)).collect();
        Ok(Self {
            credentials,
            cursor: AtomicUsize::new(0),
            usage,
            settle_delay,
        })
    }

    /// Number of credentials in the pool.
    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    /// Always false: construction rejects empty pools.
    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    fn index(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }

    /// Snapshot of the currently active credential.
    ///
    /// Concurrent rotations may change the current credential at any time,
    /// so callers must re-read this before each attempt rather than caching
    /// the result across attempts.
    pub fn current(&self) -> Credential {
        self.credentials[self.index()].clone()
    }

    /// Last four characters of the current credential, for logging.
    pub fn current_suffix(&self) -> String {
        self.credentials[self.index()].suffix()
    }

    /// Advance to the next credential circularly and wait out the settling
    /// delay. Returns the new current credential.
    pub async fn rotate(&self) -> Credential {
        let len = self.credentials.len();
        let mut old;
        loop {
            old = self.cursor.load(Ordering::SeqCst);
            let next = (old + 1) % len;
            if self
                .cursor
                .compare_exchange(old, next, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                break;
            }
            // Another operation rotated concurrently. Retry against the new cursor.
        }
        let new = (old + 1) % len;
        warn!(
            from = %self.credentials[old].suffix(),
            to = %self.credentials[new].suffix(),
            "switching credential"
        );
        tokio::time::sleep(self.settle_delay).await;
        self.credentials[new].clone()
    }

    /// Increment the usage counter of the current credential.
    ///
    /// Observability only: counts attempts made with a credential and has no
    /// effect on rotation or admission.
    pub fn record_usage(&self) {
        self.usage[self.index()].fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot of per-credential usage as (suffix, count) pairs, in pool
    /// order.
    pub fn usage_counts(&self) -> Vec<(String, u64)> {
        self.credentials
            .iter()
            .zip(&self.usage)
            .map(|(credential, count)| (credential.suffix(), count.load(Ordering::Relaxed)))
            .collect()
    }
}
