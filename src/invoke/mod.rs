//! Quota-aware invocation of external calls.
//!
//! [`ResilientInvoker`] is the retry/rotation state machine around a single
//! logical external call: admission through the shared rate window, the call
//! itself, quota classification of any failure, credential rotation with
//! settling delay, escalating cool-downs between rounds, and a bounded
//! attempt budget.
//!
//! ```text
//! Admitting -> Calling -> Success
//!                      -> QuotaError -> Rotating -> Cooling -> Admitting
//!                      -> OtherError -> Failed
//!           (attempts exhausted)     -> Failed
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use quota_rotor::invoke::ResilientInvoker;
//! use quota_rotor::pool::Credential;
//! use quota_rotor::error::ProviderError;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), quota_rotor::RotorError> {
//! let invoker = ResilientInvoker::builder()
//!     .credentials(Credential::from_env("EMBEDDING_API_KEYS"))
//!     .on_rotate(|credential| {
//!         // Rebuild any client object bound to the old credential.
//!         println!("now using ...{}", credential.suffix());
//!     })
//!     .build()?;
//!
//! let embedding = invoker
//!     .execute("embed_query", 1500, |credential| async move {
//!         // Call the external API with `credential` and map failures
//!         // to ProviderError.
//!         let _key = credential.expose_secret();
//!         Ok::<_, ProviderError>(vec![0.0f32; 768])
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod classify;
mod invoker;

pub use classify::{MarkerClassifier, QuotaClassifier};
pub use invoker::{ResilientInvoker, ResilientInvokerBuilder};

use std::time::Duration;

use crate::pool::Credential;

/// Callback invoked after every rotation with the new current credential.
pub type RotationHook = dyn Fn(&Credential) + Send + Sync;

/// Retry and backoff parameters for [`ResilientInvoker`].
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Attempt budget per invocation = pool size x this multiplier.
    ///
    /// With a single-credential pool this still allows `round_multiplier`
    /// retries against that credential, which covers transient failures that
    /// are not tied to a specific credential.
    pub round_multiplier: u32,
    /// Cool-down applied after each full unsuccessful round through the
    /// pool, multiplied by the number of rounds completed.
    pub base_cooldown: Duration,
    /// Delay between attempts within a round.
    pub attempt_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            round_multiplier: 3,
            base_cooldown: Duration::from_secs(20),
            attempt_delay: Duration::from_secs(2),
        }
    }
}
