//! # quota-rotor
//!
//! Credential rotation, sliding-window rate limiting, and quota-aware retry
//! for clients of rate-limited external APIs.
//!
//! Many ingestion or query operations can share a small pool of credentials
//! and a common rate budget: each call is admitted through a trailing-window
//! rate limiter, quota-exhaustion failures rotate the shared pool and back
//! off with escalating cool-downs, and after a bounded number of attempts a
//! distinct exhaustion error surfaces. Non-quota failures propagate
//! immediately.
//!
//! ## Features
//!
//! - Shared credential pool with atomic circular rotation and usage counters
//! - Request-per-minute and token-per-minute sliding-window admission control
//! - Bounded retry with per-round escalating cool-downs
//! - Pluggable quota classification over a typed provider error
//! - Cancellation tokens aborting every wait loop
//! - Secrets held in `secrecy` types; logs only see 4-character suffixes
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quota_rotor::{Credential, ProviderError, ResilientInvoker};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let invoker = ResilientInvoker::builder()
//!         .credentials(Credential::from_env("EMBEDDING_API_KEYS"))
//!         .build()?;
//!
//!     let result = invoker
//!         .execute("embed_query", 1500, |credential| async move {
//!             // Call the external API with `credential`; report failures
//!             // as ProviderError so they can be classified.
//!             Ok::<_, ProviderError>(format!("embedded with ...{}", credential.suffix()))
//!         })
//!         .await?;
//!     println!("{result}");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod http;
pub mod invoke;
pub mod pool;
pub mod rate_limit;

// Re-export commonly used types at crate root
pub use error::{ProviderError, RotorError};
pub use invoke::{MarkerClassifier, QuotaClassifier, ResilientInvoker, RetryConfig};
pub use pool::{Credential, CredentialPool};
pub use rate_limit::{RateWindow, RateWindowConfig};

/// Result type alias using RotorError
pub type Result<T> = std::result::Result<T, RotorError>;
