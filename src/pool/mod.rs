//! Credential pool with circular rotation.
//!
//! Quota-bearing APIs meter usage per credential, so a small pool of
//! credentials stretches the effective budget: when one credential is
//! exhausted, operations rotate to the next and keep going. This module
//! provides the shared pool plus the [`Credential`] type it holds.
//!
//! # Example
//!
//! ```rust
//! use quota_rotor::pool::{Credential, CredentialPool};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), quota_rotor::RotorError> {
//! let pool = CredentialPool::new(Credential::parse_list("key-a,key-b,key-c"))?;
//! assert_eq!(pool.current_suffix(), "ey-a");
//!
//! let next = pool.rotate().await;
//! assert_eq!(next.suffix(), "ey-b");
//! # Ok(())
//! # }
//! ```

mod credential;
mod rotation;

pub use credential::Credential;
pub use rotation::{CredentialPool, DEFAULT_SETTLE_DELAY};
