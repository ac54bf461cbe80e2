//! Stateful leaves of the credential lifecycle
//!
//! Two capability traits decouple the credential engine from storage:
//! - `IdentityStore` answers "is this identity allowed to receive credentials?"
//! - `RevocationStore` records and answers "has this exact token been revoked?"
//!
//! Both use `Pin<Box<dyn Future>>` return types so the engine can hold them as
//! `Arc<dyn IdentityStore>` / `Arc<dyn RevocationStore>` and swap backends
//! (in-memory for tests, JSON file for single-node deployments) without
//! touching verification logic.

pub mod error;
pub mod identity;
pub mod revocation;

pub use error::{Error, Result};
pub use identity::{IdentityStore, MemoryIdentityStore, TrustedIdentity};
pub use revocation::{FileRevocationStore, MemoryRevocationStore, RevocationStore};

use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;
