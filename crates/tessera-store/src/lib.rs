//! TTL-capable key-value store seam.
//!
//! Sessions, their secondary indices, and the role cache all live in an
//! external key-value store. This crate defines the operations the rest of
//! tessera relies on ([`KeyValueStore`]) and ships two backends:
//!
//! - [`MemoryStore`]: in-process, for tests and single-node development
//! - `RedisStore`: networked, behind the `redis` cargo feature
//!
//! Every operation is individually atomic. There are no cross-key
//! transactions.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use tessera_store::{KeyValueStore, MemoryStore};
//!
//! let store = MemoryStore::new();
//! store.set("token:abc", "{...}", Duration::from_secs(1800)).await?;
//! ```

mod error;
mod memory;
#[cfg(feature = "redis")]
mod redis_store;
mod store;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use redis_store::RedisStore;
pub use store::{KeyValueStore, SharedStore};
