//! The key-value store trait.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// Operations tessera needs from its backing store.
///
/// String values carry a TTL. Set values (used for the per-address
/// membership sets) are created on first add without a TTL; callers
/// attach one with [`expire`](KeyValueStore::expire).
#[async_trait]
pub trait KeyValueStore: Send + Sync + std::fmt::Debug {
    /// Read a string value. `Ok(None)` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a string value with a time-to-live, replacing any previous value.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Delete keys. Returns how many existed.
    async fn delete(&self, keys: &[&str]) -> Result<usize>;

    /// Reset the time-to-live of an existing key. Returns `false` if the key
    /// does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Add a member to the set stored at `key`.
    async fn set_add(&self, key: &str, member: &str) -> Result<()>;

    /// Remove a member from the set stored at `key`.
    async fn set_remove(&self, key: &str, member: &str) -> Result<()>;

    /// All members of the set stored at `key` (empty if absent).
    async fn set_members(&self, key: &str) -> Result<Vec<String>>;

    /// Every live key starting with `prefix`.
    async fn keys_by_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Shared store handle for use across async contexts.
pub type SharedStore = Arc<dyn KeyValueStore>;
