//! In-process key-value store with per-key expiry.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::trace;

use crate::error::{Result, StoreError};
use crate::store::KeyValueStore;

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Set(BTreeSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    /// `None` means the key never expires.
    /// `None` when the TTL reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// In-memory store with TTL support.
///
/// Expired keys are invisible to every read and are dropped lazily, on the
/// next write to the same key or on a prefix scan. Cloning shares the
/// underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.read().await;
        entries.values().filter(|e| !e.is_expired(now)).count()
    }

    /// Check if the store holds no live keys.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Remaining time-to-live of a key. `None` if the key is absent or has
    /// no expiry.
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|e| !e.is_expired(now))
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(now))
    }

    /// The entry at `key`, unless it has expired.
    fn live<'a>(entries: &'a HashMap<String, Entry>, key: &str, now: Instant) -> Option<&'a Entry> {
        entries.get(key).filter(|e| !e.is_expired(now))
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read().await;
        match Self::live(&entries, key, Instant::now()) {
            None => Ok(None),
            Some(Entry {
                value: Value::Str(s),
                ..
            }) => Ok(Some(s.clone())),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: Instant::now().checked_add(ttl),
            },
        );
        trace!(key = %key, ttl_ms = ttl.as_millis() as u64, "set");
        Ok(())
    }

    async fn delete(&self, keys: &[&str]) -> Result<usize> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let mut removed = 0;
        for key in keys {
            if let Some(entry) = entries.remove(*key)
                && !entry.is_expired(now)
            {
                removed += 1;
            }
        }
        trace!(requested = keys.len(), removed, "delete");
        Ok(removed)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        match entries.get(key).map(|e| e.is_expired(now)) {
            None => Ok(false),
            Some(true) => {
                entries.remove(key);
                Ok(false)
            }
            Some(false) => {
                if let Some(entry) = entries.get_mut(key) {
                    entry.expires_at = now.checked_add(ttl);
                }
                Ok(true)
            }
        }
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<()> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|e| e.is_expired(now)) {
            entries.remove(key);
        }
        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::Set(BTreeSet::new()),
            expires_at: None,
        });
        match &mut entry.value {
            Value::Set(members) => {
                members.insert(member.to_string());
                Ok(())
            }
            Value::Str(_) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<()> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let emptied = match entries.get_mut(key) {
            None => return Ok(()),
            Some(entry) if entry.is_expired(now) => true,
            Some(Entry {
                value: Value::Set(members),
                ..
            }) => {
                members.remove(member);
                members.is_empty()
            }
            Some(_) => return Err(StoreError::WrongType(key.to_string())),
        };
        // An emptied set disappears, as it does in Redis.
        if emptied {
            entries.remove(key);
        }
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        let entries = self.entries.read().await;
        match Self::live(&entries, key, Instant::now()) {
            None => Ok(Vec::new()),
            Some(Entry {
                value: Value::Set(members),
                ..
            }) => Ok(members.iter().cloned().collect()),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn keys_by_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, e| !e.is_expired(now));
        let mut keys: Vec<String> = entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    const MINUTE: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_set_and_get() {
        let store = MemoryStore::new();
        store.set("token:a", "value", MINUTE).await.unwrap();

        assert_eq!(store.get("token:a").await.unwrap().as_deref(), Some("value"));
        assert_eq!(store.get("token:b").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_replaces_value_and_ttl() {
        let store = MemoryStore::new();
        store.set("k", "one", Duration::from_millis(20)).await.unwrap();
        store.set("k", "two", MINUTE).await.unwrap();

        sleep(Duration::from_millis(40)).await;

        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("two"));
    }

    #[tokio::test]
    async fn test_expiration() {
        let store = MemoryStore::new();
        store.set("k", "v", Duration::from_millis(20)).await.unwrap();

        sleep(Duration::from_millis(50)).await;

        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_unrepresentable_ttl_never_expires() {
        let store = MemoryStore::new();
        store.set("k", "v", Duration::MAX).await.unwrap();
        store.set_add("s", "m").await.unwrap();

        assert!(store.expire("s", Duration::MAX).await.unwrap());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(store.set_members("s").await.unwrap(), vec!["m"]);
    }

    #[tokio::test]
    async fn test_expire_extends_live_key_only() {
        let store = MemoryStore::new();
        store.set("k", "v", Duration::from_millis(30)).await.unwrap();

        assert!(store.expire("k", MINUTE).await.unwrap());
        assert!(!store.expire("missing", MINUTE).await.unwrap());

        sleep(Duration::from_millis(60)).await;
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        assert!(store.ttl("k").await.unwrap() > Duration::from_secs(50));
    }

    #[tokio::test]
    async fn test_delete_counts_existing_keys() {
        let store = MemoryStore::new();
        store.set("a", "1", MINUTE).await.unwrap();
        store.set("b", "2", MINUTE).await.unwrap();

        assert_eq!(store.delete(&["a", "b", "c"]).await.unwrap(), 2);
        assert_eq!(store.delete(&["a"]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_set_membership() {
        let store = MemoryStore::new();
        store.set_add("ip_users:1.2.3.4", "u2").await.unwrap();
        store.set_add("ip_users:1.2.3.4", "u1").await.unwrap();
        store.set_add("ip_users:1.2.3.4", "u1").await.unwrap();

        assert_eq!(
            store.set_members("ip_users:1.2.3.4").await.unwrap(),
            vec!["u1".to_string(), "u2".to_string()]
        );
        // Sets have no expiry until one is attached.
        assert_eq!(store.ttl("ip_users:1.2.3.4").await, None);

        store.set_remove("ip_users:1.2.3.4", "u1").await.unwrap();
        store.set_remove("ip_users:1.2.3.4", "u2").await.unwrap();
        assert!(store.set_members("ip_users:1.2.3.4").await.unwrap().is_empty());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_wrong_type() {
        let store = MemoryStore::new();
        store.set("k", "v", MINUTE).await.unwrap();
        store.set_add("s", "m").await.unwrap();

        assert!(matches!(
            store.set_add("k", "m").await,
            Err(StoreError::WrongType(_))
        ));
        assert!(matches!(store.get("s").await, Err(StoreError::WrongType(_))));
    }

    #[tokio::test]
    async fn test_keys_by_prefix_skips_expired() {
        let store = MemoryStore::new();
        store.set("browser_token:b1", "t1", MINUTE).await.unwrap();
        store
            .set("browser_token:b2", "t2", Duration::from_millis(10))
            .await
            .unwrap();
        store.set("token:t1", "{}", MINUTE).await.unwrap();

        sleep(Duration::from_millis(30)).await;

        assert_eq!(
            store.keys_by_prefix("browser_token:").await.unwrap(),
            vec!["browser_token:b1".to_string()]
        );
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = MemoryStore::new();
        let other = store.clone();
        store.set("k", "v", MINUTE).await.unwrap();

        assert_eq!(other.get("k").await.unwrap().as_deref(), Some("v"));
    }
}
