//! Common test utilities for session integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::TimeDelta;
use tessera_session::{
    IdentityRoleCache, Role, RoleAssignment, RoleCacheConfig, RoleSource, SessionConfig,
    SessionRecord, SessionService, TokenLifecycleManager,
};
use tessera_store::{KeyValueStore, MemoryStore, SharedStore, StoreError};

/// Role source backed by a fixed table, counting per-user lookups.
#[derive(Debug, Default)]
pub struct CountingSource {
    pub lookups: AtomicUsize,
}

impl CountingSource {
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

fn role(id: &str, code: &str) -> Role {
    Role {
        id: id.to_string(),
        name: code.to_lowercase(),
        code: code.to_string(),
        description: None,
    }
}

#[async_trait]
impl RoleSource for CountingSource {
    async fn roles_for_user(&self, user_id: &str) -> tessera_session::Result<Vec<Role>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(match user_id {
            "u1" => vec![role("r1", "ADMIN")],
            "u2" => vec![role("r2", "AUDITOR"), role("r3", "USER")],
            _ => vec![],
        })
    }

    async fn all_roles(&self) -> tessera_session::Result<Vec<Role>> {
        Ok(vec![
            role("r1", "ADMIN"),
            role("r2", "AUDITOR"),
            role("r3", "USER"),
        ])
    }

    async fn all_assignments(&self) -> tessera_session::Result<Vec<RoleAssignment>> {
        Ok(vec![
            RoleAssignment {
                user_id: "u1".into(),
                role_id: "r1".into(),
            },
            RoleAssignment {
                user_id: "u2".into(),
                role_id: "r2".into(),
            },
            RoleAssignment {
                user_id: "u2".into(),
                role_id: "r3".into(),
            },
        ])
    }
}

/// Everything a test needs, sharing one in-memory store.
pub struct Harness {
    pub store: MemoryStore,
    pub sessions: TokenLifecycleManager,
    pub roles: IdentityRoleCache,
    pub source: Arc<CountingSource>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    pub fn with_config(config: SessionConfig) -> Self {
        let store = MemoryStore::new();
        Self::over(store.clone(), Arc::new(store), config)
    }

    /// Build over an arbitrary store, keeping `inspect` for assertions.
    pub fn over(inspect: MemoryStore, shared: SharedStore, config: SessionConfig) -> Self {
        let source = Arc::new(CountingSource::default());
        Self {
            store: inspect,
            sessions: TokenLifecycleManager::new(shared.clone(), config),
            roles: IdentityRoleCache::new(shared, source.clone(), RoleCacheConfig::default()),
            source,
        }
    }

    pub fn service(&self) -> SessionService {
        SessionService::new(self.sessions.clone(), self.roles.clone())
    }

    /// Rewrite a stored record so its last refresh lies `ago` in the past.
    /// The store-level TTL is left untouched.
    pub async fn backdate(&self, token: &str, ago: Duration) -> Result<()> {
        let key = format!("token:{token}");
        let raw = self
            .store
            .get(&key)
            .await?
            .ok_or_else(|| anyhow::anyhow!("no record for {token}"))?;
        let mut record = SessionRecord::decode(&raw)?;
        record.last_refreshed_at -= TimeDelta::from_std(ago)?;
        self.store
            .set(&key, &record.encode()?, self.sessions.config().ttl)
            .await?;
        Ok(())
    }

    /// Every key whose value is `token`, across all string-valued keys.
    pub async fn keys_pointing_at(&self, token: &str) -> Result<Vec<String>> {
        let mut hits = Vec::new();
        for key in self.store.keys_by_prefix("").await? {
            if let Ok(Some(value)) = self.store.get(&key).await
                && value == token
            {
                hits.push(key);
            }
        }
        Ok(hits)
    }
}

/// Wraps a [`MemoryStore`] and fails every call touching a key that starts
/// with one of the poisoned prefixes.
#[derive(Debug, Clone)]
pub struct FlakyStore {
    inner: MemoryStore,
    poisoned: Vec<String>,
}

impl FlakyStore {
    pub fn new(inner: MemoryStore, poisoned: &[&str]) -> Self {
        Self {
            inner,
            poisoned: poisoned.iter().map(|p| p.to_string()).collect(),
        }
    }

    fn check(&self, key: &str) -> tessera_store::Result<()> {
        if self.poisoned.iter().any(|p| key.starts_with(p.as_str())) {
            return Err(StoreError::Connection(format!("injected failure on {key}")));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FlakyStore {
    async fn get(&self, key: &str) -> tessera_store::Result<Option<String>> {
        self.check(key)?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> tessera_store::Result<()> {
        self.check(key)?;
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, keys: &[&str]) -> tessera_store::Result<usize> {
        for key in keys {
            self.check(key)?;
        }
        self.inner.delete(keys).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> tessera_store::Result<bool> {
        self.check(key)?;
        self.inner.expire(key, ttl).await
    }

    async fn set_add(&self, key: &str, member: &str) -> tessera_store::Result<()> {
        self.check(key)?;
        self.inner.set_add(key, member).await
    }

    async fn set_remove(&self, key: &str, member: &str) -> tessera_store::Result<()> {
        self.check(key)?;
        self.inner.set_remove(key, member).await
    }

    async fn set_members(&self, key: &str) -> tessera_store::Result<Vec<String>> {
        self.check(key)?;
        self.inner.set_members(key).await
    }

    async fn keys_by_prefix(&self, prefix: &str) -> tessera_store::Result<Vec<String>> {
        self.check(prefix)?;
        self.inner.keys_by_prefix(prefix).await
    }
}
