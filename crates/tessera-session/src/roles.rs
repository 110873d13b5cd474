//! Identity role cache.
//!
//! Role assignments live in an authoritative [`RoleSource`]; this cache
//! keeps each user's role codes and the full role catalog in the key-value
//! store, read cache-aside. Mutations of roles or assignments invalidate
//! coarsely rather than patching entries.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tessera_store::SharedStore;
use tracing::{debug, info, warn};

use crate::config::RoleCacheConfig;
use crate::error::{Result, SessionError};
use crate::keys::KeyLayout;

/// A role in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub name: String,
    /// Stable code carried in session claims (e.g. `ADMIN`).
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One user-to-role assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub user_id: String,
    pub role_id: String,
}

/// Authoritative source of roles and assignments.
#[async_trait]
pub trait RoleSource: Send + Sync + std::fmt::Debug {
    /// Roles currently assigned to a user.
    async fn roles_for_user(&self, user_id: &str) -> Result<Vec<Role>>;

    /// The full role catalog.
    async fn all_roles(&self) -> Result<Vec<Role>>;

    /// Every user-to-role assignment.
    async fn all_assignments(&self) -> Result<Vec<RoleAssignment>>;
}

/// Role source for deployments without one. Every lookup fails, so only
/// already-cached entries can be served.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRoleSource;

#[async_trait]
impl RoleSource for NoRoleSource {
    async fn roles_for_user(&self, _user_id: &str) -> Result<Vec<Role>> {
        Err(SessionError::RoleSource("no role source configured".into()))
    }

    async fn all_roles(&self) -> Result<Vec<Role>> {
        Err(SessionError::RoleSource("no role source configured".into()))
    }

    async fn all_assignments(&self) -> Result<Vec<RoleAssignment>> {
        Err(SessionError::RoleSource("no role source configured".into()))
    }
}

/// Fixed catalog and assignments, typically loaded from a JSON document:
///
/// ```json
/// {
///   "roles": [{ "id": "r1", "name": "Administrator", "code": "ADMIN" }],
///   "assignments": [{ "user_id": "u1", "role_id": "r1" }]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticRoleSource {
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub assignments: Vec<RoleAssignment>,
}

impl StaticRoleSource {
    pub fn new(roles: Vec<Role>, assignments: Vec<RoleAssignment>) -> Self {
        Self { roles, assignments }
    }

    /// Parse a JSON role document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[async_trait]
impl RoleSource for StaticRoleSource {
    async fn roles_for_user(&self, user_id: &str) -> Result<Vec<Role>> {
        Ok(self
            .assignments
            .iter()
            .filter(|a| a.user_id == user_id)
            .filter_map(|a| self.roles.iter().find(|r| r.id == a.role_id))
            .cloned()
            .collect())
    }

    async fn all_roles(&self) -> Result<Vec<Role>> {
        Ok(self.roles.clone())
    }

    async fn all_assignments(&self) -> Result<Vec<RoleAssignment>> {
        Ok(self.assignments.clone())
    }
}

/// Cache of per-user role codes and the role catalog.
///
/// An empty role list is cached as such; only a missing entry counts as a
/// miss. Store failures on the cache side degrade to reading the source.
#[derive(Debug, Clone)]
pub struct IdentityRoleCache {
    store: SharedStore,
    source: Arc<dyn RoleSource>,
    keys: KeyLayout,
    config: RoleCacheConfig,
}

impl IdentityRoleCache {
    pub fn new(store: SharedStore, source: Arc<dyn RoleSource>, config: RoleCacheConfig) -> Self {
        Self {
            store,
            source,
            keys: KeyLayout::default(),
            config,
        }
    }

    /// Use a namespaced key layout.
    pub fn with_keys(mut self, keys: KeyLayout) -> Self {
        self.keys = keys;
        self
    }

    pub fn config(&self) -> &RoleCacheConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────
    // Per-user roles
    // ─────────────────────────────────────────────────────────────────────

    /// Role codes for a user, from cache or else from the source.
    pub async fn get_roles(&self, user_id: &str) -> Result<Vec<String>> {
        if let Some(codes) = self.cached_roles(user_id).await {
            debug!(user_id = %user_id, roles = codes.len(), "Role cache hit");
            return Ok(codes);
        }
        debug!(user_id = %user_id, "Role cache miss");
        let roles = self.source.roles_for_user(user_id).await?;
        Ok(self.cache_user_roles(user_id, &roles).await)
    }

    /// Cached role codes for a user, without consulting the source.
    pub async fn cached_roles(&self, user_id: &str) -> Option<Vec<String>> {
        self.read_json(&self.keys.user_roles(user_id)).await
    }

    /// Drop a user's cached roles, then reload them from the source. If the
    /// source fails the entry stays dropped.
    pub async fn refresh_user(&self, user_id: &str) -> Result<Vec<String>> {
        self.invalidate_user(user_id).await;
        let roles = self.source.roles_for_user(user_id).await?;
        Ok(self.cache_user_roles(user_id, &roles).await)
    }

    /// Drop a user's cached roles.
    pub async fn invalidate_user(&self, user_id: &str) {
        let key = self.keys.user_roles(user_id);
        match self.store.delete(&[key.as_str()]).await {
            Ok(_) => debug!(user_id = %user_id, "Invalidated user roles"),
            Err(e) => warn!(user_id = %user_id, error = %e, "Failed to invalidate user roles"),
        }
    }

    /// Drop every user's cached roles. Returns the number of entries removed.
    pub async fn invalidate_all_users(&self) -> usize {
        let keys = match self.store.keys_by_prefix(&self.keys.user_roles_prefix()).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "Failed to list cached user roles");
                return 0;
            }
        };
        let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        match self.store.delete(&refs).await {
            Ok(removed) => {
                info!(removed, "Invalidated all user roles");
                removed
            }
            Err(e) => {
                warn!(error = %e, "Failed to invalidate user roles");
                0
            }
        }
    }

    async fn cache_user_roles(&self, user_id: &str, roles: &[Role]) -> Vec<String> {
        let codes: Vec<String> = roles.iter().map(|r| r.code.clone()).collect();
        self.write_json(&self.keys.user_roles(user_id), &codes).await;
        debug!(user_id = %user_id, roles = codes.len(), "Cached user roles");
        codes
    }

    // ─────────────────────────────────────────────────────────────────────
    // Catalog
    // ─────────────────────────────────────────────────────────────────────

    /// The role catalog, from cache or else from the source.
    pub async fn get_all_roles(&self) -> Result<Vec<Role>> {
        if let Some(roles) = self.get_all_roles_from_cache().await {
            return Ok(roles);
        }
        self.cache_all_roles().await
    }

    /// The cached role catalog, without consulting the source.
    pub async fn get_all_roles_from_cache(&self) -> Option<Vec<Role>> {
        self.read_json(&self.keys.all_roles()).await
    }

    /// Reload the role catalog from the source and cache it.
    pub async fn cache_all_roles(&self) -> Result<Vec<Role>> {
        let roles = self.source.all_roles().await?;
        self.write_json(&self.keys.all_roles(), &roles).await;
        debug!(roles = roles.len(), "Cached role catalog");
        Ok(roles)
    }

    /// Drop the cached role catalog.
    pub async fn invalidate_catalog(&self) {
        let key = self.keys.all_roles();
        if let Err(e) = self.store.delete(&[key.as_str()]).await {
            warn!(error = %e, "Failed to invalidate role catalog");
        }
    }

    /// Populate every user's roles and the catalog from the source.
    /// Returns the number of users cached.
    ///
    /// Assignments naming a role missing from the catalog are skipped.
    pub async fn warm_all(&self) -> Result<usize> {
        let catalog = self.cache_all_roles().await?;
        let assignments = self.source.all_assignments().await?;

        let by_id: HashMap<&str, &Role> = catalog.iter().map(|r| (r.id.as_str(), r)).collect();
        let mut per_user: BTreeMap<&str, Vec<Role>> = BTreeMap::new();
        for assignment in &assignments {
            match by_id.get(assignment.role_id.as_str()) {
                Some(role) => per_user
                    .entry(assignment.user_id.as_str())
                    .or_default()
                    .push((*role).clone()),
                None => warn!(
                    user_id = %assignment.user_id,
                    role_id = %assignment.role_id,
                    "Assignment names unknown role, skipping"
                ),
            }
        }

        for (user_id, roles) in &per_user {
            self.cache_user_roles(user_id, roles).await;
        }
        info!(users = per_user.len(), roles = catalog.len(), "Role cache warmed");
        Ok(per_user.len())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Mutation hooks
    // ─────────────────────────────────────────────────────────────────────

    /// A role was created. No user holds it yet, so only the catalog is
    /// reloaded.
    pub async fn on_role_created(&self) {
        self.invalidate_catalog().await;
        if let Err(e) = self.cache_all_roles().await {
            warn!(error = %e, "Failed to recache role catalog");
        }
    }

    /// A role was renamed or recoded. Any user may hold it.
    pub async fn on_role_changed(&self) {
        self.on_role_created().await;
        self.invalidate_all_users().await;
    }

    /// A role was deleted.
    pub async fn on_role_deleted(&self) {
        self.on_role_changed().await;
    }

    /// A user's assignments changed. Their entry is reloaded so the next
    /// read is warm.
    pub async fn on_assignment_changed(&self, user_id: &str) {
        if let Err(e) = self.refresh_user(user_id).await {
            warn!(user_id = %user_id, error = %e, "Failed to reload user roles");
        }
    }

    /// A user was deleted.
    pub async fn on_user_deleted(&self, user_id: &str) {
        self.invalidate_user(user_id).await;
    }

    // ─────────────────────────────────────────────────────────────────────
    // Store helpers
    // ─────────────────────────────────────────────────────────────────────

    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key).await {
            Ok(Some(raw)) if !raw.is_empty() => raw,
            Ok(_) => return None,
            Err(e) => {
                warn!(key = %key, error = %e, "Role cache read failed");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %key, error = %e, "Undecodable role cache entry");
                None
            }
        }
    }

    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let encoded = match serde_json::to_string(value) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to encode role cache entry");
                return;
            }
        };
        if let Err(e) = self.store.set(key, &encoded, self.config.ttl).await {
            warn!(key = %key, error = %e, "Role cache write failed");
        }
    }
}
