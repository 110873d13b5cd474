//! Session token lifecycle: issue, validate, refresh, cascade-delete.

use chrono::{TimeDelta, Utc};
use tessera_store::SharedStore;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::keys::KeyLayout;
use crate::record::{SessionRecord, expiry_after};
use crate::token::generate_token;

/// Shortened token for log output.
fn short(token: &str) -> &str {
    token.get(..8).unwrap_or(token)
}

/// Trim an optional context value, treating blank as absent.
fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Input to [`TokenLifecycleManager::issue_session`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionRequest {
    pub user_id: String,
    pub username: String,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    /// Opaque browser fingerprint. Blank means absent.
    pub browser_id: Option<String>,
    /// Client network address. Blank means absent.
    pub source_address: Option<String>,
}

impl SessionRequest {
    pub fn new(user_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            ..Default::default()
        }
    }

    pub fn with_roles(mut self, roles: Vec<String>) -> Self {
        self.roles = roles;
        self
    }

    pub fn with_permissions(mut self, permissions: Vec<String>) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_browser(mut self, browser_id: impl Into<String>) -> Self {
        self.browser_id = Some(browser_id.into());
        self
    }

    pub fn with_source_address(mut self, address: impl Into<String>) -> Self {
        self.source_address = Some(address.into());
        self
    }
}

/// Issues, validates, refreshes and deletes session tokens.
///
/// Admission limits are enforced by evicting conflicting sessions before the
/// new one is written:
/// - one session per browser fingerprint
/// - one session per (user, browser) pair
/// - one session per (user, source address) pair
/// - at most `max_users_per_address` distinct users per source address,
///   evicting the oldest session when a new user arrives at the ceiling
///
/// Nothing here is atomic across keys. Two concurrent issues for the same
/// browser can both be admitted; the next issue or delete touching that
/// browser cleans up the loser.
#[derive(Debug, Clone)]
pub struct TokenLifecycleManager {
    store: SharedStore,
    keys: KeyLayout,
    config: SessionConfig,
}

impl TokenLifecycleManager {
    /// Create a manager over `store` with the default key layout.
    pub fn new(store: SharedStore, config: SessionConfig) -> Self {
        Self {
            store,
            keys: KeyLayout::default(),
            config,
        }
    }

    /// Use a namespaced key layout.
    pub fn with_keys(mut self, keys: KeyLayout) -> Self {
        self.keys = keys;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn keys(&self) -> &KeyLayout {
        &self.keys
    }

    // ─────────────────────────────────────────────────────────────────────
    // Issue
    // ─────────────────────────────────────────────────────────────────────

    /// Issue a new session and return its token.
    ///
    /// Conflicting sessions are deleted first. Only a failure to write the
    /// session record itself is an error; index write failures are logged
    /// and left for later deletions to heal.
    pub async fn issue_session(&self, request: SessionRequest) -> Result<String> {
        self.issue_record(request).await.map(|record| record.token)
    }

    /// Like [`issue_session`](Self::issue_session), returning the stored record.
    pub async fn issue_record(&self, request: SessionRequest) -> Result<SessionRecord> {
        if request.user_id.trim().is_empty() {
            return Err(SessionError::InvalidRequest("user_id is empty".into()));
        }
        if request.username.trim().is_empty() {
            return Err(SessionError::InvalidRequest("username is empty".into()));
        }

        let token = generate_token(self.config.token_length);
        let browser = present(request.browser_id.as_deref());
        let address = present(request.source_address.as_deref());

        if let Some(browser) = browser {
            self.evict_browser_conflicts(&token, &request.user_id, browser)
                .await;
        }
        if let Some(address) = address {
            self.evict_address_conflicts(&token, &request.user_id, address)
                .await;
        }

        let now = Utc::now();
        let record = SessionRecord {
            token: token.clone(),
            user_id: request.user_id.clone(),
            username: request.username.clone(),
            roles: request.roles,
            permissions: request.permissions,
            created_at: now,
            last_refreshed_at: now,
            expires_at: expiry_after(now, self.config.ttl),
        };

        let ttl = self.config.ttl;
        self.store
            .set(&self.keys.token(&token), &record.encode()?, ttl)
            .await?;

        self.write_index(&self.keys.user_token(&request.username), &token)
            .await;
        if let Some(browser) = browser {
            self.write_index(&self.keys.browser_token(browser), &token)
                .await;
            self.write_index(&self.keys.user_browser(&request.user_id, browser), &token)
                .await;
        }
        if let Some(address) = address {
            self.write_index(&self.keys.ip_user_token(address, &request.user_id), &token)
                .await;
            let members = self.keys.ip_users(address);
            if let Err(e) = self.store.set_add(&members, &request.user_id).await {
                warn!(key = %members, error = %e, "Failed to record address membership");
            } else if let Err(e) = self.store.expire(&members, ttl).await {
                warn!(key = %members, error = %e, "Failed to set address membership TTL");
            }
        }

        info!(
            token = %short(&token),
            user_id = %request.user_id,
            username = %request.username,
            browser = browser.is_some(),
            address = address.unwrap_or("-"),
            "Session issued"
        );
        Ok(record)
    }

    /// Delete sessions already bound to this browser or (user, browser) pair.
    async fn evict_browser_conflicts(&self, new_token: &str, user_id: &str, browser: &str) {
        for key in [
            self.keys.browser_token(browser),
            self.keys.user_browser(user_id, browser),
        ] {
            if let Some(existing) = self.read_index(&key).await
                && existing != new_token
            {
                debug!(token = %short(&existing), key = %key, "Evicting session bound to browser");
                self.delete(&existing).await;
            }
        }
    }

    /// Delete this user's previous session from `address`, then make room if
    /// the address is at its user ceiling.
    async fn evict_address_conflicts(&self, new_token: &str, user_id: &str, address: &str) {
        let own = self.keys.ip_user_token(address, user_id);
        if let Some(existing) = self.read_index(&own).await
            && existing != new_token
        {
            debug!(
                token = %short(&existing),
                address = %address,
                "Evicting user's session from address"
            );
            self.delete(&existing).await;
        }

        let members_key = self.keys.ip_users(address);
        let mut members = match self.store.set_members(&members_key).await {
            Ok(members) => members,
            Err(e) => {
                warn!(
                    key = %members_key,
                    error = %e,
                    "Address membership read failed, skipping ceiling"
                );
                return;
            }
        };
        if members.iter().any(|m| m == user_id) {
            return;
        }

        while members.len() >= self.config.max_users_per_address {
            // Members whose session record is gone have no creation time and
            // go first.
            let mut candidates = Vec::with_capacity(members.len());
            for member in &members {
                let token = self.read_index(&self.keys.ip_user_token(address, member)).await;
                let created_at = match &token {
                    Some(t) => self.load_record(t).await.map(|r| r.created_at),
                    None => None,
                };
                candidates.push((created_at, member.clone(), token));
            }
            let Some((created_at, oldest, token)) =
                candidates.into_iter().min_by(|a, b| a.0.cmp(&b.0))
            else {
                break;
            };

            info!(
                address = %address,
                user_id = %oldest,
                dangling = created_at.is_none(),
                ceiling = self.config.max_users_per_address,
                "Address at user ceiling, evicting oldest session"
            );
            match token {
                Some(token) => self.delete(&token).await,
                None => self.remove_member(&members_key, &oldest).await,
            }
            members.retain(|m| m != &oldest);
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Validate / refresh
    // ─────────────────────────────────────────────────────────────────────

    /// Look up a live session.
    ///
    /// A session idle for longer than the refresh interval is deleted and
    /// reported as not found. Store failures also report not found.
    pub async fn validate(&self, token: &str) -> Option<SessionRecord> {
        if token.trim().is_empty() {
            return None;
        }
        let record = self.load_record(token).await?;

        let idle = record.idle_for(Utc::now());
        if idle > self.refresh_interval_delta() {
            info!(
                token = %short(token),
                user_id = %record.user_id,
                idle_secs = idle.num_seconds(),
                "Session stale, deleting"
            );
            self.delete(token).await;
            return None;
        }
        Some(record)
    }

    /// Extend a live session. Returns the updated record, or `None` if the
    /// token is not live or the update could not be written.
    pub async fn refresh(&self, token: &str) -> Option<SessionRecord> {
        let mut record = self.validate(token).await?;

        let now = Utc::now();
        record.last_refreshed_at = now;
        record.expires_at = expiry_after(now, self.config.ttl);

        let encoded = match record.encode() {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(token = %short(token), error = %e, "Failed to encode refreshed session");
                return None;
            }
        };
        if let Err(e) = self
            .store
            .set(&self.keys.token(token), &encoded, self.config.ttl)
            .await
        {
            warn!(token = %short(token), error = %e, "Failed to write refreshed session");
            return None;
        }

        let identity = self.keys.user_token(&record.username);
        if let Err(e) = self.store.expire(&identity, self.config.ttl).await {
            warn!(key = %identity, error = %e, "Failed to extend identity index");
        }

        debug!(token = %short(token), expires_at = %record.expires_at, "Session refreshed");
        Some(record)
    }

    /// Whether `token` names a live session.
    pub async fn is_valid(&self, token: &str) -> bool {
        self.validate(token).await.is_some()
    }

    /// Role codes of a live session. Empty when the token is not live.
    pub async fn roles_for(&self, token: &str) -> Vec<String> {
        self.validate(token).await.map(|r| r.roles).unwrap_or_default()
    }

    /// Permissions of a live session. Empty when the token is not live.
    pub async fn permissions_for(&self, token: &str) -> Vec<String> {
        self.validate(token)
            .await
            .map(|r| r.permissions)
            .unwrap_or_default()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Delete
    // ─────────────────────────────────────────────────────────────────────

    /// Delete a session and every index entry pointing at it.
    ///
    /// Idempotent. Works on dangling tokens whose record is already gone,
    /// sweeping the indices for anything still pointing at them. Individual
    /// store failures are logged and skipped.
    pub async fn delete(&self, token: &str) {
        if token.trim().is_empty() {
            return;
        }
        let record = self.load_record(token).await;

        let primary = self.keys.token(token);
        self.remove_keys(&[primary.as_str()]).await;

        match &record {
            Some(record) => {
                let identity = self.keys.user_token(&record.username);
                if self.read_index(&identity).await.as_deref() == Some(token) {
                    self.remove_keys(&[identity.as_str()]).await;
                }
            }
            None => {
                self.sweep_index(&self.keys.user_token_prefix(), token)
                    .await;
            }
        }

        let browser_hits = self
            .sweep_index(&self.keys.browser_token_prefix(), token)
            .await;

        let user_browser_prefix = match &record {
            Some(record) => self.keys.user_browser_prefix(&record.user_id),
            None => self.keys.user_browser_all_prefix(),
        };
        let user_browser_hits = self.sweep_index(&user_browser_prefix, token).await;

        let address_hits = self
            .sweep_index(&self.keys.ip_user_token_prefix(), token)
            .await;
        for key in &address_hits {
            if let Some((address, user_id)) = self.keys.parse_ip_user_token(key) {
                self.remove_member(&self.keys.ip_users(address), &user_id)
                    .await;
            }
        }

        info!(
            token = %short(token),
            found = record.is_some(),
            browser_entries = browser_hits.len() + user_browser_hits.len(),
            address_entries = address_hits.len(),
            "Session deleted"
        );
    }

    /// Delete the session currently recorded for `username`.
    pub async fn delete_by_username(&self, username: &str) {
        match self.read_index(&self.keys.user_token(username)).await {
            Some(token) => self.delete(&token).await,
            None => debug!(username = %username, "No session recorded for username"),
        }
    }

    /// Delete every session belonging to a user, across all browsers and
    /// addresses.
    pub async fn delete_all_for_user(&self, user_id: &str, username: &str) {
        let mut deleted: Vec<String> = Vec::new();

        if let Some(token) = self.read_index(&self.keys.user_token(username)).await {
            self.delete(&token).await;
            deleted.push(token);
        }

        for key in self.scan(&self.keys.user_browser_prefix(user_id)).await {
            if let Some(token) = self.read_index(&key).await
                && !deleted.contains(&token)
            {
                self.delete(&token).await;
                deleted.push(token);
            }
            self.remove_keys(&[key.as_str()]).await;
        }

        for key in self.scan(&self.keys.ip_user_token_prefix()).await {
            let Some((address, owner)) = self.keys.parse_ip_user_token(&key) else {
                continue;
            };
            if owner.as_ref() != user_id {
                continue;
            }
            let address = address.to_string();
            if let Some(token) = self.read_index(&key).await
                && !deleted.contains(&token)
            {
                self.delete(&token).await;
                deleted.push(token);
            }
            self.remove_keys(&[key.as_str()]).await;
            self.remove_member(&self.keys.ip_users(&address), user_id)
                .await;
        }

        // Browser bindings only name the token, so check each record's owner.
        for key in self.scan(&self.keys.browser_token_prefix()).await {
            let Some(token) = self.read_index(&key).await else {
                continue;
            };
            if deleted.contains(&token) {
                continue;
            }
            if let Some(record) = self.load_record(&token).await
                && (record.user_id == user_id || record.username == username)
            {
                self.delete(&token).await;
                deleted.push(token);
            }
        }

        info!(
            user_id = %user_id,
            username = %username,
            sessions = deleted.len(),
            "Deleted all sessions for user"
        );
    }

    // ─────────────────────────────────────────────────────────────────────
    // Store helpers
    // ─────────────────────────────────────────────────────────────────────

    /// Read a session record without the staleness check. Undecodable
    /// records read as absent.
    async fn load_record(&self, token: &str) -> Option<SessionRecord> {
        let raw = self.read_index(&self.keys.token(token)).await?;
        match SessionRecord::decode(&raw) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(token = %short(token), error = %e, "Undecodable session record");
                None
            }
        }
    }

    async fn read_index(&self, key: &str) -> Option<String> {
        match self.store.get(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %key, error = %e, "Store read failed");
                None
            }
        }
    }

    async fn write_index(&self, key: &str, token: &str) {
        if let Err(e) = self.store.set(key, token, self.config.ttl).await {
            warn!(key = %key, error = %e, "Failed to write session index");
        }
    }

    async fn remove_keys(&self, keys: &[&str]) {
        if let Err(e) = self.store.delete(keys).await {
            warn!(keys = ?keys, error = %e, "Store delete failed");
        }
    }

    async fn remove_member(&self, set: &str, member: &str) {
        if let Err(e) = self.store.set_remove(set, member).await {
            warn!(key = %set, member = %member, error = %e, "Failed to remove set member");
        }
    }

    async fn scan(&self, prefix: &str) -> Vec<String> {
        match self.store.keys_by_prefix(prefix).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(prefix = %prefix, error = %e, "Store scan failed");
                Vec::new()
            }
        }
    }

    /// Delete every key under `prefix` whose value is `token`. Returns the
    /// keys removed.
    async fn sweep_index(&self, prefix: &str, token: &str) -> Vec<String> {
        let mut hits = Vec::new();
        for key in self.scan(prefix).await {
            if self.read_index(&key).await.as_deref() == Some(token) {
                self.remove_keys(&[key.as_str()]).await;
                hits.push(key);
            }
        }
        hits
    }

    fn refresh_interval_delta(&self) -> TimeDelta {
        TimeDelta::from_std(self.config.refresh_interval).unwrap_or(TimeDelta::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tessera_store::{KeyValueStore, MemoryStore};

    fn manager() -> (TokenLifecycleManager, MemoryStore) {
        let store = MemoryStore::new();
        let manager = TokenLifecycleManager::new(Arc::new(store.clone()), SessionConfig::default());
        (manager, store)
    }

    #[test]
    fn test_short_token() {
        assert_eq!(short("0123456789abcdef"), "01234567");
        assert_eq!(short("abc"), "abc");
    }

    #[test]
    fn test_present() {
        assert_eq!(present(Some("  b1 ")), Some("b1"));
        assert_eq!(present(Some("   ")), None);
        assert_eq!(present(None), None);
    }

    #[tokio::test]
    async fn test_issue_rejects_blank_identity() {
        let (manager, _) = manager();
        let err = manager
            .issue_session(SessionRequest::new("", "alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidRequest(_)));

        let err = manager
            .issue_session(SessionRequest::new("u1", " "))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_issue_writes_record_and_identity_index() {
        let (manager, store) = manager();
        let token = manager
            .issue_session(SessionRequest::new("u1", "alice").with_roles(vec!["ADMIN".into()]))
            .await
            .unwrap();

        assert_eq!(token.len(), 32);
        let record = manager.validate(&token).await.unwrap();
        assert_eq!(record.user_id, "u1");
        assert_eq!(record.roles, vec!["ADMIN".to_string()]);
        assert_eq!(record.created_at, record.last_refreshed_at);
        assert_eq!(
            store.get("user_token:alice").await.unwrap().as_deref(),
            Some(token.as_str())
        );
        // Record plus identity index, nothing else without context.
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_blank_context_is_ignored() {
        let (manager, store) = manager();
        manager
            .issue_session(
                SessionRequest::new("u1", "alice")
                    .with_browser("  ")
                    .with_source_address(""),
            )
            .await
            .unwrap();

        assert!(store.keys_by_prefix("browser_token:").await.unwrap().is_empty());
        assert!(store.keys_by_prefix("ip_users:").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_token_length_follows_config() {
        let store = Arc::new(MemoryStore::new());
        let manager =
            TokenLifecycleManager::new(store, SessionConfig::new().with_token_length(48));
        let token = manager
            .issue_session(SessionRequest::new("u1", "alice"))
            .await
            .unwrap();
        assert_eq!(token.len(), 48);
    }

    #[tokio::test]
    async fn test_records_carry_store_ttl() {
        let (manager, store) = manager();
        let token = manager
            .issue_session(SessionRequest::new("u1", "alice").with_source_address("10.0.0.1"))
            .await
            .unwrap();

        let ttl = store.ttl(&format!("token:{token}")).await.unwrap();
        assert!(ttl <= Duration::from_secs(1800));
        assert!(ttl > Duration::from_secs(1790));
        assert!(store.ttl("ip_users:10.0.0.1").await.is_some());
    }

    #[tokio::test]
    async fn test_refresh_moves_expiry_forward() {
        let (manager, _) = manager();
        let token = manager
            .issue_session(SessionRequest::new("u1", "alice"))
            .await
            .unwrap();
        let before = manager.validate(&token).await.unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        let after = manager.refresh(&token).await.unwrap();

        assert!(after.last_refreshed_at > before.last_refreshed_at);
        assert!(after.expires_at > before.expires_at);
        assert_eq!(after.created_at, before.created_at);
        assert_eq!(manager.validate(&token).await.unwrap(), after);
    }

    #[tokio::test]
    async fn test_unknown_token() {
        let (manager, _) = manager();
        assert!(manager.validate("nope").await.is_none());
        assert!(manager.refresh("nope").await.is_none());
        assert!(!manager.is_valid("").await);
        assert!(manager.roles_for("nope").await.is_empty());
        assert!(manager.permissions_for("nope").await.is_empty());
    }

    #[tokio::test]
    async fn test_undecodable_record_reads_as_absent() {
        let (manager, store) = manager();
        store
            .set("token:garbage", "not json", Duration::from_secs(60))
            .await
            .unwrap();

        assert!(manager.validate("garbage").await.is_none());
        manager.delete("garbage").await;
        assert!(store.get("token:garbage").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_namespaced_keys() {
        let store = MemoryStore::new();
        let manager = TokenLifecycleManager::new(Arc::new(store.clone()), SessionConfig::default())
            .with_keys(KeyLayout::new("app:"));
        let token = manager
            .issue_session(SessionRequest::new("u1", "alice").with_browser("b1"))
            .await
            .unwrap();

        assert!(store.get(&format!("app:token:{token}")).await.unwrap().is_some());
        assert!(store.get("app:browser_token:b1").await.unwrap().is_some());

        manager.delete(&token).await;
        assert!(store.is_empty().await);
    }
}
