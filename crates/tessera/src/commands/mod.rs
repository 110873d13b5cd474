//! CLI command handlers.

pub mod config;
pub mod roles;
pub mod serve;
pub mod session;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use tessera_config::{StoreBackend, TesseraConfig};
use tessera_session::{
    IdentityRoleCache, KeyLayout, NoRoleSource, RoleCacheConfig, RoleSource, SessionConfig,
    SessionService, StaticRoleSource, TokenLifecycleManager,
};
use tessera_store::{MemoryStore, RedisStore, SharedStore};
use tracing::{debug, warn};

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Effective configuration.
    pub config: TesseraConfig,
    /// File the configuration was loaded from, if any.
    pub config_path: Option<PathBuf>,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Open the configured key-value store.
    pub async fn open_store(&self) -> Result<SharedStore> {
        let store: SharedStore = match self.config.store.backend {
            StoreBackend::Memory => {
                warn!("Using in-process store; sessions do not outlive this process");
                Arc::new(MemoryStore::new())
            }
            StoreBackend::Redis => {
                debug!(url = %self.config.store.url, "Connecting to redis");
                Arc::new(RedisStore::connect(&self.config.store.url).await?)
            }
        };
        Ok(store)
    }

    /// Load the configured role source.
    ///
    /// Without `roles.source_file` every lookup fails and only role entries
    /// already in the store are served.
    pub fn role_source(&self) -> Result<Arc<dyn RoleSource>> {
        let Some(path) = &self.config.roles.source_file else {
            debug!("No role source configured");
            return Ok(Arc::new(NoRoleSource));
        };
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read role source '{}'", path.display()))?;
        let source = StaticRoleSource::from_json(&json)
            .with_context(|| format!("failed to parse role source '{}'", path.display()))?;
        debug!(
            path = %path.display(),
            roles = source.roles.len(),
            assignments = source.assignments.len(),
            "Loaded role source"
        );
        Ok(Arc::new(source))
    }

    /// Build the session service over the configured store.
    pub async fn service(&self) -> Result<SessionService> {
        let source = self.role_source()?;
        let store = self.open_store().await?;
        Ok(build_service(&self.config, store, source))
    }
}

/// Wire the lifecycle manager and role cache from configuration.
pub fn build_service(
    config: &TesseraConfig,
    store: SharedStore,
    source: Arc<dyn RoleSource>,
) -> SessionService {
    let keys = KeyLayout::new(config.store.key_prefix.clone());

    let session_config = SessionConfig::default()
        .with_ttl(config.session.ttl())
        .with_refresh_interval(config.session.refresh_interval())
        .with_token_length(config.session.token_length)
        .with_max_users_per_address(config.session.max_users_per_address);
    let sessions =
        TokenLifecycleManager::new(store.clone(), session_config).with_keys(keys.clone());

    let role_config = RoleCacheConfig::default().with_ttl(config.roles.ttl());
    let roles = IdentityRoleCache::new(store, source, role_config).with_keys(keys);

    SessionService::new(sessions, roles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tessera_session::{SessionRequest, VerifiedUser};
    use tessera_store::KeyValueStore;

    #[tokio::test]
    async fn test_build_service_applies_config() {
        let mut config = TesseraConfig::default();
        config.store.key_prefix = "admin:".to_string();
        config.session.ttl_secs = 60;
        config.session.token_length = 24;

        let memory = MemoryStore::new();
        let service = build_service(&config, Arc::new(memory.clone()), Arc::new(NoRoleSource));
        assert_eq!(service.sessions().config().ttl, Duration::from_secs(60));

        let token = service
            .sessions()
            .issue_session(SessionRequest::new("u1", "alice"))
            .await
            .unwrap();
        assert_eq!(token.len(), 24);
        assert!(memory.get(&format!("admin:token:{token}")).await.unwrap().is_some());
        assert!(memory.get(&format!("token:{token}")).await.unwrap().is_none());
    }

    fn context(config: TesseraConfig) -> Context {
        Context {
            config,
            config_path: None,
            json_output: false,
            verbose: false,
        }
    }

    #[tokio::test]
    async fn test_without_source_file_lookups_fail() {
        let ctx = context(TesseraConfig::default());
        let service = ctx.service().await.unwrap();
        assert!(service.roles().get_roles("u1").await.is_err());
        assert!(service.roles().cached_roles("u1").await.is_none());
    }

    #[tokio::test]
    async fn test_sign_in_with_source_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roles.json");
        std::fs::write(
            &path,
            r#"{"roles":[{"id":"r1","name":"Administrator","code":"ADMIN"}],
                "assignments":[{"user_id":"u1","role_id":"r1"}]}"#,
        )
        .unwrap();

        let mut config = TesseraConfig::default();
        config.roles.source_file = Some(path);
        let service = context(config).service().await.unwrap();

        let issued = service
            .sign_in(VerifiedUser::new("u1", "alice"), Some("b1"), None)
            .await
            .unwrap();
        assert_eq!(issued.roles, vec!["ADMIN"]);
        let record = service.sessions().validate(&issued.token).await.unwrap();
        assert_eq!(record.roles, vec!["ADMIN"]);
    }

    #[tokio::test]
    async fn test_unreadable_source_file() {
        let mut config = TesseraConfig::default();
        config.roles.source_file = Some(PathBuf::from("/nonexistent/roles.json"));
        assert!(context(config).service().await.is_err());
    }
}
