//! Application state shared across handlers.

use std::sync::Arc;

use tessera_session::{IdentityRoleCache, SessionService, TokenLifecycleManager};

use crate::config::ServerConfig;

/// Application state shared across all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Session lifecycle and role cache.
    pub service: Arc<SessionService>,

    /// Server configuration.
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Create a new application state.
    pub fn new(service: SessionService, config: ServerConfig) -> Self {
        Self {
            service: Arc::new(service),
            config: Arc::new(config),
        }
    }

    pub fn sessions(&self) -> &TokenLifecycleManager {
        self.service.sessions()
    }

    pub fn roles(&self) -> &IdentityRoleCache {
        self.service.roles()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
