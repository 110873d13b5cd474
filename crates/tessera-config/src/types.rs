//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [session]   # token lifetime and concurrency limits
//! [roles]     # role-cache lifetime
//! [store]     # key-value store backend
//! [server]    # request-boundary server
//! [logging]   # log file placement
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Smallest accepted token length.
pub const MIN_TOKEN_LENGTH: usize = 16;

/// Largest accepted token length.
pub const MAX_TOKEN_LENGTH: usize = 128;

/// Longest accepted TTL or refresh interval: ten years.
pub const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TesseraConfig {
    /// Session token settings.
    pub session: SessionSection,

    /// Identity role-cache settings.
    pub roles: RolesSection,

    /// Key-value store settings.
    pub store: StoreSection,

    /// Request-boundary server settings.
    pub server: ServerSection,

    /// Logging settings.
    pub logging: LoggingSection,
}

impl TesseraConfig {
    /// Create a config with every value defaulted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string and validate.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: TesseraConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check that every value is inside its accepted range.
    pub fn validate(&self) -> Result<()> {
        let s = &self.session;
        check_duration("session.ttl_secs", s.ttl_secs)?;
        check_duration("session.refresh_interval_secs", s.refresh_interval_secs)?;
        if !(MIN_TOKEN_LENGTH..=MAX_TOKEN_LENGTH).contains(&s.token_length) {
            return Err(ConfigError::invalid(
                "session.token_length",
                format!("must be between {MIN_TOKEN_LENGTH} and {MAX_TOKEN_LENGTH}"),
            ));
        }
        if s.max_users_per_address == 0 {
            return Err(ConfigError::invalid(
                "session.max_users_per_address",
                "must be >= 1",
            ));
        }
        check_duration("roles.ttl_secs", self.roles.ttl_secs)
    }
}

fn check_duration(field: &str, secs: u64) -> Result<()> {
    if secs == 0 {
        return Err(ConfigError::invalid(field, "must be > 0"));
    }
    if secs > MAX_TTL_SECS {
        return Err(ConfigError::invalid(field, format!("must be <= {MAX_TTL_SECS}")));
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Session token configuration.
///
/// ```toml
/// [session]
/// ttl_secs = 1800
/// refresh_interval_secs = 1800
/// token_length = 32
/// max_users_per_address = 5
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// Absolute lifetime of a session record in the store.
    pub ttl_secs: u64,
    /// Inactivity window after which a session is stale even if the
    /// store still holds it.
    pub refresh_interval_secs: u64,
    /// Length of generated session tokens.
    pub token_length: usize,
    /// Distinct users allowed to hold sessions from one source address.
    pub max_users_per_address: usize,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            ttl_secs: 1800,
            refresh_interval_secs: 1800,
            token_length: 32,
            max_users_per_address: 5,
        }
    }
}

impl SessionSection {
    /// Absolute session lifetime.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Sliding inactivity window.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Role Cache Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Role-cache configuration.
///
/// ```toml
/// [roles]
/// ttl_secs = 604800
/// warm_on_start = false
/// source_file = "/etc/tessera/roles.json"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RolesSection {
    /// Lifetime of cached role assignments and the role catalog.
    pub ttl_secs: u64,
    /// Populate every user's roles and the catalog when the process starts.
    pub warm_on_start: bool,
    /// JSON document holding the role catalog and assignments. Without one,
    /// only roles already in the store can be served.
    pub source_file: Option<PathBuf>,
}

impl Default for RolesSection {
    fn default() -> Self {
        Self {
            ttl_secs: 7 * 24 * 60 * 60,
            warm_on_start: false,
            source_file: None,
        }
    }
}

impl RolesSection {
    /// Role-cache entry lifetime.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Store Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Which key-value store backs sessions and caches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In-process store. State is lost when the process exits.
    #[default]
    Memory,
    /// Networked Redis server.
    Redis,
}

/// Key-value store configuration.
///
/// ```toml
/// [store]
/// backend = "redis"
/// url = "redis://127.0.0.1:6379"
/// key_prefix = "admin:"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub backend: StoreBackend,
    /// Connection URL (Redis backend only).
    pub url: String,
    /// Namespace prepended to every key.
    pub key_prefix: String,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: String::new(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Request-boundary server configuration.
///
/// ```toml
/// [server]
/// bind = "127.0.0.1:8090"
/// admin_token = "change-me"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Address to bind to.
    pub bind: String,
    /// Shared secret for the administrative routes. Admin routes are not
    /// mounted when unset.
    pub admin_token: Option<String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8090".to_string(),
            admin_token: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Directory for the rotating JSON log. Defaults to `<config dir>/logs`.
    pub dir: Option<PathBuf>,
    /// Write the JSON log file at all.
    pub file: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            dir: None,
            file: true,
        }
    }
}
