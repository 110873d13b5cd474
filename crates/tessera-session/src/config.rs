//! Configuration for the token lifecycle manager and role cache.

use std::time::Duration;

/// Default absolute session lifetime (30 minutes).
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(1800);

/// Default sliding inactivity window (30 minutes).
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(1800);

/// Default generated token length.
pub const DEFAULT_TOKEN_LENGTH: usize = 32;

/// Default ceiling on distinct users holding sessions from one address.
pub const DEFAULT_MAX_USERS_PER_ADDRESS: usize = 5;

/// Default role-cache entry lifetime (7 days).
pub const DEFAULT_ROLE_CACHE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Configuration for the token lifecycle manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Store-level TTL applied to session records and their index entries.
    pub ttl: Duration,

    /// A session not refreshed within this window is stale, even if the
    /// store still holds it. Independent of `ttl`.
    pub refresh_interval: Duration,

    /// Length of generated tokens.
    pub token_length: usize,

    /// Distinct users allowed to hold sessions from one source address.
    pub max_users_per_address: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_SESSION_TTL,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            token_length: DEFAULT_TOKEN_LENGTH,
            max_users_per_address: DEFAULT_MAX_USERS_PER_ADDRESS,
        }
    }
}

impl SessionConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the absolute session lifetime.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the sliding inactivity window.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Set the generated token length.
    pub fn with_token_length(mut self, len: usize) -> Self {
        self.token_length = len;
        self
    }

    /// Set the per-address user ceiling. Values below 1 are raised to 1.
    pub fn with_max_users_per_address(mut self, max: usize) -> Self {
        self.max_users_per_address = max.max(1);
        self
    }
}

/// Configuration for the identity role cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleCacheConfig {
    /// TTL of per-user role entries and of the role catalog.
    pub ttl: Duration,
}

impl Default for RoleCacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_ROLE_CACHE_TTL,
        }
    }
}

impl RoleCacheConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cache entry lifetime.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}
