//! Session token lifecycle and identity role cache.
//!
//! This crate owns the two halves of one consistency domain:
//! - [`TokenLifecycleManager`] issues opaque session tokens, binds them to a
//!   user's identity and role claims, enforces per-browser, per-user-browser
//!   and per-source-address limits, and cascades deletion through every
//!   secondary index.
//! - [`IdentityRoleCache`] serves user role assignments and the role catalog
//!   cache-aside, with coarse invalidation hooks for role and assignment
//!   mutations.
//!
//! [`SessionService`] ties them together for sign-in and sign-out.
//!
//! Both run on top of any [`tessera_store::KeyValueStore`]. There are no
//! cross-key transactions: conflicting sessions are evicted before a new one
//! is admitted, and every deletion path clears every index itself.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tessera_session::{SessionConfig, SessionRequest, TokenLifecycleManager};
//! use tessera_store::MemoryStore;
//!
//! let manager = TokenLifecycleManager::new(Arc::new(MemoryStore::new()), SessionConfig::default());
//! let token = manager
//!     .issue_session(SessionRequest::new("u1", "alice").with_browser("b1"))
//!     .await?;
//! assert!(manager.validate(&token).await.is_some());
//! ```

mod config;
mod error;
mod keys;
mod manager;
mod record;
mod roles;
mod service;
mod token;

pub use config::{
    DEFAULT_MAX_USERS_PER_ADDRESS, DEFAULT_REFRESH_INTERVAL, DEFAULT_ROLE_CACHE_TTL,
    DEFAULT_SESSION_TTL, DEFAULT_TOKEN_LENGTH, RoleCacheConfig, SessionConfig,
};
pub use error::{Result, SessionError};
pub use keys::KeyLayout;
pub use manager::{SessionRequest, TokenLifecycleManager};
pub use record::SessionRecord;
pub use roles::{
    IdentityRoleCache, NoRoleSource, Role, RoleAssignment, RoleSource, StaticRoleSource,
};
pub use service::{IssuedSession, SessionService, VerifiedUser};
pub use token::generate_token;
