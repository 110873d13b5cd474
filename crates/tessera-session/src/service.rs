//! Sign-in and sign-out on top of the lifecycle manager and role cache.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::manager::{SessionRequest, TokenLifecycleManager};
use crate::roles::IdentityRoleCache;

/// An identity whose credentials were already verified upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedUser {
    pub user_id: String,
    pub username: String,
    pub permissions: Vec<String>,
}

impl VerifiedUser {
    pub fn new(user_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            permissions: Vec::new(),
        }
    }

    pub fn with_permissions(mut self, permissions: Vec<String>) -> Self {
        self.permissions = permissions;
        self
    }
}

/// Result of a successful sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedSession {
    pub token: String,
    pub roles: Vec<String>,
    pub expires_at: DateTime<Utc>,
}

/// Session lifecycle with role claims resolved through the role cache.
#[derive(Debug, Clone)]
pub struct SessionService {
    sessions: TokenLifecycleManager,
    roles: IdentityRoleCache,
}

impl SessionService {
    pub fn new(sessions: TokenLifecycleManager, roles: IdentityRoleCache) -> Self {
        Self { sessions, roles }
    }

    pub fn sessions(&self) -> &TokenLifecycleManager {
        &self.sessions
    }

    pub fn roles(&self) -> &IdentityRoleCache {
        &self.roles
    }

    /// Issue a session for a verified user, carrying their current role codes.
    pub async fn sign_in(
        &self,
        user: VerifiedUser,
        browser_id: Option<&str>,
        source_address: Option<&str>,
    ) -> Result<IssuedSession> {
        let roles = self.roles.get_roles(&user.user_id).await?;

        let mut request = SessionRequest::new(user.user_id, user.username)
            .with_roles(roles.clone())
            .with_permissions(user.permissions);
        request.browser_id = browser_id.map(str::to_string);
        request.source_address = source_address.map(str::to_string);

        let record = self.sessions.issue_record(request).await?;

        Ok(IssuedSession {
            token: record.token,
            roles,
            expires_at: record.expires_at,
        })
    }

    /// End the caller's session. When the token is live, every session of
    /// its owner goes with it. Returns whether the token was live.
    pub async fn sign_out(&self, token: &str) -> bool {
        match self.sessions.validate(token).await {
            Some(record) => {
                self.sessions
                    .delete_all_for_user(&record.user_id, &record.username)
                    .await;
                info!(user_id = %record.user_id, "Signed out");
                true
            }
            None => {
                self.sessions.delete(token).await;
                false
            }
        }
    }
}
