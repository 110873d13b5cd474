//! Session and admin authentication middleware.
//!
//! # Security
//!
//! Admin token comparison uses constant-time comparison to prevent timing
//! attacks.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tessera_session::SessionRecord;
use tracing::debug;

use crate::state::AppState;

// ─────────────────────────────────────────────────────────────────────────────
// Claims
// ─────────────────────────────────────────────────────────────────────────────

/// Claims of the session that authenticated a request.
///
/// Inserted into request extensions by [`session_middleware`]:
///
/// ```ignore
/// async fn my_handler(Extension(claims): Extension<SessionClaims>) -> String {
///     format!("Hello, {}", claims.username)
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub token: String,
    pub user_id: String,
    pub username: String,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

impl SessionClaims {
    /// Check whether the session carries a role code.
    pub fn has_role(&self, code: &str) -> bool {
        self.roles.iter().any(|r| r == code)
    }
}

impl From<SessionRecord> for SessionClaims {
    fn from(record: SessionRecord) -> Self {
        Self {
            token: record.token,
            user_id: record.user_id,
            username: record.username,
            roles: record.roles,
            permissions: record.permissions,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Auth Error
// ─────────────────────────────────────────────────────────────────────────────

/// Authentication error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Missing authorization header.
    MissingToken,
    /// Invalid authorization format.
    InvalidFormat,
    /// Session not found, expired or stale.
    InvalidToken,
    /// Missing admin token header.
    MissingAdminToken,
    /// Admin token does not match.
    InvalidAdminToken,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for AuthError {}

impl AuthError {
    fn message(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "Missing authorization token",
            AuthError::InvalidFormat => "Invalid authorization format",
            AuthError::InvalidToken => "Token invalid or expired",
            AuthError::MissingAdminToken => "Missing admin token",
            AuthError::InvalidAdminToken => "Invalid admin token",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingToken | AuthError::InvalidToken | AuthError::MissingAdminToken => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::InvalidFormat => StatusCode::BAD_REQUEST,
            AuthError::InvalidAdminToken => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = serde_json::json!({
            "error": self.message(),
            "code": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Header carrying the admin token.
pub const ADMIN_TOKEN_HEADER: &str = "X-Admin-Token";

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Compare two strings in constant time.
///
/// A length mismatch still performs a comparison of equal cost before
/// returning false.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();

    if a_bytes.len() == b_bytes.len() {
        a_bytes.ct_eq(b_bytes).into()
    } else {
        let _ = a_bytes.ct_eq(a_bytes);
        false
    }
}

/// Extract the bearer token from the `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let header = headers.get(AUTHORIZATION).ok_or(AuthError::MissingToken)?;
    let value = header.to_str().map_err(|_| AuthError::InvalidFormat)?;
    let token = value
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidFormat)?
        .trim();
    if token.is_empty() {
        return Err(AuthError::InvalidFormat);
    }
    Ok(token)
}

// ─────────────────────────────────────────────────────────────────────────────
// Middleware
// ─────────────────────────────────────────────────────────────────────────────

/// Session middleware.
///
/// Validates the bearer token and injects [`SessionClaims`] into request
/// extensions. Downstream handlers never run for a missing or dead session.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(request.headers())?.to_string();

    let Some(record) = state.sessions().validate(&token).await else {
        debug!("Rejected request with invalid session");
        return Err(AuthError::InvalidToken);
    };

    request.extensions_mut().insert(SessionClaims::from(record));
    Ok(next.run(request).await)
}

/// Admin middleware. Requires [`ADMIN_TOKEN_HEADER`] to match the configured
/// admin token.
pub async fn admin_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    // Admin routes are only mounted with a token, but fail closed anyway.
    let Some(expected) = state.config().admin_token.as_deref() else {
        return Err(AuthError::InvalidAdminToken);
    };

    let provided = request
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .ok_or(AuthError::MissingAdminToken)?
        .to_str()
        .map_err(|_| AuthError::InvalidAdminToken)?;

    if !constant_time_eq(provided, expected) {
        return Err(AuthError::InvalidAdminToken);
    }
    Ok(next.run(request).await)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
