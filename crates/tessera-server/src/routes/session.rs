//! Caller-facing session endpoints under `/api/auth`.

use axum::{
    Extension, Json,
    extract::State,
    http::HeaderMap,
};
use serde::{Deserialize, Serialize};

use crate::auth::{AuthError, SessionClaims, bearer_token};
use crate::error::{Result, ServerError};
use crate::state::AppState;

/// Response for a successful refresh.
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub token: String,
    /// RFC 3339 timestamp of the new absolute expiry.
    pub expires_at: String,
}

/// Response for a logout.
#[derive(Debug, Serialize, Deserialize)]
pub struct LogoutResponse {
    /// Whether the token still named a live session.
    pub signed_out: bool,
}

/// POST /api/auth/refresh - extend the caller's session.
pub async fn refresh_handler(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
) -> Result<Json<RefreshResponse>> {
    let record = state
        .sessions()
        .refresh(&claims.token)
        .await
        .ok_or_else(|| ServerError::Unauthorized("session could not be refreshed".into()))?;

    Ok(Json(RefreshResponse {
        token: record.token,
        expires_at: record.expires_at.to_rfc3339(),
    }))
}

/// POST /api/auth/logout - end every session of the caller.
///
/// Not behind the session middleware: a token that no longer validates is
/// still swept from the indices.
pub async fn logout_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> std::result::Result<Json<LogoutResponse>, AuthError> {
    let token = bearer_token(&headers)?;
    let signed_out = state.service.sign_out(token).await;
    Ok(Json(LogoutResponse { signed_out }))
}

/// GET /api/auth/me - claims of the caller's session.
pub async fn me_handler(Extension(claims): Extension<SessionClaims>) -> Json<SessionClaims> {
    Json(claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{body_json, issue, test_state};
    use crate::Server;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    fn post(uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("Authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_me_returns_claims() {
        let state = test_state();
        let token = issue(&state, "u1", "alice").await;
        let app = Server::from_state(state).router();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/auth/me")
                    .header("Authorization", format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let claims: SessionClaims = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(claims.user_id, "u1");
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.token, token);
    }

    #[tokio::test]
    async fn test_refresh_extends_session() {
        let state = test_state();
        let token = issue(&state, "u1", "alice").await;
        let before = state.sessions().validate(&token).await.unwrap();
        let app = Server::from_state(state.clone()).router();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let response = app.oneshot(post("/api/auth/refresh", &token)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let after = state.sessions().validate(&token).await.unwrap();
        assert!(after.expires_at > before.expires_at);
    }

    #[tokio::test]
    async fn test_logout_ends_all_sessions() {
        let state = test_state();
        let first = issue(&state, "u1", "alice").await;
        let second = state
            .sessions()
            .issue_session(tessera_session::SessionRequest::new("u1", "alice").with_browser("b2"))
            .await
            .unwrap();
        let app = Server::from_state(state.clone()).router();

        let response = app
            .clone()
            .oneshot(post("/api/auth/logout", &second))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["signed_out"], true);

        assert!(!state.sessions().is_valid(&first).await);
        assert!(!state.sessions().is_valid(&second).await);

        // Logging out again is harmless.
        let response = app.oneshot(post("/api/auth/logout", &second)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["signed_out"], false);
    }

    #[tokio::test]
    async fn test_logout_requires_bearer() {
        let app = Server::from_state(test_state()).router();
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/auth/logout")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
