//! Administrative endpoints under `/api/admin`, guarded by the admin token.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tessera_session::{IssuedSession, SessionRecord, VerifiedUser};
use tracing::info;

use crate::client::ClientInfo;
use crate::error::{Result, ServerError};
use crate::state::AppState;

/// Body of POST /api/admin/sessions.
///
/// Sent by a trusted authentication service after it has verified the
/// user's credentials. Browser and address default to those of the request.
#[derive(Debug, Serialize, Deserialize)]
pub struct IssueSessionRequest {
    pub user_id: String,
    pub username: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub browser_id: Option<String>,
    #[serde(default)]
    pub source_address: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidResponse {
    pub valid: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InvalidatedResponse {
    pub invalidated_users: usize,
}

/// POST /api/admin/sessions - issue a session for a verified user.
pub async fn issue_session_handler(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(body): Json<IssueSessionRequest>,
) -> Result<(StatusCode, Json<IssuedSession>)> {
    let browser = body.browser_id.unwrap_or(client.fingerprint);
    let address = body.source_address.unwrap_or(client.address);
    let user = VerifiedUser::new(body.user_id, body.username).with_permissions(body.permissions);

    let issued = state
        .service
        .sign_in(user, Some(&browser), Some(&address))
        .await?;
    Ok((StatusCode::CREATED, Json(issued)))
}

/// GET /api/admin/sessions/{token}
pub async fn get_session_handler(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<SessionRecord>> {
    state
        .sessions()
        .validate(&token)
        .await
        .map(Json)
        .ok_or_else(|| ServerError::NotFound("session".into()))
}

/// GET /api/admin/sessions/{token}/valid
pub async fn session_valid_handler(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Json<ValidResponse> {
    Json(ValidResponse {
        valid: state.sessions().is_valid(&token).await,
    })
}

/// POST /api/admin/sessions/{token}/refresh
pub async fn refresh_session_handler(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<SessionRecord>> {
    state
        .sessions()
        .refresh(&token)
        .await
        .map(Json)
        .ok_or_else(|| ServerError::NotFound("session".into()))
}

/// DELETE /api/admin/sessions/{token}
pub async fn delete_session_handler(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> StatusCode {
    state.sessions().delete(&token).await;
    StatusCode::NO_CONTENT
}

/// DELETE /api/admin/users/{username}/session
pub async fn delete_user_session_handler(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> StatusCode {
    state.sessions().delete_by_username(&username).await;
    info!(username = %username, "Forced sign-out");
    StatusCode::NO_CONTENT
}

/// DELETE /api/admin/roles/cache - drop every cached role entry.
pub async fn invalidate_roles_handler(State(state): State<AppState>) -> Json<InvalidatedResponse> {
    let invalidated_users = state.roles().invalidate_all_users().await;
    state.roles().invalidate_catalog().await;
    Json(InvalidatedResponse { invalidated_users })
}

/// DELETE /api/admin/roles/cache/{user_id}
pub async fn invalidate_user_roles_handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> StatusCode {
    state.roles().invalidate_user(&user_id).await;
    StatusCode::NO_CONTENT
}
