//! Request logging middleware.

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::state::AppState;

/// Log method, path, status and latency of every request.
///
/// Paths are logged without their tail under `/api/admin/sessions/` so
/// tokens never reach the log.
pub async fn request_logging_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.config().request_logging {
        return next.run(request).await;
    }

    let method = request.method().clone();
    let path = redact_path(request.uri().path());
    let start = std::time::Instant::now();

    let response = next.run(request).await;

    let duration = start.elapsed();
    let status = response.status();

    if status.is_server_error() {
        tracing::error!(
            method = %method,
            path = %path,
            status = %status.as_u16(),
            duration_ms = %duration.as_millis(),
            "Request completed with server error"
        );
    } else if status.is_client_error() {
        tracing::warn!(
            method = %method,
            path = %path,
            status = %status.as_u16(),
            duration_ms = %duration.as_millis(),
            "Request completed with client error"
        );
    } else {
        tracing::info!(
            method = %method,
            path = %path,
            status = %status.as_u16(),
            duration_ms = %duration.as_millis(),
            "Request completed"
        );
    }

    response
}

const SESSION_PATH: &str = "/api/admin/sessions/";

fn redact_path(path: &str) -> String {
    match path.strip_prefix(SESSION_PATH) {
        Some(rest) if !rest.is_empty() => {
            let suffix = rest.split_once('/').map(|(_, tail)| tail);
            match suffix {
                Some(tail) => format!("{SESSION_PATH}{{token}}/{tail}"),
                None => format!("{SESSION_PATH}{{token}}"),
            }
        }
        _ => path.to_string(),
    }
}
