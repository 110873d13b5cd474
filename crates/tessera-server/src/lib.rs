//! HTTP boundary for tessera sessions.
//!
//! Resolves each caller's address and browser fingerprint, authenticates
//! bearer session tokens, and exposes sign-out, refresh and administrative
//! session and role-cache operations.
//!
//! # Routes
//!
//! - `GET /health`
//! - `POST /api/auth/logout`
//! - `POST /api/auth/refresh`, `GET /api/auth/me` (session token)
//! - `/api/admin/...` (admin token, mounted only when one is configured)
//!
//! # Example
//!
//! ```ignore
//! use tessera_server::{AppState, Server, ServerConfig};
//!
//! let config = ServerConfig::new(Some("admin-secret".to_string()))
//!     .with_bind_address("127.0.0.1:8090".parse()?);
//!
//! let server = Server::from_state(AppState::new(service, config));
//! server.run().await?;
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod routes;
pub mod state;

pub use auth::{ADMIN_TOKEN_HEADER, AuthError, SessionClaims, admin_middleware, session_middleware};
pub use client::ClientInfo;
pub use config::{DEFAULT_BIND_ADDRESS, ServerConfig};
pub use error::{Result, ServerError};
pub use logging::request_logging_middleware;
pub use state::AppState;

use std::net::SocketAddr;

use axum::{Router, middleware};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// The tessera HTTP server.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a server from a pre-built application state.
    pub fn from_state(state: AppState) -> Self {
        Self { state }
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        let mut router = Router::new()
            .merge(routes::health_routes())
            .nest("/api/auth", self.session_routes());

        if self.state.config.admin_token.is_some() {
            router = router.nest("/api/admin", self.admin_routes());
        }

        router
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                logging::request_logging_middleware,
            ))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Caller-facing session routes.
    fn session_routes(&self) -> Router<AppState> {
        use axum::routing::{get, post};

        Router::new()
            .route("/refresh", post(routes::refresh_handler))
            .route("/me", get(routes::me_handler))
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                auth::session_middleware,
            ))
            // Outside the session middleware: logout also sweeps dead tokens
            .route("/logout", post(routes::logout_handler))
    }

    /// Routes authenticated by the admin token.
    fn admin_routes(&self) -> Router<AppState> {
        use axum::routing::{delete, get, post};

        Router::new()
            .route("/sessions", post(routes::issue_session_handler))
            .route(
                "/sessions/{token}",
                get(routes::get_session_handler).delete(routes::delete_session_handler),
            )
            .route("/sessions/{token}/valid", get(routes::session_valid_handler))
            .route(
                "/sessions/{token}/refresh",
                post(routes::refresh_session_handler),
            )
            .route(
                "/users/{username}/session",
                delete(routes::delete_user_session_handler),
            )
            .route("/roles/cache", delete(routes::invalidate_roles_handler))
            .route(
                "/roles/cache/{user_id}",
                delete(routes::invalidate_user_roles_handler),
            )
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                auth::admin_middleware,
            ))
    }

    /// Run the server on the configured bind address.
    pub async fn run(self) -> Result<()> {
        let addr = self.bind_address();
        let router = self.router();

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Internal(format!("Failed to bind: {}", e)))?;

        info!(%addr, admin = self.state.config.admin_token.is_some(), "Starting server");

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .map_err(|e| ServerError::Internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Get the configured bind address.
    pub fn bind_address(&self) -> SocketAddr {
        self.state.config.bind_address
    }
}
