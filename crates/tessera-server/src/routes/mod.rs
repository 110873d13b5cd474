//! API routes.

pub mod admin;
pub mod health;
pub mod session;

pub use admin::{
    InvalidatedResponse, IssueSessionRequest, ValidResponse, delete_session_handler,
    delete_user_session_handler, get_session_handler, invalidate_roles_handler,
    invalidate_user_roles_handler, issue_session_handler, refresh_session_handler,
    session_valid_handler,
};
pub use health::{HealthResponse, health_routes};
pub use session::{LogoutResponse, RefreshResponse, logout_handler, me_handler, refresh_handler};
