//! Error types for session and role-cache operations.

use tessera_store::StoreError;

/// Error type for session and role-cache operations.
///
/// Validation, refresh and deletion never return these: they degrade to
/// "not found" and log instead.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The key-value store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A stored value could not be encoded or decoded.
    #[error("Codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// The authoritative role source failed or is not configured.
    #[error("Role source error: {0}")]
    RoleSource(String),

    /// The caller supplied an unusable request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Result type for session and role-cache operations.
pub type Result<T> = std::result::Result<T, SessionError>;
