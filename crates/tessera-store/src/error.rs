//! Error types for key-value store operations.

/// Error type for key-value store operations.
///
/// Callers treat every variant as "the operation did not happen".
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("Store connection error: {0}")]
    Connection(String),

    /// The store rejected or failed a command.
    #[error("Store command error: {0}")]
    Command(String),

    /// A key holds a value of a different kind than the operation expects.
    #[error("Wrong value type for key: {0}")]
    WrongType(String),
}

/// Result type for key-value store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
