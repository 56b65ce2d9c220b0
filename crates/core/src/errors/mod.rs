//! Error types and Result alias for the Tapcoin backend

use thiserror::Error;

/// Main error type for the Tapcoin backend
#[derive(Error, Debug)]
pub enum Error {
    #[error("User not found: {0}")]
    UserNotFound(i64),

    #[error("Task not found: {0}")]
    TaskNotFound(i64),

    #[error("Already done: {0}")]
    AlreadyDone(String),

    #[error("Already claimed today")]
    AlreadyClaimedToday,

    #[error("Nothing to claim")]
    NothingToClaim,

    #[error("Task is already in progress")]
    InProgress,

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: i64, available: i64 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unknown task condition: {0}")]
    UnknownCondition(String),

    #[error("External check failed: {0}")]
    ExternalCheckFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Record was modified concurrently")]
    ConcurrentUpdate,
}

impl Error {
    /// True for idempotency/state-guard rejections that are expected user
    /// flows ("already claimed today") rather than real failures. Callers
    /// surface these as normal responses instead of propagating them.
    pub fn is_state_guard(&self) -> bool {
        matches!(
            self,
            Error::AlreadyDone(_)
                | Error::AlreadyClaimedToday
                | Error::NothingToClaim
                | Error::InProgress
        )
    }
}

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::ExternalCheckFailed(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidInput(err.to_string())
    }
}
