//! Session error types.

use thiserror::Error;

/// Errors raised by session collaborators.
///
/// None of these escape the logout sequence; they are logged and the
/// sequence moves on to its next fallback.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Sign-out failed: {0}")]
    SignOutFailed(String),

    #[error("Idle monitor is not running")]
    MonitorClosed,

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Result type for session operations.
pub type SessionResult<T> = std::result::Result<T, SessionError>;
