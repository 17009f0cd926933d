//! Application error types.

use thiserror::Error;

use folio_common::FolioError;
use folio_fx::FxError;
use folio_session::SessionError;

use crate::state::AppState;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Operation not allowed in state {0:?}")]
    InvalidState(AppState),

    #[error(transparent)]
    Portfolio(#[from] FolioError),

    #[error(transparent)]
    Rates(#[from] FxError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Result type for application operations.
pub type AppResult<T> = std::result::Result<T, AppError>;
