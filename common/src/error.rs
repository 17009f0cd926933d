//! Error types shared across Folio crates.

use crate::AssetId;
use thiserror::Error;

/// Main error type for Folio asset operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FolioError {
    /// Asset does not exist or is not owned by the caller.
    #[error("Asset not found: {0}")]
    AssetNotFound(AssetId),

    /// Asset record failed validation.
    #[error("Invalid asset: {message}")]
    InvalidAsset {
        message: String,
        field: Option<String>,
    },

    /// Currency code outside the supported set.
    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),
}

impl FolioError {
    /// Create a validation error for a specific field.
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        FolioError::InvalidAsset {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

/// Result type alias for Folio operations.
pub type Result<T> = std::result::Result<T, FolioError>;
