//! FX engine error types.

use folio_common::Currency;
use std::fmt;
use thiserror::Error;

/// Why no usable rate exists for a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnavailableReason {
    /// No snapshot has been loaded, or the last fetch failed.
    NotLoaded,
    /// The snapshot is older than the configured TTL.
    Stale,
    /// The snapshot has no rate for this currency.
    MissingRate(Currency),
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnavailableReason::NotLoaded => write!(f, "rates not loaded"),
            UnavailableReason::Stale => write!(f, "cached rates are stale"),
            UnavailableReason::MissingRate(currency) => write!(f, "no rate for {}", currency),
        }
    }
}

/// Errors that can occur in the FX engine.
///
/// `Clone` so a single fetch outcome can be handed to every caller waiting
/// on it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FxError {
    /// No valid snapshot to convert with.
    #[error("Exchange rates not available: {0}")]
    RatesUnavailable(UnavailableReason),

    /// A refresh cycle failed; no snapshot was applied.
    #[error("Failed to fetch exchange rates: {0}")]
    RateFetchFailed(String),

    /// Provider returned an error or an unreadable response.
    #[error("Rate provider error: {0}")]
    ProviderError(String),

    /// Provider returned a rate that is not a positive finite number.
    #[error("Invalid rate {rate} for {currency}")]
    InvalidRate { currency: Currency, rate: f64 },

    /// Invalid engine or provider configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Result type for FX operations.
pub type FxResult<T> = Result<T, FxError>;
