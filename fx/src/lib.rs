//! Folio FX Engine
//!
//! Exchange-rate cache and currency conversion for portfolio valuation.
//!
//! # Features
//!
//! - One shared rate snapshot per process, replaced wholesale
//! - Single-flight fetching: concurrent callers share one request set
//! - TTL-bounded freshness with a periodic background refresh
//! - Degraded raw-sum totals when rates are unavailable
//!
//! # Example
//!
//! ```rust,ignore
//! use folio_fx::{FxEngine, FxEngineConfig, HttpRateProvider, HttpProviderConfig};
//! use folio_common::{Currency, Money};
//!
//! let provider = Arc::new(HttpRateProvider::new(HttpProviderConfig::default())?);
//! let engine = FxEngine::new(provider, FxEngineConfig::default());
//! engine.init();
//!
//! engine.ensure_rates_loaded().await?;
//! let usd = engine.convert(100.0, Currency::Eur, Currency::Usd)?;
//! ```

pub mod cache;
pub mod conversion;
pub mod engine;
pub mod error;
pub mod provider;
pub mod snapshot;

pub use cache::{CacheStats, RateCache, RateCacheConfig};
pub use conversion::Valuation;
pub use engine::{FxEngine, FxEngineConfig, RateStatus};
pub use error::{FxError, FxResult, UnavailableReason};
pub use provider::{
    FallbackRateProvider, HttpProviderConfig, HttpRateProvider, RateApi, RateProvider,
};
pub use snapshot::RateSnapshot;

#[cfg(any(test, feature = "test-utils"))]
pub use provider::MockRateProvider;
