//! Folio Portfolio
//!
//! Per-user asset records and the currency-aware views built on them:
//! summary totals, breakdowns, insights and CSV export. Every total is
//! converted through the shared [`FxEngine`](folio_fx::FxEngine) and
//! carries a `degraded` flag when rates were unavailable.

pub mod analytics;
pub mod export;
pub mod filter;
pub mod store;

pub use analytics::{
    breakdown, insights, summarize, Breakdown, BreakdownSlice, Dimension, Holding, Insights,
    PortfolioSummary,
};
pub use export::{to_csv, CsvExport};
pub use filter::AssetFilter;
pub use store::{AssetStore, InMemoryAssetStore};
