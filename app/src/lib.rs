//! Folio Application
//!
//! Composition root wiring the exchange-rate service, the idle-session
//! monitor and the portfolio views together, plus the reporting used by
//! the `folio` command-line tool.

pub mod app;
pub mod config;
pub mod error;
pub mod local;
pub mod report;
pub mod state;

pub use app::{build_rate_provider, App};
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use local::LocalAuth;
pub use report::Report;
pub use state::AppState;
