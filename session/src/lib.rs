//! Folio Session Library
//!
//! Automatic logout after a period of inactivity. The host environment
//! feeds interaction and visibility events to an [`IdleMonitor`]; when the
//! idle budget runs out the monitor runs one best-effort logout sequence
//! through the injected auth collaborators.

pub mod auth;
pub mod config;
pub mod error;
pub mod events;
pub mod idle;
pub mod logout;
pub mod monitor;

pub use auth::{
    AuthProvider, LoggingNavigator, MemoryTokenStore, Navigator, SignOut, TokenStore, User,
};
pub use config::{ActivityPolicy, IdleConfig};
pub use error::{SessionError, SessionResult};
pub use events::{HostEvent, InteractionKind, Visibility};
pub use idle::{Decision, IdleSession, MonitorState};
pub use logout::{LogoutExecutor, LogoutOutcome};
pub use monitor::{IdleMonitor, MonitorHandle};

#[cfg(any(test, feature = "test-utils"))]
pub use auth::{FakeAuth, RecordingNavigator};
