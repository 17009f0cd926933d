//! Application lifecycle state.

use serde::Serialize;

/// Application operational state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AppState {
    /// Created, background services not started.
    Starting,
    /// Rate refresh and idle monitor running.
    Running,
    /// Stopping background services.
    ShuttingDown,
    /// Stopped; cannot be restarted.
    Stopped,
}

impl AppState {
    /// Check if background services are running.
    pub fn is_operational(&self) -> bool {
        matches!(self, AppState::Running)
    }

    /// Check if the application is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppState::Stopped)
    }
}
