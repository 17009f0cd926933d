//! Events delivered by the host environment.

use serde::{Deserialize, Serialize};

/// Kind of user interaction reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    PointerDown,
    KeyDown,
    TouchStart,
    MouseMove,
    Scroll,
}

impl InteractionKind {
    /// Explicit input; movement and scrolling are passive.
    pub fn is_explicit(&self) -> bool {
        matches!(self, Self::PointerDown | Self::KeyDown | Self::TouchStart)
    }
}

/// Visibility of the page hosting the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
}

/// Event fed to the idle monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum HostEvent {
    /// The user interacted with the page.
    Interaction(InteractionKind),
    /// The page became visible or hidden.
    Visibility(Visibility),
    /// The user asked to sign out.
    LogoutRequested,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_event_json() {
        let event: HostEvent =
            serde_json::from_str(r#"{"type":"interaction","value":"pointerdown"}"#).unwrap();
        assert_eq!(event, HostEvent::Interaction(InteractionKind::PointerDown));

        let event: HostEvent = serde_json::from_str(r#"{"type":"logoutRequested"}"#).unwrap();
        assert_eq!(event, HostEvent::LogoutRequested);
    }
}
