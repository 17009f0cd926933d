//! Idle monitor configuration.

use std::str::FromStr;
use std::time::Duration;

use folio_common::{constants, parse_secs};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::events::InteractionKind;

/// Which interactions count as user activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityPolicy {
    /// Pointer-down, key-down and touch-start only.
    #[default]
    Strict,
    /// Strict plus mouse movement and scrolling.
    Loose,
}

impl ActivityPolicy {
    /// Check if an interaction resets the idle timer.
    pub fn qualifies(&self, kind: InteractionKind) -> bool {
        match self {
            Self::Strict => kind.is_explicit(),
            Self::Loose => true,
        }
    }
}

impl FromStr for ActivityPolicy {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "loose" => Ok(Self::Loose),
            other => Err(SessionError::Configuration(format!(
                "unknown activity policy: {}",
                other
            ))),
        }
    }
}

/// Configuration for the idle monitor and its logout sequence.
#[derive(Debug, Clone)]
pub struct IdleConfig {
    /// Inactivity budget before logout.
    pub idle_timeout: Duration,
    /// Qualifying interaction set.
    pub policy: ActivityPolicy,
    /// Redirect target after logout.
    pub login_path: String,
    /// Redirect target when every sign-out path failed.
    pub forced_logout_path: String,
    /// Locally cached auth token keys cleared on logout.
    pub auth_token_keys: Vec<String>,
    /// Capacity of the host event channel.
    pub event_buffer: usize,
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            idle_timeout: constants::IDLE_TIMEOUT,
            policy: ActivityPolicy::Strict,
            login_path: "/login".to_string(),
            forced_logout_path: "/login?forcedLogout=true".to_string(),
            auth_token_keys: vec![
                "sb-auth-token".to_string(),
                "supabase.auth.token".to_string(),
            ],
            event_buffer: 64,
        }
    }
}

impl IdleConfig {
    /// Default configuration with a custom timeout.
    pub fn with_timeout(idle_timeout: Duration) -> Self {
        Self {
            idle_timeout,
            ..Default::default()
        }
    }

    /// Set the qualifying interaction policy.
    pub fn policy(mut self, policy: ActivityPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(timeout) = std::env::var("FOLIO_IDLE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| parse_secs(&v))
        {
            config.idle_timeout = timeout;
        }

        if let Some(policy) = std::env::var("FOLIO_IDLE_POLICY")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.policy = policy;
        }

        if let Ok(path) = std::env::var("FOLIO_LOGIN_PATH") {
            config.login_path = path;
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.idle_timeout.is_zero() {
            return Err("Idle timeout cannot be zero".to_string());
        }

        if self.login_path.is_empty() || self.forced_logout_path.is_empty() {
            return Err("Logout redirect paths cannot be empty".to_string());
        }

        if self.event_buffer == 0 {
            return Err("Event buffer cannot be zero".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_strict_policy_ignores_passive_events() {
        let strict = ActivityPolicy::Strict;
        assert!(strict.qualifies(InteractionKind::KeyDown));
        assert!(!strict.qualifies(InteractionKind::MouseMove));
        assert!(!strict.qualifies(InteractionKind::Scroll));

        assert!(ActivityPolicy::Loose.qualifies(InteractionKind::Scroll));
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!(assert_ok!(" Loose ".parse::<ActivityPolicy>()), ActivityPolicy::Loose);
        assert_err!("sometimes".parse::<ActivityPolicy>());
    }

    #[test]
    fn test_validation() {
        assert_ok!(IdleConfig::default().validate());
        assert_err!(IdleConfig::with_timeout(Duration::ZERO).validate());
    }
}
