//! Idle-session state machine.
//!
//! [`IdleSession`] holds no timers. The caller supplies the current instant
//! and arms a single timer at [`IdleSession::deadline`]; this keeps every
//! transition testable with plain instants.

use std::time::Duration;

use folio_common::UserId;
use serde::Serialize;
use tokio::time::Instant;

use crate::events::Visibility;

/// Observable monitor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MonitorState {
    /// No session, no timer.
    Inactive,
    /// Tab visible, timer armed.
    Active,
    /// Tab hidden, timer still armed.
    Idle,
    /// Logout sequence running.
    LoggingOut,
}

/// What the caller must do after feeding the session an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Keep waiting for the deadline.
    Continue,
    /// Run the logout sequence. Returned at most once per session.
    Logout,
}

/// Inactivity tracking for one signed-in user.
#[derive(Debug, Clone)]
pub struct IdleSession {
    user: UserId,
    last_activity_at: Instant,
    idle_timeout: Duration,
    visibility: Visibility,
    logging_out: bool,
}

impl IdleSession {
    /// Start a session for `user` at `now`, counting it as activity.
    pub fn start(user: UserId, now: Instant, idle_timeout: Duration, visibility: Visibility) -> Self {
        Self {
            user,
            last_activity_at: now,
            idle_timeout,
            visibility,
            logging_out: false,
        }
    }

    /// User the session belongs to.
    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn state(&self) -> MonitorState {
        if self.logging_out {
            return MonitorState::LoggingOut;
        }

        match self.visibility {
            Visibility::Visible => MonitorState::Active,
            Visibility::Hidden => MonitorState::Idle,
        }
    }

    /// Instant at which the idle budget runs out, unless logout has begun.
    pub fn deadline(&self) -> Option<Instant> {
        (!self.logging_out).then(|| self.last_activity_at + self.idle_timeout)
    }

    /// Time since the last qualifying activity.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity_at)
    }

    /// Record a qualifying interaction. Ignored once logout has begun.
    pub fn record_activity(&mut self, now: Instant) -> bool {
        if self.logging_out {
            return false;
        }

        self.last_activity_at = self.last_activity_at.max(now);
        true
    }

    /// Apply a visibility change.
    ///
    /// Becoming visible after the budget ran out logs out immediately.
    /// Otherwise the deadline stays at `last_activity_at + idle_timeout`.
    pub fn set_visibility(&mut self, visibility: Visibility, now: Instant) -> Decision {
        self.visibility = visibility;

        if visibility == Visibility::Visible && self.is_expired(now) {
            return self.begin_logout();
        }

        Decision::Continue
    }

    /// Check the deadline at `now`.
    pub fn check(&mut self, now: Instant) -> Decision {
        if self.is_expired(now) {
            return self.begin_logout();
        }

        Decision::Continue
    }

    /// Request logout regardless of the deadline.
    pub fn request_logout(&mut self) -> Decision {
        self.begin_logout()
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.idle_for(now) >= self.idle_timeout
    }

    fn begin_logout(&mut self) -> Decision {
        if self.logging_out {
            return Decision::Continue;
        }

        self.logging_out = true;
        Decision::Logout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(1000);

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn user() -> UserId {
        UserId::new("user-1")
    }

    #[test]
    fn test_deadline_follows_last_activity() {
        let t0 = Instant::now();
        let mut session = IdleSession::start(user(), t0, TIMEOUT, Visibility::Visible);

        assert_eq!(session.state(), MonitorState::Active);
        assert_eq!(session.deadline(), Some(t0 + ms(1000)));

        assert!(session.record_activity(t0 + ms(900)));
        assert_eq!(session.check(t0 + ms(1000)), Decision::Continue);
        assert_eq!(session.deadline(), Some(t0 + ms(1900)));
        assert_eq!(session.check(t0 + ms(1900)), Decision::Logout);
    }

    #[test]
    fn test_visibility_catch_up_logs_out_immediately() {
        let t0 = Instant::now();
        let mut session = IdleSession::start(user(), t0, TIMEOUT, Visibility::Visible);

        assert_eq!(session.set_visibility(Visibility::Hidden, t0), Decision::Continue);
        assert_eq!(session.state(), MonitorState::Idle);

        assert_eq!(
            session.set_visibility(Visibility::Visible, t0 + ms(1500)),
            Decision::Logout
        );
        assert_eq!(session.state(), MonitorState::LoggingOut);
        assert_eq!(session.deadline(), None);
    }

    #[test]
    fn test_visible_again_keeps_remaining_budget() {
        let t0 = Instant::now();
        let mut session = IdleSession::start(user(), t0, TIMEOUT, Visibility::Visible);

        session.set_visibility(Visibility::Hidden, t0 + ms(200));
        let decision = session.set_visibility(Visibility::Visible, t0 + ms(600));

        assert_eq!(decision, Decision::Continue);
        assert_eq!(session.state(), MonitorState::Active);
        assert_eq!(session.deadline(), Some(t0 + ms(1000)));
    }

    #[test]
    fn test_logout_decided_once() {
        let t0 = Instant::now();
        let mut session = IdleSession::start(user(), t0, TIMEOUT, Visibility::Hidden);

        assert_eq!(session.check(t0 + ms(1000)), Decision::Logout);
        assert_eq!(
            session.set_visibility(Visibility::Visible, t0 + ms(1001)),
            Decision::Continue
        );
        assert_eq!(session.request_logout(), Decision::Continue);
        assert!(!session.record_activity(t0 + ms(1002)));
    }
}
