//! Best-effort logout sequence.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::auth::{AuthProvider, Navigator, SignOut, TokenStore};
use crate::config::IdleConfig;

/// Result of one logout attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutOutcome {
    /// A sign-out path succeeded; redirected to the login page.
    Completed,
    /// Every sign-out path failed; redirected to the forced-logout page.
    Forced,
    /// Another logout sequence was already running; nothing was done.
    AlreadyInProgress,
}

/// Runs the logout sequence at most once per session.
///
/// Sign-out errors never escape: the sequence always ends with local auth
/// tokens cleared and a redirect away from the authenticated area.
pub struct LogoutExecutor {
    primary: Arc<dyn AuthProvider>,
    fallback: Option<Arc<dyn SignOut>>,
    tokens: Arc<dyn TokenStore>,
    navigator: Arc<dyn Navigator>,
    login_path: String,
    forced_logout_path: String,
    token_keys: Vec<String>,
    in_progress: AtomicBool,
}

impl LogoutExecutor {
    /// Create an executor with no fallback sign-out path.
    pub fn new(
        config: &IdleConfig,
        primary: Arc<dyn AuthProvider>,
        tokens: Arc<dyn TokenStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            primary,
            fallback: None,
            tokens,
            navigator,
            login_path: config.login_path.clone(),
            forced_logout_path: config.forced_logout_path.clone(),
            token_keys: config.auth_token_keys.clone(),
            in_progress: AtomicBool::new(false),
        }
    }

    /// Sign-out path tried when the primary one fails.
    pub fn with_fallback(mut self, fallback: Arc<dyn SignOut>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Re-arm the guard for a fresh session.
    pub fn reset(&self) {
        self.in_progress.store(false, Ordering::SeqCst);
    }

    /// Run the logout sequence.
    ///
    /// Calls made while a sequence is running, or after one finished and
    /// before [`reset`](Self::reset), are no-ops.
    #[instrument(skip(self))]
    pub async fn perform(&self) -> LogoutOutcome {
        if self.in_progress.swap(true, Ordering::SeqCst) {
            info!("Logout already in progress, skipping");
            return LogoutOutcome::AlreadyInProgress;
        }

        info!("Starting logout");
        let signed_out = self.sign_out().await;

        for key in &self.token_keys {
            self.tokens.remove(key);
        }

        if signed_out {
            self.navigator.redirect(&self.login_path);
            info!(path = %self.login_path, "Logout completed");
            LogoutOutcome::Completed
        } else {
            self.navigator.redirect(&self.forced_logout_path);
            warn!(path = %self.forced_logout_path, "Sign-out failed, forcing logout");
            LogoutOutcome::Forced
        }
    }

    async fn sign_out(&self) -> bool {
        let error = match self.primary.sign_out().await {
            Ok(()) => return true,
            Err(e) => e,
        };

        let Some(fallback) = &self.fallback else {
            warn!(error = %error, "Sign-out failed and no fallback is configured");
            return false;
        };

        warn!(error = %error, "Sign-out failed, trying fallback");
        match fallback.sign_out().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Fallback sign-out failed");
                false
            }
        }
    }
}
