//! Auth provider for a single local user.

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::info;

use folio_session::{AuthProvider, SessionResult, SignOut, User};

/// Keeps one local user signed in until [`SignOut::sign_out`] is called.
///
/// Used by the command-line tool, which has no remote auth backend.
pub struct LocalAuth {
    user: watch::Sender<Option<User>>,
}

impl LocalAuth {
    /// Sign in `user`.
    pub fn signed_in(user: User) -> Self {
        Self {
            user: watch::channel(Some(user)).0,
        }
    }

    /// Sign in the operating-system user, or `local` when unknown.
    pub fn from_env() -> Self {
        let name = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "local".to_string());
        Self::signed_in(User::new(name))
    }
}

#[async_trait]
impl SignOut for LocalAuth {
    async fn sign_out(&self) -> SessionResult<()> {
        if let Some(user) = self.user.send_replace(None) {
            info!(user_id = %user.id, "Local user signed out");
        }
        Ok(())
    }
}

#[async_trait]
impl AuthProvider for LocalAuth {
    async fn current_user(&self) -> Option<User> {
        self.user.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.user.subscribe()
    }
}
