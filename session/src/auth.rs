//! Authentication collaborators consumed by the logout sequence.

use std::collections::HashMap;

use async_trait::async_trait;
use folio_common::UserId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::SessionResult;

/// Signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: Option<String>,
}

impl User {
    pub fn new(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            email: None,
        }
    }
}

/// A way to end the user's session with the backend.
#[async_trait]
pub trait SignOut: Send + Sync {
    async fn sign_out(&self) -> SessionResult<()>;
}

/// Authentication provider.
#[async_trait]
pub trait AuthProvider: SignOut {
    /// Currently signed-in user, if any.
    async fn current_user(&self) -> Option<User>;

    /// Stream of user-presence changes. The receiver starts at the current user.
    fn subscribe(&self) -> watch::Receiver<Option<User>>;
}

/// Locally cached auth state.
pub trait TokenStore: Send + Sync {
    fn remove(&self, key: &str);
}

/// Moves the user to another page.
pub trait Navigator: Send + Sync {
    fn redirect(&self, path: &str);
}

/// In-process token store.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<HashMap<String, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        self.tokens.lock().insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.tokens.lock().get(key).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.lock().is_empty()
    }
}

impl TokenStore for MemoryTokenStore {
    fn remove(&self, key: &str) {
        self.tokens.lock().remove(key);
    }
}

/// Navigator that only logs redirects.
pub struct LoggingNavigator;

impl Navigator for LoggingNavigator {
    fn redirect(&self, path: &str) {
        tracing::info!(path = %path, "Redirect requested");
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub use fakes::{FakeAuth, RecordingNavigator};

#[cfg(any(test, feature = "test-utils"))]
mod fakes {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::error::SessionError;

    /// Auth provider with scripted sign-out behaviour.
    ///
    /// A successful sign-out publishes "no user", like a real provider.
    pub struct FakeAuth {
        user: watch::Sender<Option<User>>,
        sign_out_calls: AtomicUsize,
        failing: AtomicBool,
        delay: Mutex<Duration>,
    }

    impl FakeAuth {
        pub fn signed_out() -> Self {
            Self {
                user: watch::channel(None).0,
                sign_out_calls: AtomicUsize::new(0),
                failing: AtomicBool::new(false),
                delay: Mutex::new(Duration::ZERO),
            }
        }

        pub fn signed_in(user: User) -> Self {
            let auth = Self::signed_out();
            auth.set_user(Some(user));
            auth
        }

        pub fn set_user(&self, user: Option<User>) {
            self.user.send_replace(user);
        }

        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        pub fn set_delay(&self, delay: Duration) {
            *self.delay.lock() = delay;
        }

        pub fn sign_out_calls(&self) -> usize {
            self.sign_out_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SignOut for FakeAuth {
        async fn sign_out(&self) -> SessionResult<()> {
            self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
            let delay = *self.delay.lock();

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            if self.failing.load(Ordering::SeqCst) {
                return Err(SessionError::SignOutFailed("backend unavailable".to_string()));
            }

            self.set_user(None);
            Ok(())
        }
    }

    #[async_trait]
    impl AuthProvider for FakeAuth {
        async fn current_user(&self) -> Option<User> {
            self.user.borrow().clone()
        }

        fn subscribe(&self) -> watch::Receiver<Option<User>> {
            self.user.subscribe()
        }
    }

    /// Navigator that records every redirect.
    #[derive(Default)]
    pub struct RecordingNavigator {
        paths: Mutex<Vec<String>>,
    }

    impl RecordingNavigator {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn paths(&self) -> Vec<String> {
            self.paths.lock().clone()
        }
    }

    impl Navigator for RecordingNavigator {
        fn redirect(&self, path: &str) {
            self.paths.lock().push(path.to_string());
        }
    }
}
