//! Idle monitor task.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, instrument};

use crate::auth::{AuthProvider, User};
use crate::config::IdleConfig;
use crate::error::{SessionError, SessionResult};
use crate::events::{HostEvent, Visibility};
use crate::idle::{Decision, IdleSession, MonitorState};
use crate::logout::LogoutExecutor;

/// Watches user activity and logs the user out when idle.
///
/// One monitor owns at most one session and one deadline. It runs as a
/// single task, so timer expiry, host events and presence changes are
/// handled strictly one at a time.
pub struct IdleMonitor {
    config: IdleConfig,
    auth: Arc<dyn AuthProvider>,
    logout: Arc<LogoutExecutor>,
}

impl IdleMonitor {
    /// Create a new idle monitor.
    pub fn new(config: IdleConfig, auth: Arc<dyn AuthProvider>, logout: Arc<LogoutExecutor>) -> Self {
        Self {
            config,
            auth,
            logout,
        }
    }

    /// Spawn the monitor task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(self) -> MonitorHandle {
        let (events_tx, events_rx) = mpsc::channel(self.config.event_buffer.max(1));
        let (state_tx, state_rx) = watch::channel(MonitorState::Inactive);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(self.run(events_rx, state_tx, shutdown_rx));

        MonitorHandle {
            events: events_tx,
            state: state_rx,
            shutdown: Some(shutdown_tx),
            task,
        }
    }

    #[instrument(name = "idle_monitor", skip_all)]
    async fn run(
        self,
        mut events: mpsc::Receiver<HostEvent>,
        state: watch::Sender<MonitorState>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        let mut presence = self.auth.subscribe();
        let mut visibility = Visibility::Visible;
        let mut session = None;

        let initial = presence.borrow_and_update().clone();
        self.on_presence(initial, &mut session, visibility, &state);

        loop {
            let deadline = session.as_ref().and_then(IdleSession::deadline);

            let decision = tokio::select! {
                _ = &mut shutdown => break,

                changed = presence.changed() => {
                    if changed.is_err() {
                        debug!("Auth provider closed");
                        break;
                    }
                    let user = presence.borrow_and_update().clone();
                    self.on_presence(user, &mut session, visibility, &state);
                    Decision::Continue
                }

                event = events.recv() => match event {
                    Some(event) => self.on_event(event, &mut session, &mut visibility),
                    None => break,
                },

                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    match session.as_mut() {
                        Some(s) => {
                            let decision = s.check(Instant::now());
                            if decision == Decision::Logout {
                                info!(
                                    idle_for = ?s.idle_for(Instant::now()),
                                    "Idle timeout reached"
                                );
                            }
                            decision
                        }
                        None => Decision::Continue,
                    }
                }
            };

            if decision == Decision::Logout {
                state.send_replace(MonitorState::LoggingOut);
                self.logout.perform().await;
                session = None;
            }

            publish(&state, session.as_ref());
        }

        publish(&state, None);
        debug!("Idle monitor stopped");
    }

    fn on_presence(
        &self,
        user: Option<User>,
        session: &mut Option<IdleSession>,
        visibility: Visibility,
        state: &watch::Sender<MonitorState>,
    ) {
        match user {
            Some(user) if session.as_ref().is_some_and(|s| s.user() == &user.id) => {
                debug!(user_id = %user.id, "Presence refreshed, session kept");
            }
            Some(user) => {
                info!(
                    user_id = %user.id,
                    timeout = ?self.config.idle_timeout,
                    policy = ?self.config.policy,
                    "Idle monitor armed"
                );
                self.logout.reset();
                *session = Some(IdleSession::start(
                    user.id,
                    Instant::now(),
                    self.config.idle_timeout,
                    visibility,
                ));
            }
            None => {
                if session.take().is_some() {
                    info!("User signed out, idle monitor inactive");
                }
            }
        }

        publish(state, session.as_ref());
    }

    fn on_event(
        &self,
        event: HostEvent,
        session: &mut Option<IdleSession>,
        visibility: &mut Visibility,
    ) -> Decision {
        let now = Instant::now();

        match event {
            HostEvent::Interaction(kind) => {
                if !self.config.policy.qualifies(kind) {
                    return Decision::Continue;
                }
                if let Some(s) = session.as_mut() {
                    s.record_activity(now);
                }
                Decision::Continue
            }
            HostEvent::Visibility(next) => {
                *visibility = next;
                let Some(s) = session.as_mut() else {
                    return Decision::Continue;
                };

                let decision = s.set_visibility(next, now);
                debug!(visibility = ?next, idle_for = ?s.idle_for(now), "Visibility changed");
                if decision == Decision::Logout {
                    info!("Idle timeout exceeded while hidden");
                }
                decision
            }
            HostEvent::LogoutRequested => session
                .as_mut()
                .map_or(Decision::Continue, IdleSession::request_logout),
        }
    }
}

fn publish(state: &watch::Sender<MonitorState>, session: Option<&IdleSession>) {
    let next = session.map_or(MonitorState::Inactive, IdleSession::state);
    state.send_if_modified(|current| {
        let changed = *current != next;
        *current = next;
        changed
    });
}

/// Handle to a running [`IdleMonitor`].
///
/// Dropping the handle stops the monitor.
pub struct MonitorHandle {
    events: mpsc::Sender<HostEvent>,
    state: watch::Receiver<MonitorState>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Deliver a host event.
    pub async fn notify(&self, event: HostEvent) -> SessionResult<()> {
        self.events
            .send(event)
            .await
            .map_err(|_| SessionError::MonitorClosed)
    }

    /// Sender for host integrations that outlive a borrow of the handle.
    pub fn sender(&self) -> mpsc::Sender<HostEvent> {
        self.events.clone()
    }

    /// Current monitor state.
    pub fn state(&self) -> MonitorState {
        *self.state.borrow()
    }

    /// Stream of monitor state changes.
    pub fn subscribe(&self) -> watch::Receiver<MonitorState> {
        self.state.clone()
    }

    /// Stop the monitor and wait for its task to exit.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = (&mut self.task).await;
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::auth::{FakeAuth, MemoryTokenStore, RecordingNavigator};
    use crate::config::ActivityPolicy;
    use crate::events::InteractionKind;

    struct Harness {
        handle: MonitorHandle,
        auth: Arc<FakeAuth>,
        navigator: Arc<RecordingNavigator>,
    }

    fn harness(policy: ActivityPolicy) -> Harness {
        let config = IdleConfig::with_timeout(Duration::from_millis(1000)).policy(policy);
        let auth = Arc::new(FakeAuth::signed_in(User::new("user-1")));
        let navigator = Arc::new(RecordingNavigator::new());
        let logout = LogoutExecutor::new(
            &config,
            auth.clone(),
            Arc::new(MemoryTokenStore::new()),
            navigator.clone(),
        );
        let handle = IdleMonitor::new(config, auth.clone(), Arc::new(logout)).spawn();

        Harness {
            handle,
            auth,
            navigator,
        }
    }

    async fn sleep_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_once_after_timeout() {
        let h = harness(ActivityPolicy::Strict);

        sleep_ms(999).await;
        assert_eq!(h.auth.sign_out_calls(), 0);
        assert_eq!(h.handle.state(), MonitorState::Active);

        sleep_ms(2).await;
        assert_eq!(h.auth.sign_out_calls(), 1);
        assert_eq!(h.navigator.paths(), vec!["/login".to_string()]);
        assert_eq!(h.handle.state(), MonitorState::Inactive);

        sleep_ms(5000).await;
        assert_eq!(h.auth.sign_out_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_postpones_logout() {
        let h = harness(ActivityPolicy::Strict);

        sleep_ms(900).await;
        h.handle
            .notify(HostEvent::Interaction(InteractionKind::PointerDown))
            .await
            .unwrap();

        sleep_ms(101).await;
        assert_eq!(h.auth.sign_out_calls(), 0);

        sleep_ms(898).await;
        assert_eq!(h.auth.sign_out_calls(), 0);

        sleep_ms(2).await;
        assert_eq!(h.auth.sign_out_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_strict_policy_ignores_mouse_move() {
        let h = harness(ActivityPolicy::Strict);

        sleep_ms(500).await;
        h.handle
            .notify(HostEvent::Interaction(InteractionKind::MouseMove))
            .await
            .unwrap();

        sleep_ms(501).await;
        assert_eq!(h.auth.sign_out_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loose_policy_counts_mouse_move() {
        let h = harness(ActivityPolicy::Loose);

        sleep_ms(500).await;
        h.handle
            .notify(HostEvent::Interaction(InteractionKind::MouseMove))
            .await
            .unwrap();

        sleep_ms(501).await;
        assert_eq!(h.auth.sign_out_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_visible_again_keeps_original_deadline() {
        let h = harness(ActivityPolicy::Strict);

        sleep_ms(200).await;
        h.handle
            .notify(HostEvent::Visibility(Visibility::Hidden))
            .await
            .unwrap();
        sleep_ms(1).await;
        assert_eq!(h.handle.state(), MonitorState::Idle);

        sleep_ms(399).await;
        h.handle
            .notify(HostEvent::Visibility(Visibility::Visible))
            .await
            .unwrap();
        sleep_ms(1).await;
        assert_eq!(h.handle.state(), MonitorState::Active);

        sleep_ms(398).await;
        assert_eq!(h.auth.sign_out_calls(), 0);

        sleep_ms(2).await;
        assert_eq!(h.auth.sign_out_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_request_and_timeout_run_one_sequence() {
        let h = harness(ActivityPolicy::Strict);
        h.auth.set_delay(Duration::from_millis(50));

        sleep_ms(999).await;
        h.handle.notify(HostEvent::LogoutRequested).await.unwrap();
        h.handle
            .notify(HostEvent::Visibility(Visibility::Visible))
            .await
            .unwrap();

        sleep_ms(100).await;
        assert_eq!(h.auth.sign_out_calls(), 1);
        assert_eq!(h.navigator.paths().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_out_elsewhere_disarms_and_sign_in_rearms() {
        let h = harness(ActivityPolicy::Strict);

        sleep_ms(500).await;
        h.auth.set_user(None);
        sleep_ms(1500).await;
        assert_eq!(h.auth.sign_out_calls(), 0);
        assert_eq!(h.handle.state(), MonitorState::Inactive);

        h.auth.set_user(Some(User::new("user-1")));
        sleep_ms(999).await;
        assert_eq!(h.auth.sign_out_calls(), 0);
        assert_eq!(h.handle.state(), MonitorState::Active);

        sleep_ms(2).await;
        assert_eq!(h.auth.sign_out_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_user_presence_keeps_deadline() {
        let h = harness(ActivityPolicy::Strict);

        sleep_ms(900).await;
        h.auth.set_user(Some(User::new("user-1")));

        sleep_ms(101).await;
        assert_eq!(h.auth.sign_out_calls(), 1);
        assert_eq!(h.handle.state(), MonitorState::Inactive);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_user_presence_rearms() {
        let h = harness(ActivityPolicy::Strict);

        sleep_ms(900).await;
        h.auth.set_user(Some(User::new("user-2")));

        sleep_ms(101).await;
        assert_eq!(h.auth.sign_out_calls(), 0);
        assert_eq!(h.handle.state(), MonitorState::Active);

        sleep_ms(900).await;
        assert_eq!(h.auth.sign_out_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drops_timer() {
        let h = harness(ActivityPolicy::Strict);

        sleep_ms(100).await;
        h.handle.shutdown().await;

        sleep_ms(5000).await;
        assert_eq!(h.auth.sign_out_calls(), 0);
    }
}
