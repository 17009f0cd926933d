//! Application shell.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{info, instrument, warn};

use folio_fx::{
    FallbackRateProvider, FxEngine, FxResult, HttpProviderConfig, HttpRateProvider, RateApi,
    RateProvider,
};
use folio_session::{
    AuthProvider, HostEvent, IdleMonitor, LogoutExecutor, MonitorHandle, MonitorState, Navigator,
    SignOut, TokenStore,
};

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Build the configured rate provider, with the public fallback endpoint
/// behind it when enabled.
pub fn build_rate_provider(config: &AppConfig) -> FxResult<Arc<dyn RateProvider>> {
    let primary: Arc<dyn RateProvider> = Arc::new(HttpRateProvider::new(config.rates.clone())?);

    if !config.rates_fallback || config.rates.api == RateApi::ExchangeRateApi {
        return Ok(primary);
    }

    let secondary = HttpProviderConfig {
        request_timeout: config.rates.request_timeout,
        ..HttpProviderConfig::exchange_rate_api()
    };
    let secondary: Arc<dyn RateProvider> = Arc::new(HttpRateProvider::new(secondary)?);

    Ok(Arc::new(FallbackRateProvider::new(vec![primary, secondary])))
}

/// The application: one rate service and one idle monitor.
pub struct App {
    config: AppConfig,
    state: RwLock<AppState>,
    fx: FxEngine,
    auth: Arc<dyn AuthProvider>,
    navigator: Arc<dyn Navigator>,
    tokens: Arc<dyn TokenStore>,
    fallback_sign_out: Option<Arc<dyn SignOut>>,
    monitor: Mutex<Option<MonitorHandle>>,
}

impl App {
    /// Create a new application.
    pub fn new(
        config: AppConfig,
        provider: Arc<dyn RateProvider>,
        auth: Arc<dyn AuthProvider>,
        navigator: Arc<dyn Navigator>,
        tokens: Arc<dyn TokenStore>,
    ) -> Self {
        let fx = FxEngine::new(provider, config.fx.clone());

        Self {
            config,
            state: RwLock::new(AppState::Starting),
            fx,
            auth,
            navigator,
            tokens,
            fallback_sign_out: None,
            monitor: Mutex::new(None),
        }
    }

    /// Sign-out path used when the auth provider's own sign-out fails.
    pub fn with_fallback_sign_out(mut self, fallback: Arc<dyn SignOut>) -> Self {
        self.fallback_sign_out = Some(fallback);
        self
    }

    /// Start the rate refresh and the idle monitor.
    #[instrument(skip(self))]
    pub fn start(&self) -> AppResult<()> {
        let mut state = self.state.write();
        if *state != AppState::Starting {
            return Err(AppError::InvalidState(*state));
        }

        self.config.validate().map_err(AppError::Configuration)?;

        info!(
            display_currency = %self.config.display_currency,
            idle_timeout = ?self.config.idle.idle_timeout,
            "Starting Folio"
        );

        self.fx.init();

        let mut logout = LogoutExecutor::new(
            &self.config.idle,
            self.auth.clone(),
            self.tokens.clone(),
            self.navigator.clone(),
        );
        if let Some(fallback) = &self.fallback_sign_out {
            logout = logout.with_fallback(fallback.clone());
        }

        let monitor =
            IdleMonitor::new(self.config.idle.clone(), self.auth.clone(), Arc::new(logout)).spawn();
        *self.monitor.lock() = Some(monitor);

        *state = AppState::Running;
        info!("Folio started");
        Ok(())
    }

    /// Stop background services. Safe to call more than once.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> AppResult<()> {
        {
            let mut state = self.state.write();
            if state.is_terminal() {
                return Ok(());
            }
            *state = AppState::ShuttingDown;
        }

        info!("Stopping Folio");

        let monitor = self.monitor.lock().take();
        if let Some(monitor) = monitor {
            monitor.shutdown().await;
        }
        self.fx.teardown();

        *self.state.write() = AppState::Stopped;
        info!("Folio stopped");
        Ok(())
    }

    /// Get current application state.
    pub fn state(&self) -> AppState {
        *self.state.read()
    }

    /// Shared exchange-rate service.
    pub fn fx(&self) -> &FxEngine {
        &self.fx
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Idle monitor state, if the monitor is running.
    pub fn monitor_state(&self) -> Option<MonitorState> {
        self.monitor.lock().as_ref().map(MonitorHandle::state)
    }

    /// Forward a host event to the idle monitor.
    ///
    /// Fails with [`AppError::InvalidState`] unless the app is running.
    pub async fn notify(&self, event: HostEvent) -> AppResult<()> {
        let state = self.state();
        if !state.is_operational() {
            return Err(AppError::InvalidState(state));
        }

        let sender = self
            .monitor
            .lock()
            .as_ref()
            .map(MonitorHandle::sender)
            .ok_or(AppError::InvalidState(state))?;

        if sender.send(event).await.is_err() {
            warn!(event = ?event, "Idle monitor is gone, event dropped");
        }
        Ok(())
    }
}
