//! Application configuration.

use folio_common::Currency;
use folio_fx::{FxEngineConfig, HttpProviderConfig};
use folio_session::IdleConfig;

/// Main application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Primary exchange-rate endpoint.
    pub rates: HttpProviderConfig,
    /// Try a second public endpoint when the primary fails.
    pub rates_fallback: bool,
    /// Rate cache TTL and refresh period.
    pub fx: FxEngineConfig,
    /// Idle monitor and logout settings.
    pub idle: IdleConfig,
    /// Currency totals are displayed in.
    pub display_currency: Currency,
    /// Log level used when `RUST_LOG` is not set.
    pub log_level: String,
    /// Emit JSON log lines.
    pub log_json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rates: HttpProviderConfig::default(),
            rates_fallback: true,
            fx: FxEngineConfig::default(),
            idle: IdleConfig::default(),
            display_currency: Currency::BASE,
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self {
            rates: HttpProviderConfig::from_env(),
            fx: FxEngineConfig::from_env(),
            idle: IdleConfig::from_env(),
            ..Self::default()
        };

        if let Ok(flag) = std::env::var("FOLIO_RATES_FALLBACK") {
            config.rates_fallback = parse_flag(&flag);
        }

        if let Some(currency) = std::env::var("FOLIO_DISPLAY_CURRENCY")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.display_currency = currency;
        }

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.log_level = level;
        }

        if let Ok(format) = std::env::var("LOG_FORMAT") {
            config.log_json = format.eq_ignore_ascii_case("json");
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        self.rates.validate().map_err(|e| format!("rates: {}", e))?;
        self.fx.validate().map_err(|e| format!("fx: {}", e))?;
        self.idle.validate().map_err(|e| format!("idle: {}", e))?;

        if self.log_level.is_empty() {
            return Err("Log level cannot be empty".to_string());
        }

        Ok(())
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
