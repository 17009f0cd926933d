//! Rate provider traits and implementations.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use folio_common::{constants, parse_secs, Currency};
use futures::future;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{FxError, FxResult};

/// Trait for exchange-rate sources.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &str;

    /// Units of `target` per one unit of `base`.
    async fn fetch_rate(&self, base: Currency, target: Currency) -> FxResult<f64>;

    /// Rates for every target, failing if any one is missing.
    ///
    /// Defaults to one concurrent `fetch_rate` per target.
    async fn fetch_rates(
        &self,
        base: Currency,
        targets: &[Currency],
    ) -> FxResult<Vec<(Currency, f64)>> {
        let requests = targets.iter().map(|&target| async move {
            self.fetch_rate(base, target)
                .await
                .map(|rate| (target, rate))
        });
        future::try_join_all(requests).await
    }
}

/// Wire format of the rate endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateApi {
    /// `GET {url}/rates/latest/{base}?target={target}` returning `{"data": {"mid": ..}}`.
    Hexarate,
    /// `GET {url}/v4/latest/{base}` returning `{"rates": {"EUR": .., ..}}`.
    ExchangeRateApi,
}

/// Configuration for the HTTP rate provider.
#[derive(Debug, Clone)]
pub struct HttpProviderConfig {
    /// Endpoint root, without trailing slash.
    pub base_url: String,
    /// Response format spoken by the endpoint.
    pub api: RateApi,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl HttpProviderConfig {
    /// Primary endpoint.
    pub fn hexarate() -> Self {
        Self {
            base_url: "https://hexarate.paikama.co/api".to_string(),
            api: RateApi::Hexarate,
            request_timeout: constants::RATE_REQUEST_TIMEOUT,
        }
    }

    /// Secondary endpoint, used as a fallback.
    pub fn exchange_rate_api() -> Self {
        Self {
            base_url: "https://api.exchangerate-api.com".to_string(),
            api: RateApi::ExchangeRateApi,
            request_timeout: constants::RATE_REQUEST_TIMEOUT,
        }
    }

    /// Load overrides for the primary endpoint from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::hexarate();

        if let Ok(url) = std::env::var("FOLIO_RATES_URL") {
            config.base_url = url;
        }

        if let Ok(secs) = std::env::var("FOLIO_RATES_TIMEOUT_SECS") {
            if let Some(timeout) = parse_secs(&secs) {
                config.request_timeout = timeout;
            }
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.base_url.is_empty() {
            return Err("Rates URL cannot be empty".to_string());
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(format!("Rates URL must be http(s): {}", self.base_url));
        }

        if self.request_timeout.is_zero() {
            return Err("Rates request timeout cannot be zero".to_string());
        }

        Ok(())
    }
}

impl Default for HttpProviderConfig {
    fn default() -> Self {
        Self::hexarate()
    }
}

#[derive(Debug, Deserialize)]
struct HexarateResponse {
    data: HexarateData,
}

#[derive(Debug, Deserialize)]
struct HexarateData {
    mid: f64,
}

#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    rates: std::collections::HashMap<String, f64>,
}

/// Rate provider backed by a public HTTP API.
pub struct HttpRateProvider {
    client: reqwest::Client,
    config: HttpProviderConfig,
    name: String,
}

impl HttpRateProvider {
    /// Create a new HTTP provider.
    pub fn new(config: HttpProviderConfig) -> FxResult<Self> {
        config.validate().map_err(FxError::Configuration)?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| FxError::Configuration(format!("HTTP client: {}", e)))?;

        let name = match config.api {
            RateApi::Hexarate => "HEXARATE",
            RateApi::ExchangeRateApi => "EXCHANGERATE_API",
        }
        .to_string();

        Ok(Self {
            client,
            config,
            name,
        })
    }

    /// URL queried for one currency pair.
    pub fn rate_url(&self, base: Currency, target: Currency) -> String {
        let root = self.config.base_url.trim_end_matches('/');
        match self.config.api {
            RateApi::Hexarate => format!("{}/rates/latest/{}?target={}", root, base, target),
            RateApi::ExchangeRateApi => format!("{}/v4/latest/{}", root, base),
        }
    }

    /// Requests needed to price `targets`, each with the targets its body
    /// answers. The latest-rates endpoint answers every target at once.
    pub fn request_plan(&self, base: Currency, targets: &[Currency]) -> Vec<(String, Vec<Currency>)> {
        match (self.config.api, targets.first()) {
            (_, None) => Vec::new(),
            (RateApi::Hexarate, _) => targets
                .iter()
                .map(|&target| (self.rate_url(base, target), vec![target]))
                .collect(),
            (RateApi::ExchangeRateApi, Some(&first)) => {
                vec![(self.rate_url(base, first), targets.to_vec())]
            }
        }
    }

    async fn get_body(&self, url: &str) -> FxResult<String> {
        debug!(provider = %self.name, url = %url, "Requesting rates");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FxError::ProviderError(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FxError::ProviderError(format!(
                "{} returned HTTP {}",
                url, status
            )));
        }

        response
            .text()
            .await
            .map_err(|e| FxError::ProviderError(format!("reading {} failed: {}", url, e)))
    }
}

#[async_trait]
impl RateProvider for HttpRateProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_rate(&self, base: Currency, target: Currency) -> FxResult<f64> {
        let body = self.get_body(&self.rate_url(base, target)).await?;
        parse_rate_response(self.config.api, target, &body)
    }

    async fn fetch_rates(
        &self,
        base: Currency,
        targets: &[Currency],
    ) -> FxResult<Vec<(Currency, f64)>> {
        let api = self.config.api;
        let requests = self
            .request_plan(base, targets)
            .into_iter()
            .map(|(url, answers)| async move {
                let body = self.get_body(&url).await?;
                answers
                    .into_iter()
                    .map(|target| parse_rate_response(api, target, &body).map(|rate| (target, rate)))
                    .collect::<FxResult<Vec<_>>>()
            });

        let tables = future::try_join_all(requests).await?;
        Ok(tables.into_iter().flatten().collect())
    }
}

/// Extract the rate for `target` from a response body.
///
/// A body without the expected field is an error, never a partial result.
pub fn parse_rate_response(api: RateApi, target: Currency, body: &str) -> FxResult<f64> {
    let rate = match api {
        RateApi::Hexarate => {
            let parsed: HexarateResponse = serde_json::from_str(body)
                .map_err(|e| FxError::ProviderError(format!("malformed rate response: {}", e)))?;
            parsed.data.mid
        }
        RateApi::ExchangeRateApi => {
            let parsed: LatestRatesResponse = serde_json::from_str(body)
                .map_err(|e| FxError::ProviderError(format!("malformed rate response: {}", e)))?;
            parsed.rates.get(target.code()).copied().ok_or_else(|| {
                FxError::ProviderError(format!("exchange rate not found for {}", target))
            })?
        }
    };

    if !rate.is_finite() || rate <= 0.0 {
        return Err(FxError::InvalidRate {
            currency: target,
            rate,
        });
    }

    Ok(rate)
}

/// Tries each provider in order and returns the first rate obtained.
pub struct FallbackRateProvider {
    providers: Vec<Arc<dyn RateProvider>>,
}

impl FallbackRateProvider {
    /// Create a new fallback chain.
    pub fn new(providers: Vec<Arc<dyn RateProvider>>) -> Self {
        Self { providers }
    }
}

#[async_trait]
impl RateProvider for FallbackRateProvider {
    fn name(&self) -> &str {
        "FALLBACK"
    }

    async fn fetch_rate(&self, base: Currency, target: Currency) -> FxResult<f64> {
        let mut last_error = None;

        for provider in &self.providers {
            match provider.fetch_rate(base, target).await {
                Ok(rate) => {
                    debug!(
                        provider = provider.name(),
                        base = %base,
                        target = %target,
                        rate,
                        "Got rate from provider"
                    );
                    return Ok(rate);
                }
                Err(e) => {
                    warn!(
                        provider = provider.name(),
                        base = %base,
                        target = %target,
                        error = %e,
                        "Provider failed to return rate"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            FxError::Configuration("No rate providers configured".to_string())
        }))
    }

    /// The first provider that prices every target supplies the whole set.
    async fn fetch_rates(
        &self,
        base: Currency,
        targets: &[Currency],
    ) -> FxResult<Vec<(Currency, f64)>> {
        let mut last_error = None;

        for provider in &self.providers {
            match provider.fetch_rates(base, targets).await {
                Ok(rates) => {
                    debug!(
                        provider = provider.name(),
                        base = %base,
                        count = rates.len(),
                        "Got rates from provider"
                    );
                    return Ok(rates);
                }
                Err(e) => {
                    warn!(
                        provider = provider.name(),
                        base = %base,
                        error = %e,
                        "Provider failed to return rates"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            FxError::Configuration("No rate providers configured".to_string())
        }))
    }
}

/// Mock rate provider for testing.
#[cfg(any(test, feature = "test-utils"))]
pub struct MockRateProvider {
    name: String,
    rates: dashmap::DashMap<Currency, f64>,
    delay: parking_lot::Mutex<Duration>,
    failing: std::sync::atomic::AtomicBool,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockRateProvider {
    /// Create a new mock provider with no rates.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rates: dashmap::DashMap::new(),
            delay: parking_lot::Mutex::new(Duration::ZERO),
            failing: std::sync::atomic::AtomicBool::new(false),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Provider preloaded with EUR 0.92, ILS 3.7, GBP 0.79.
    pub fn with_default_rates(name: impl Into<String>) -> Self {
        let provider = Self::new(name);
        provider.set_rate(Currency::Eur, 0.92);
        provider.set_rate(Currency::Ils, 3.7);
        provider.set_rate(Currency::Gbp, 0.79);
        provider
    }

    /// Set the rate returned for a currency.
    pub fn set_rate(&self, currency: Currency, rate: f64) {
        self.rates.insert(currency, rate);
    }

    /// Delay applied to each call, read when the call starts.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    /// Make calls fail (checked when the call starts).
    pub fn set_failing(&self, failing: bool) {
        self.failing
            .store(failing, std::sync::atomic::Ordering::SeqCst);
    }

    /// Number of `fetch_rate` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl RateProvider for MockRateProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_rate(&self, _base: Currency, target: Currency) -> FxResult<f64> {
        use std::sync::atomic::Ordering;

        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self.failing.load(Ordering::SeqCst);
        let rate = self.rates.get(&target).map(|r| *r);
        let delay = *self.delay.lock();

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if failing {
            return Err(FxError::ProviderError(format!("{} is down", self.name)));
        }

        rate.ok_or_else(|| FxError::ProviderError(format!("no rate for {}", target)))
    }
}
