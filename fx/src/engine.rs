//! Main FX engine implementation.

use std::sync::{Arc, Weak};
use std::time::Duration;

use folio_common::{parse_secs, Currency, Money, Timestamp};
use futures::future::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::cache::{CacheStats, RateCache, RateCacheConfig, SharedFetch};
use crate::conversion::{self, Valuation};
use crate::error::FxResult;
use crate::provider::RateProvider;
use crate::snapshot::RateSnapshot;

/// Configuration for the FX engine.
///
/// The refresh interval and the TTL are one coupled setting. A snapshot's
/// age counts from the start of its fetch, so the refresh must start
/// strictly before the TTL runs out or conversions fail while it is in
/// flight.
#[derive(Debug, Clone)]
pub struct FxEngineConfig {
    /// Cache configuration.
    pub cache: RateCacheConfig,
    /// Period of the background refresh.
    pub refresh_interval: Duration,
}

impl Default for FxEngineConfig {
    fn default() -> Self {
        Self::with_ttl(RateCacheConfig::default().ttl)
    }
}

impl FxEngineConfig {
    /// Config refreshing at [`default_refresh_interval`] of `ttl`.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            cache: RateCacheConfig { ttl },
            refresh_interval: default_refresh_interval(ttl),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(ttl) = std::env::var("FOLIO_RATE_TTL_SECS")
            .ok()
            .and_then(|v| parse_secs(&v))
        {
            config = Self::with_ttl(ttl);
        }

        if let Some(interval) = std::env::var("FOLIO_RATE_REFRESH_SECS")
            .ok()
            .and_then(|v| parse_secs(&v))
        {
            config.refresh_interval = interval;
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.cache.ttl.is_zero() {
            return Err("Rate TTL cannot be zero".to_string());
        }

        if self.refresh_interval.is_zero() {
            return Err("Rate refresh interval cannot be zero".to_string());
        }

        if self.refresh_interval >= self.cache.ttl {
            return Err(format!(
                "Rate refresh interval ({:?}) must be shorter than the TTL ({:?})",
                self.refresh_interval, self.cache.ttl
            ));
        }

        Ok(())
    }
}

/// Refresh period for a TTL: four fifths of it, leaving the last fifth for
/// the refresh fetch itself.
pub fn default_refresh_interval(ttl: Duration) -> Duration {
    ttl * 4 / 5
}

/// Point-in-time view of the rate cache for display components.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateStatus {
    /// A fetch is running.
    pub loading: bool,
    /// A fresh snapshot is available for conversion.
    pub available: bool,
    /// Message of the last failed fetch, cleared on success.
    pub error: Option<String>,
    /// Capture time of the latest snapshot, fresh or not.
    pub fetched_at: Option<Timestamp>,
}

impl RateStatus {
    /// Check if valuations currently fall back to raw sums.
    pub fn is_degraded(&self) -> bool {
        !self.available
    }
}

struct EngineInner {
    provider: Arc<dyn RateProvider>,
    cache: Arc<RateCache>,
    config: FxEngineConfig,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        if let Some(task) = self.refresh_task.get_mut().take() {
            task.abort();
        }
    }
}

/// The exchange-rate service.
///
/// Cloning yields another handle to the same cache; create one engine per
/// process and pass clones to consumers.
#[derive(Clone)]
pub struct FxEngine {
    inner: Arc<EngineInner>,
}

impl FxEngine {
    /// Create a new FX engine with the given provider.
    pub fn new(provider: Arc<dyn RateProvider>, config: FxEngineConfig) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                provider,
                cache: Arc::new(RateCache::with_config(config.cache.clone())),
                config,
                refresh_task: Mutex::new(None),
            }),
        }
    }

    /// Start the background refresh task. Idempotent.
    ///
    /// Must be called from within a tokio runtime.
    pub fn init(&self) {
        let mut task = self.inner.refresh_task.lock();
        if task.is_some() {
            return;
        }

        let period = self.inner.config.refresh_interval;
        let weak = Arc::downgrade(&self.inner);
        *task = Some(tokio::spawn(refresh_loop(weak, period)));

        info!(
            provider = self.inner.provider.name(),
            ttl = ?self.inner.config.cache.ttl,
            refresh_interval = ?period,
            "FX engine started"
        );
    }

    /// Stop the background refresh task and forget any in-flight fetch.
    pub fn teardown(&self) {
        if let Some(task) = self.inner.refresh_task.lock().take() {
            task.abort();
            info!("FX engine stopped");
        }
        self.inner.cache.discard_in_flight();
    }

    /// Check if the background refresh task is running.
    pub fn is_running(&self) -> bool {
        self.inner.refresh_task.lock().is_some()
    }

    /// Make sure a fresh snapshot is loaded.
    ///
    /// Returns immediately while the snapshot is fresh. Otherwise joins the
    /// running fetch or starts one; every waiter gets the same outcome.
    #[instrument(skip(self))]
    pub async fn ensure_rates_loaded(&self) -> FxResult<()> {
        if self.inner.cache.fresh(Instant::now()).is_some() {
            return Ok(());
        }

        self.fetch(false).await.map(|_| ())
    }

    /// Fetch new rates even if the current snapshot is fresh.
    ///
    /// A fetch already running is forgotten, not aborted; if it finishes
    /// later its older rates are discarded.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> FxResult<()> {
        self.fetch(true).await.map(|_| ())
    }

    /// Convert an amount between currencies with the cached rates.
    pub fn convert(&self, amount: f64, from: Currency, to: Currency) -> FxResult<f64> {
        if from == to {
            return Ok(amount);
        }

        let snapshot = self.inner.cache.current(Instant::now())?;
        conversion::convert(&snapshot, amount, from, to)
    }

    /// Sum `entries` converted to `target`, failing if any conversion fails.
    pub fn try_convert_many(&self, entries: &[Money], target: Currency) -> FxResult<f64> {
        if entries.iter().all(|e| e.currency == target) {
            return Ok(conversion::raw_sum(entries));
        }

        let snapshot = self.inner.cache.current(Instant::now())?;
        conversion::convert_all(&snapshot, entries, target)
    }

    /// Sum `entries` converted to `target`, falling back to the raw sum.
    ///
    /// The fallback treats every currency as equal-weighted and marks the
    /// result degraded.
    pub fn convert_many(&self, entries: &[Money], target: Currency) -> Valuation {
        match self.try_convert_many(entries, target) {
            Ok(total) => Valuation::exact(total, target),
            Err(e) => {
                debug!(error = %e, entries = entries.len(), "Using raw sum for total");
                Valuation::degraded(conversion::raw_sum(entries), target)
            }
        }
    }

    /// Convert one amount, falling back to the unconverted amount.
    pub fn convert_or_raw(&self, amount: f64, from: Currency, to: Currency) -> Valuation {
        match self.convert(amount, from, to) {
            Ok(converted) => Valuation::exact(converted, to),
            Err(_) => Valuation::degraded(amount, to),
        }
    }

    /// Current snapshot if fresh.
    pub fn snapshot(&self) -> FxResult<Arc<RateSnapshot>> {
        self.inner.cache.current(Instant::now())
    }

    /// Loading / availability / error view for display components.
    pub fn status(&self) -> RateStatus {
        let cache = &self.inner.cache;
        RateStatus {
            loading: cache.is_loading(),
            available: cache.fresh(Instant::now()).is_some(),
            error: cache.last_error().map(|e| e.to_string()),
            fetched_at: cache.latest().map(|s| s.fetched_at()),
        }
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.inner.cache.stats()
    }

    /// Engine configuration.
    pub fn config(&self) -> &FxEngineConfig {
        &self.inner.config
    }

    fn fetch(&self, force: bool) -> SharedFetch {
        let provider = self.inner.provider.clone();
        self.inner
            .cache
            .join_or_start(force, move |started_at| {
                fetch_snapshot(provider, started_at).boxed()
            })
    }
}

/// Fetch every non-base rate and build a snapshot.
async fn fetch_snapshot(
    provider: Arc<dyn RateProvider>,
    started_at: Instant,
) -> FxResult<RateSnapshot> {
    debug!(provider = provider.name(), "Fetching exchange rates");

    let targets: Vec<Currency> = Currency::non_base().collect();
    let rates = provider.fetch_rates(Currency::BASE, &targets).await?;
    RateSnapshot::new(rates, started_at, provider.name())
}

async fn refresh_loop(engine: Weak<EngineInner>, period: Duration) {
    match engine.upgrade() {
        Some(inner) => {
            if let Err(e) = (FxEngine { inner }).ensure_rates_loaded().await {
                warn!(error = %e, "Initial exchange rate load failed");
            }
        }
        None => return,
    }

    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let Some(inner) = engine.upgrade() else {
            break;
        };

        if let Err(e) = (FxEngine { inner }).refresh().await {
            warn!(error = %e, "Scheduled exchange rate refresh failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FxError, UnavailableReason};
    use futures::future;
    use crate::provider::MockRateProvider;
    use tokio_test::{assert_err, assert_ok};

    fn setup_engine(ttl: Duration) -> (FxEngine, Arc<MockRateProvider>) {
        let provider = Arc::new(MockRateProvider::with_default_rates("test"));
        let engine = FxEngine::new(provider.clone(), FxEngineConfig::with_ttl(ttl));
        (engine, provider)
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 0.01
    }

    #[tokio::test(start_paused = true)]
    async fn test_convert_after_load() {
        let (engine, provider) = setup_engine(Duration::from_secs(300));

        assert_ok!(engine.ensure_rates_loaded().await);

        assert_eq!(provider.calls(), 3);
        assert!(close(
            engine.convert(100.0, Currency::Eur, Currency::Usd).unwrap(),
            108.70
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_convert_many_end_to_end() {
        let (engine, _) = setup_engine(Duration::from_secs(300));
        engine.ensure_rates_loaded().await.unwrap();

        let entries = [
            Money::new(100.0, Currency::Usd),
            Money::new(100.0, Currency::Eur),
            Money::new(100.0, Currency::Ils),
            Money::new(100.0, Currency::Gbp),
        ];
        let total = engine.convert_many(&entries, Currency::Usd);

        assert!(!total.degraded);
        assert!(close(total.amount, 362.31), "total was {}", total.amount);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_fetch() {
        let (engine, provider) = setup_engine(Duration::from_secs(300));
        provider.set_delay(Duration::from_millis(100));

        let callers: Vec<_> = (0..10).map(|_| engine.ensure_rates_loaded()).collect();
        let results = future::join_all(callers).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(provider.calls(), 3);
        assert_eq!(engine.stats().fetches_started, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_snapshot_skips_network() {
        let (engine, provider) = setup_engine(Duration::from_secs(300));

        engine.ensure_rates_loaded().await.unwrap();
        tokio::time::advance(Duration::from_secs(299)).await;
        engine.ensure_rates_loaded().await.unwrap();

        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_snapshot_not_used_and_refetched() {
        let (engine, provider) = setup_engine(Duration::from_secs(300));
        engine.ensure_rates_loaded().await.unwrap();

        tokio::time::advance(Duration::from_secs(301)).await;

        assert!(matches!(
            engine.convert(100.0, Currency::Eur, Currency::Usd),
            Err(FxError::RatesUnavailable(UnavailableReason::Stale))
        ));
        assert!(engine.status().is_degraded());

        engine.ensure_rates_loaded().await.unwrap();
        assert_eq!(provider.calls(), 6);
        assert_ok!(engine.convert(100.0, Currency::Eur, Currency::Usd));
    }

    #[tokio::test]
    async fn test_degraded_sum_without_rates() {
        let (engine, _) = setup_engine(Duration::from_secs(300));

        let entries = [Money::new(10.0, Currency::Usd), Money::new(5.0, Currency::Eur)];
        let total = engine.convert_many(&entries, Currency::Usd);

        assert_eq!(total.amount, 15.0);
        assert!(total.degraded);
        assert_err!(engine.try_convert_many(&entries, Currency::Usd));
    }

    #[tokio::test]
    async fn test_identity_without_rates() {
        let (engine, _) = setup_engine(Duration::from_secs(300));

        assert_eq!(engine.convert(42.5, Currency::Ils, Currency::Ils).unwrap(), 42.5);
        let single = engine.convert_or_raw(42.5, Currency::Ils, Currency::Usd);
        assert!(single.degraded);
        assert_eq!(single.amount, 42.5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_failure_surfaces_to_all_callers() {
        let (engine, provider) = setup_engine(Duration::from_secs(300));
        provider.set_failing(true);
        provider.set_delay(Duration::from_millis(10));

        let (a, b) = tokio::join!(engine.ensure_rates_loaded(), engine.ensure_rates_loaded());

        assert!(matches!(a, Err(FxError::RateFetchFailed(_))));
        assert_eq!(a, b);

        let status = engine.status();
        assert!(!status.available);
        assert!(!status.loading);
        assert!(status.error.is_some());
        assert!(matches!(
            engine.convert(1.0, Currency::Gbp, Currency::Usd),
            Err(FxError::RatesUnavailable(UnavailableReason::NotLoaded))
        ));

        provider.set_failing(false);
        engine.ensure_rates_loaded().await.unwrap();
        assert_eq!(engine.status().error, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_later_refresh_wins_over_slow_earlier_fetch() {
        let (engine, provider) = setup_engine(Duration::from_secs(300));
        provider.set_rate(Currency::Eur, 0.90);
        provider.set_delay(Duration::from_millis(500));

        let slow = tokio::spawn({
            let engine = engine.clone();
            async move { engine.ensure_rates_loaded().await }
        });
        tokio::time::sleep(Duration::from_millis(1)).await;

        provider.set_rate(Currency::Eur, 0.95);
        provider.set_delay(Duration::from_millis(10));
        engine.refresh().await.unwrap();

        slow.await.unwrap().unwrap();

        let snapshot = engine.snapshot().unwrap();
        assert_eq!(snapshot.rate(Currency::Eur).unwrap(), 0.95);
        assert_eq!(engine.stats().results_discarded, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_refresh_keeps_cache_warm() {
        let (engine, provider) = setup_engine(Duration::from_secs(60));
        engine.init();
        assert!(engine.is_running());

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(provider.calls(), 3);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(engine.config().refresh_interval, Duration::from_secs(48));
        assert_eq!(provider.calls(), 6);
        assert!(engine.status().available);

        engine.teardown();
        assert!(!engine.is_running());

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(provider.calls(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rates_stay_available_while_refreshing() {
        let provider = Arc::new(MockRateProvider::with_default_rates("test"));
        provider.set_delay(Duration::from_millis(200));
        let engine = FxEngine::new(provider.clone(), FxEngineConfig::default());
        engine.init();

        // Initial load ends at 0.2s; refreshes start at 240.2s and 480.2s.
        tokio::time::sleep(Duration::from_millis(300_300)).await;
        assert_ok!(engine.convert(100.0, Currency::Eur, Currency::Usd));

        tokio::time::sleep(Duration::from_millis(180_000)).await;
        let status = engine.status();
        assert!(status.loading);
        assert!(status.available);
        assert_ok!(engine.convert(100.0, Currency::Eur, Currency::Usd));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(provider.calls(), 9);
        engine.teardown();
    }

    #[test]
    fn test_config_validation() {
        let config = FxEngineConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.refresh_interval < config.cache.ttl);

        let config = FxEngineConfig {
            refresh_interval: Duration::from_secs(3600),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = FxEngineConfig {
            refresh_interval: config.cache.ttl,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        assert!(FxEngineConfig::with_ttl(Duration::ZERO).validate().is_err());
    }
}
