//! Shared rate snapshot with TTL and single-flight refresh.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use folio_common::{constants, Timestamp};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{FxError, FxResult, UnavailableReason};
use crate::snapshot::RateSnapshot;

/// Outcome of one fetch, shared by every caller awaiting it.
pub type FetchOutcome = FxResult<Arc<RateSnapshot>>;

/// Handle to a fetch that may still be running.
pub type SharedFetch = Shared<BoxFuture<'static, FetchOutcome>>;

/// Configuration for rate cache.
#[derive(Debug, Clone)]
pub struct RateCacheConfig {
    /// Maximum age at which a snapshot may be used for conversion.
    pub ttl: Duration,
}

impl Default for RateCacheConfig {
    fn default() -> Self {
        Self {
            ttl: constants::RATE_TTL,
        }
    }
}

struct InFlight {
    generation: u64,
    fetch: SharedFetch,
}

/// Rate cache holding at most one snapshot and at most one in-flight fetch.
///
/// The snapshot is swapped as a whole `Arc`, so readers see either the
/// previous or the next complete rate set.
pub struct RateCache {
    snapshot: RwLock<Option<Arc<RateSnapshot>>>,
    last_error: RwLock<Option<FxError>>,
    in_flight: Mutex<Option<InFlight>>,
    generation: AtomicU64,
    stats: CacheCounters,
    config: RateCacheConfig,
}

#[derive(Default)]
struct CacheCounters {
    fetches_started: AtomicU64,
    fetches_failed: AtomicU64,
    snapshots_installed: AtomicU64,
    results_discarded: AtomicU64,
}

impl RateCache {
    /// Create a new rate cache with default configuration.
    pub fn new() -> Self {
        Self::with_config(RateCacheConfig::default())
    }

    /// Create a new rate cache with custom configuration.
    pub fn with_config(config: RateCacheConfig) -> Self {
        Self {
            snapshot: RwLock::new(None),
            last_error: RwLock::new(None),
            in_flight: Mutex::new(None),
            generation: AtomicU64::new(0),
            stats: CacheCounters::default(),
            config,
        }
    }

    /// Configured TTL.
    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }

    /// Get the snapshot if it is still within its TTL.
    pub fn fresh(&self, now: Instant) -> Option<Arc<RateSnapshot>> {
        self.snapshot
            .read()
            .as_ref()
            .filter(|s| s.is_fresh(now, self.config.ttl))
            .cloned()
    }

    /// Get the snapshot usable for conversion, or why there is none.
    pub fn current(&self, now: Instant) -> FxResult<Arc<RateSnapshot>> {
        match self.snapshot.read().as_ref() {
            Some(snapshot) if snapshot.is_fresh(now, self.config.ttl) => Ok(snapshot.clone()),
            Some(_) => Err(FxError::RatesUnavailable(UnavailableReason::Stale)),
            None => Err(FxError::RatesUnavailable(UnavailableReason::NotLoaded)),
        }
    }

    /// Latest snapshot regardless of age.
    pub fn latest(&self) -> Option<Arc<RateSnapshot>> {
        self.snapshot.read().clone()
    }

    /// Error recorded by the last failed fetch, cleared on success.
    pub fn last_error(&self) -> Option<FxError> {
        self.last_error.read().clone()
    }

    /// Check if a fetch is running.
    pub fn is_loading(&self) -> bool {
        self.in_flight.lock().is_some()
    }

    /// Join the running fetch, or start one with `fetch`.
    ///
    /// With `force`, any running fetch is forgotten (not aborted) and a new
    /// one starts. `fetch` receives the instant the attempt started; that
    /// instant orders completed snapshots.
    pub fn join_or_start<F>(self: &Arc<Self>, force: bool, fetch: F) -> SharedFetch
    where
        F: FnOnce(Instant) -> BoxFuture<'static, FxResult<RateSnapshot>>,
    {
        let mut slot = self.in_flight.lock();

        if !force {
            if let Some(running) = slot.as_ref() {
                debug!(generation = running.generation, "Joining in-flight rate fetch");
                return running.fetch.clone();
            }
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let started_at = Instant::now();
        let attempt = fetch(started_at);
        let cache = Arc::clone(self);

        let shared = async move {
            let result = attempt.await;
            cache.complete(generation, started_at, result)
        }
        .boxed()
        .shared();

        self.stats.fetches_started.fetch_add(1, Ordering::Relaxed);
        debug!(generation, force, "Started rate fetch");

        *slot = Some(InFlight {
            generation,
            fetch: shared.clone(),
        });

        shared
    }

    /// Forget the running fetch without aborting it.
    pub fn discard_in_flight(&self) {
        if let Some(running) = self.in_flight.lock().take() {
            debug!(generation = running.generation, "Discarded in-flight rate fetch");
        }
    }

    /// Install a snapshot unless a later fetch already installed one.
    ///
    /// Returns whether the snapshot was installed.
    pub fn install(&self, snapshot: Arc<RateSnapshot>) -> bool {
        let mut current = self.snapshot.write();

        if let Some(existing) = current.as_ref() {
            if existing.is_newer_than(&snapshot) {
                self.stats.results_discarded.fetch_add(1, Ordering::Relaxed);
                debug!("Discarding rates from an older fetch");
                return false;
            }
        }

        *current = Some(snapshot);
        *self.last_error.write() = None;
        self.stats.snapshots_installed.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            fetches_started: self.stats.fetches_started.load(Ordering::Relaxed),
            fetches_failed: self.stats.fetches_failed.load(Ordering::Relaxed),
            snapshots_installed: self.stats.snapshots_installed.load(Ordering::Relaxed),
            results_discarded: self.stats.results_discarded.load(Ordering::Relaxed),
            fetched_at: self.latest().map(|s| s.fetched_at()),
        }
    }

    fn complete(
        &self,
        generation: u64,
        started_at: Instant,
        result: FxResult<RateSnapshot>,
    ) -> FetchOutcome {
        let outcome = match result {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                if self.install(snapshot.clone()) {
                    info!(
                        generation,
                        source = snapshot.source(),
                        fetched_at = %snapshot.fetched_at(),
                        "Exchange rates updated"
                    );
                }
                Ok(snapshot)
            }
            Err(e) => {
                self.record_failure(started_at, &e);
                Err(match e {
                    FxError::RateFetchFailed(_) => e,
                    other => FxError::RateFetchFailed(other.to_string()),
                })
            }
        };

        let mut slot = self.in_flight.lock();
        if slot.as_ref().map(|f| f.generation) == Some(generation) {
            *slot = None;
        }

        outcome
    }

    fn record_failure(&self, started_at: Instant, error: &FxError) {
        self.stats.fetches_failed.fetch_add(1, Ordering::Relaxed);

        let mut current = self.snapshot.write();
        if current
            .as_ref()
            .is_some_and(|s| s.captured_at() > started_at)
        {
            debug!(error = %error, "Ignoring failure of an older rate fetch");
            return;
        }

        warn!(error = %error, "Exchange rate fetch failed");
        *current = None;
        *self.last_error.write() = Some(error.clone());
    }
}

impl Default for RateCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics.
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub fetches_started: u64,
    pub fetches_failed: u64,
    pub snapshots_installed: u64,
    pub results_discarded: u64,
    pub fetched_at: Option<Timestamp>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_common::Currency;

    fn snapshot_at(captured_at: Instant, eur: f64) -> FxResult<RateSnapshot> {
        RateSnapshot::new(
            [(Currency::Eur, eur), (Currency::Ils, 3.7), (Currency::Gbp, 0.79)],
            captured_at,
            "TEST",
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_installs_snapshot() {
        let cache = Arc::new(RateCache::new());

        assert!(matches!(
            cache.current(Instant::now()),
            Err(FxError::RatesUnavailable(UnavailableReason::NotLoaded))
        ));

        let fetch = cache.join_or_start(false, |at| async move { snapshot_at(at, 0.92) }.boxed());
        assert!(cache.is_loading());
        fetch.await.unwrap();

        assert!(!cache.is_loading());
        let snapshot = cache.current(Instant::now()).unwrap();
        assert_eq!(snapshot.rate(Currency::Eur).unwrap(), 0.92);
        assert_eq!(cache.stats().snapshots_installed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_expires_after_ttl() {
        let cache = Arc::new(RateCache::with_config(RateCacheConfig {
            ttl: Duration::from_secs(60),
        }));

        cache
            .join_or_start(false, |at| async move { snapshot_at(at, 0.92) }.boxed())
            .await
            .unwrap();
        assert!(cache.fresh(Instant::now()).is_some());

        tokio::time::advance(Duration::from_secs(61)).await;

        assert!(cache.fresh(Instant::now()).is_none());
        assert!(matches!(
            cache.current(Instant::now()),
            Err(FxError::RatesUnavailable(UnavailableReason::Stale))
        ));
        assert!(cache.latest().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_joiners_share_one_fetch() {
        let cache = Arc::new(RateCache::new());

        let first = cache.join_or_start(false, |at| {
            async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                snapshot_at(at, 0.92)
            }
            .boxed()
        });
        let second = cache.join_or_start(false, |_| unreachable!("fetch must be shared"));

        let (a, b) = futures::join!(first, second);
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(cache.stats().fetches_started, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_clears_snapshot_and_records_error() {
        let cache = Arc::new(RateCache::new());
        cache
            .join_or_start(false, |at| async move { snapshot_at(at, 0.92) }.boxed())
            .await
            .unwrap();

        let result = cache
            .join_or_start(true, |_| {
                async { Err(FxError::ProviderError("boom".to_string())) }.boxed()
            })
            .await;

        assert!(matches!(result, Err(FxError::RateFetchFailed(msg)) if msg.contains("boom")));
        assert!(cache.latest().is_none());
        assert!(matches!(cache.last_error(), Some(FxError::ProviderError(_))));

        cache
            .join_or_start(false, |at| async move { snapshot_at(at, 0.93) }.boxed())
            .await
            .unwrap();
        assert!(cache.last_error().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_older_snapshot_does_not_replace_newer() {
        let cache = RateCache::new();
        let earlier = Instant::now();
        let later = earlier + Duration::from_millis(5);

        assert!(cache.install(Arc::new(snapshot_at(later, 0.95).unwrap())));
        assert!(!cache.install(Arc::new(snapshot_at(earlier, 0.90).unwrap())));

        let current = cache.latest().unwrap();
        assert_eq!(current.rate(Currency::Eur).unwrap(), 0.95);
        assert_eq!(cache.stats().results_discarded, 1);
    }
}
