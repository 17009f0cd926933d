//! Immutable, timestamped sets of exchange rates.

use std::collections::BTreeMap;
use std::time::Duration;

use folio_common::{Currency, Timestamp};
use serde::Serialize;
use tokio::time::Instant;

use crate::error::{FxError, FxResult, UnavailableReason};

/// One complete set of rates against [`Currency::BASE`].
///
/// Each rate is "units of this currency per 1 unit of base". A snapshot is
/// never mutated; a newer fetch replaces it wholesale.
#[derive(Debug, Clone, Serialize)]
pub struct RateSnapshot {
    rates: BTreeMap<Currency, f64>,
    fetched_at: Timestamp,
    #[serde(skip)]
    captured_at: Instant,
    source: String,
}

impl RateSnapshot {
    /// Build a snapshot from fetched rates.
    ///
    /// The base rate is pinned to 1. Fails unless every non-base currency
    /// is present with a positive finite rate.
    pub fn new(
        rates: impl IntoIterator<Item = (Currency, f64)>,
        captured_at: Instant,
        source: impl Into<String>,
    ) -> FxResult<Self> {
        let mut table = BTreeMap::new();
        for (currency, rate) in rates {
            if currency.is_base() {
                continue;
            }
            if !rate.is_finite() || rate <= 0.0 {
                return Err(FxError::InvalidRate { currency, rate });
            }
            table.insert(currency, rate);
        }

        if let Some(missing) = Currency::non_base().find(|c| !table.contains_key(c)) {
            return Err(FxError::ProviderError(format!(
                "incomplete rate set: missing {}",
                missing
            )));
        }

        table.insert(Currency::BASE, 1.0);

        Ok(Self {
            rates: table,
            fetched_at: folio_common::now(),
            captured_at,
            source: source.into(),
        })
    }

    /// Rate for a currency.
    pub fn rate(&self, currency: Currency) -> FxResult<f64> {
        self.rates
            .get(&currency)
            .copied()
            .ok_or(FxError::RatesUnavailable(UnavailableReason::MissingRate(
                currency,
            )))
    }

    /// All rates, base included.
    pub fn rates(&self) -> &BTreeMap<Currency, f64> {
        &self.rates
    }

    /// Wall-clock capture time.
    pub fn fetched_at(&self) -> Timestamp {
        self.fetched_at
    }

    /// Monotonic instant the fetch that produced this snapshot started.
    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    /// Name of the provider that produced the rates.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Age relative to `now`.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.captured_at)
    }

    /// Check if the snapshot may still be used for conversion.
    pub fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        self.age(now) < ttl
    }

    /// Check if this snapshot comes from a later fetch than `other`.
    pub fn is_newer_than(&self, other: &RateSnapshot) -> bool {
        self.captured_at > other.captured_at
    }
}
