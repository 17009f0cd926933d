//! Currency conversion arithmetic and valuation results.

use folio_common::{Currency, Money};
use serde::{Deserialize, Serialize};

use crate::error::FxResult;
use crate::snapshot::RateSnapshot;

/// Convert `amount` between currencies using one snapshot.
///
/// Same-currency conversion returns `amount` untouched. Otherwise the amount
/// goes through the base currency.
pub fn convert(snapshot: &RateSnapshot, amount: f64, from: Currency, to: Currency) -> FxResult<f64> {
    if from == to {
        return Ok(amount);
    }

    let in_base = if from.is_base() {
        amount
    } else {
        amount / snapshot.rate(from)?
    };

    if to.is_base() {
        Ok(in_base)
    } else {
        Ok(in_base * snapshot.rate(to)?)
    }
}

/// Sum of `entries` converted to `target` using one snapshot.
pub fn convert_all(snapshot: &RateSnapshot, entries: &[Money], target: Currency) -> FxResult<f64> {
    entries.iter().try_fold(0.0, |total, entry| {
        Ok(total + convert(snapshot, entry.amount, entry.currency, target)?)
    })
}

/// Sum of amounts with no conversion at all.
pub fn raw_sum(entries: &[Money]) -> f64 {
    entries.iter().map(|e| e.amount).sum()
}

/// A converted amount and whether it is only an approximation.
///
/// `degraded` is set when rates were unavailable and raw, unconverted
/// amounts were used instead. Callers must surface it to the user.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Valuation {
    pub amount: f64,
    pub currency: Currency,
    pub degraded: bool,
}

impl Valuation {
    /// A properly converted amount.
    pub fn exact(amount: f64, currency: Currency) -> Self {
        Self {
            amount,
            currency,
            degraded: false,
        }
    }

    /// A raw-sum approximation.
    pub fn degraded(amount: f64, currency: Currency) -> Self {
        Self {
            amount,
            currency,
            degraded: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tokio::time::Instant;

    fn snapshot() -> RateSnapshot {
        RateSnapshot::new(
            [(Currency::Eur, 0.92), (Currency::Ils, 3.7), (Currency::Gbp, 0.79)],
            Instant::now(),
            "TEST",
        )
        .unwrap()
    }

    fn currency() -> impl Strategy<Value = Currency> {
        prop::sample::select(Currency::ALL.to_vec())
    }

    #[test]
    fn test_eur_to_usd() {
        let result = convert(&snapshot(), 100.0, Currency::Eur, Currency::Usd).unwrap();
        assert!((result - 108.6957).abs() < 1e-3);
    }

    #[test]
    fn test_cross_rate_goes_through_base() {
        let result = convert(&snapshot(), 100.0, Currency::Gbp, Currency::Ils).unwrap();
        assert!((result - 100.0 / 0.79 * 3.7).abs() < 1e-9);
    }

    #[test]
    fn test_convert_all_to_usd() {
        let entries = [
            Money::new(100.0, Currency::Usd),
            Money::new(100.0, Currency::Eur),
            Money::new(100.0, Currency::Ils),
            Money::new(100.0, Currency::Gbp),
        ];

        let total = convert_all(&snapshot(), &entries, Currency::Usd).unwrap();
        assert!((total - 362.31).abs() < 0.01, "total was {}", total);
    }

    #[test]
    fn test_raw_sum() {
        let entries = [Money::new(10.0, Currency::Usd), Money::new(5.0, Currency::Eur)];
        assert_eq!(raw_sum(&entries), 15.0);
    }

    proptest! {
        #[test]
        fn prop_identity_is_exact(amount in 0.0f64..1e12, c in currency()) {
            prop_assert_eq!(convert(&snapshot(), amount, c, c).unwrap(), amount);
        }

        #[test]
        fn prop_round_trip_within_tolerance(
            amount in 0.01f64..1e12,
            from in currency(),
            to in currency(),
        ) {
            let snapshot = snapshot();
            let there = convert(&snapshot, amount, from, to).unwrap();
            let back = convert(&snapshot, there, to, from).unwrap();
            prop_assert!(((back - amount) / amount).abs() < 1e-9);
        }
    }
}
