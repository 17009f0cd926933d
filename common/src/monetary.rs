//! Monetary types for Folio.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::FolioError;

/// Supported currencies.
///
/// The set is closed: rates are only ever fetched and cached for these
/// four codes, with [`Currency::BASE`] as the reference currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
    Ils,
    Gbp,
}

impl Currency {
    /// Reference currency all cached rates are expressed against.
    pub const BASE: Currency = Currency::Usd;

    /// Every supported currency, base first.
    pub const ALL: [Currency; 4] = [Currency::Usd, Currency::Eur, Currency::Ils, Currency::Gbp];

    /// Get the ISO 4217 code.
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Ils => "ILS",
            Currency::Gbp => "GBP",
        }
    }

    /// Check if this is the base currency.
    pub fn is_base(&self) -> bool {
        *self == Self::BASE
    }

    /// Currencies whose rates must be fetched (everything but the base).
    pub fn non_base() -> impl Iterator<Item = Currency> {
        Self::ALL.into_iter().filter(|c| !c.is_base())
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Currency {
    type Err = FolioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            "ILS" => Ok(Currency::Ils),
            "GBP" => Ok(Currency::Gbp),
            other => Err(FolioError::UnsupportedCurrency(other.to_string())),
        }
    }
}

/// An amount held in a specific currency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Money {
    /// The amount value.
    pub amount: f64,
    /// Currency of the amount.
    pub currency: Currency,
}

impl Money {
    /// Create a new Money instance.
    pub fn new(amount: f64, currency: Currency) -> Self {
        Self { amount, currency }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} {}", self.amount, self.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_parse() {
        assert_eq!("usd".parse::<Currency>().unwrap(), Currency::Usd);
        assert_eq!(" ILS ".parse::<Currency>().unwrap(), Currency::Ils);
        assert!(matches!(
            "JPY".parse::<Currency>(),
            Err(FolioError::UnsupportedCurrency(code)) if code == "JPY"
        ));
    }

    #[test]
    fn test_non_base_currencies() {
        let others: Vec<Currency> = Currency::non_base().collect();
        assert_eq!(others, vec![Currency::Eur, Currency::Ils, Currency::Gbp]);
    }

    #[test]
    fn test_currency_serde_codes() {
        let json = serde_json::to_string(&Currency::Gbp).unwrap();
        assert_eq!(json, "\"GBP\"");

        let parsed: Currency = serde_json::from_str("\"EUR\"").unwrap();
        assert_eq!(parsed, Currency::Eur);
    }

    #[test]
    fn test_money_display() {
        let money = Money::new(1234.5, Currency::Eur);
        assert_eq!(money.to_string(), "1234.50 EUR");
    }
}
