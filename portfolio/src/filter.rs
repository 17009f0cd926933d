//! Asset list filtering.

use serde::{Deserialize, Serialize};

use folio_common::{Asset, AssetType, Currency, RiskLevel};

/// Criteria narrowing an asset list. Unset criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetFilter {
    pub asset_type: Option<AssetType>,
    pub currency: Option<Currency>,
    pub risk_level: Option<RiskLevel>,
    pub location: Option<String>,
}

impl AssetFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn asset_type(mut self, asset_type: AssetType) -> Self {
        self.asset_type = Some(asset_type);
        self
    }

    pub fn currency(mut self, currency: Currency) -> Self {
        self.currency = Some(currency);
        self
    }

    pub fn risk_level(mut self, risk_level: RiskLevel) -> Self {
        self.risk_level = Some(risk_level);
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Check if any criterion is set.
    pub fn is_active(&self) -> bool {
        self.asset_type.is_some()
            || self.currency.is_some()
            || self.risk_level.is_some()
            || self.location.is_some()
    }

    /// Check if an asset satisfies every set criterion.
    pub fn matches(&self, asset: &Asset) -> bool {
        self.asset_type.map_or(true, |t| asset.asset_type == t)
            && self.currency.map_or(true, |c| asset.currency == c)
            && self.risk_level.map_or(true, |r| asset.risk_level == r)
            && self
                .location
                .as_deref()
                .map_or(true, |l| asset.location == l)
    }

    /// Matching assets, in input order.
    pub fn apply(&self, assets: &[Asset]) -> Vec<Asset> {
        assets.iter().filter(|a| self.matches(a)).cloned().collect()
    }
}
