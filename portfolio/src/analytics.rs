//! Currency-aware portfolio analytics.
//!
//! All functions value every asset against one rate snapshot. When no fresh
//! snapshot is available, foreign-currency assets count at their raw amount
//! and the result is flagged `degraded`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tracing::debug;

use folio_common::{Asset, AssetId, Currency, RiskLevel};
use folio_fx::{conversion, FxEngine};

/// Share of high-risk holdings, in percent, above which a warning is raised.
pub const HIGH_RISK_WARNING_PERCENT: f64 = 30.0;

/// Number of holdings listed in [`Insights::top_holdings`].
pub const TOP_HOLDINGS: usize = 3;

const UNSPECIFIED: &str = "Unspecified";

pub(crate) struct Valued<'a> {
    pub asset: &'a Asset,
    pub value: f64,
}

/// Value every asset in `target` using a single snapshot.
pub(crate) fn value_assets<'a>(
    assets: &'a [Asset],
    fx: &FxEngine,
    target: Currency,
) -> (Vec<Valued<'a>>, bool) {
    let snapshot = fx.snapshot().ok();
    let mut degraded = false;

    let valued = assets
        .iter()
        .map(|asset| {
            let converted = match &snapshot {
                _ if asset.currency == target => Some(asset.value),
                Some(s) => conversion::convert(s, asset.value, asset.currency, target).ok(),
                None => None,
            };
            let value = converted.unwrap_or_else(|| {
                degraded = true;
                asset.value
            });
            Valued { asset, value }
        })
        .collect();

    if degraded {
        debug!(target = %target, "Rates unavailable, using raw asset values");
    }

    (valued, degraded)
}

/// Headline numbers for a set of assets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSummary {
    pub total_value: f64,
    pub currency: Currency,
    /// Value-weighted annual yield in percent; assets without a yield weigh in at 0.
    pub average_yield: f64,
    pub asset_count: usize,
    pub degraded: bool,
}

/// Summarize assets in `target`.
pub fn summarize(assets: &[Asset], fx: &FxEngine, target: Currency) -> PortfolioSummary {
    let (valued, degraded) = value_assets(assets, fx, target);
    let total_value: f64 = valued.iter().map(|v| v.value).sum();

    let average_yield = if total_value > 0.0 {
        valued
            .iter()
            .map(|v| v.asset.annual_yield.unwrap_or(0.0) * v.value)
            .sum::<f64>()
            / total_value
    } else {
        0.0
    };

    PortfolioSummary {
        total_value,
        currency: target,
        average_yield,
        asset_count: assets.len(),
        degraded,
    }
}

/// Attribute a breakdown groups assets by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Type,
    Currency,
    Risk,
    Location,
    Institution,
}

impl Dimension {
    pub const ALL: [Dimension; 5] = [
        Dimension::Type,
        Dimension::Currency,
        Dimension::Risk,
        Dimension::Location,
        Dimension::Institution,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Dimension::Type => "type",
            Dimension::Currency => "currency",
            Dimension::Risk => "risk",
            Dimension::Location => "location",
            Dimension::Institution => "institution",
        }
    }

    /// Group key and display label of an asset.
    fn classify(&self, asset: &Asset) -> (String, String) {
        match self {
            Dimension::Type => (
                asset.asset_type.key().to_string(),
                asset.asset_type.label().to_string(),
            ),
            Dimension::Currency => {
                let code = asset.currency.code().to_string();
                (code.clone(), code)
            }
            Dimension::Risk => (
                asset.risk_level.key().to_string(),
                asset.risk_level.label().to_string(),
            ),
            Dimension::Location => (asset.location.clone(), asset.location.clone()),
            Dimension::Institution => {
                let name = asset
                    .managing_institution
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .unwrap_or(UNSPECIFIED)
                    .to_string();
                (name.clone(), name)
            }
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for Dimension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|d| d.key() == wanted)
            .ok_or_else(|| format!("unknown breakdown dimension: {}", s))
    }
}

/// One group of a breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakdownSlice {
    pub key: String,
    pub label: String,
    pub value: f64,
    /// Share of the total in percent; 0 when the total is 0.
    pub percent: f64,
    pub asset_count: usize,
}

/// Assets grouped along one dimension, largest group first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Breakdown {
    pub dimension: Dimension,
    pub currency: Currency,
    pub total_value: f64,
    pub slices: Vec<BreakdownSlice>,
    pub degraded: bool,
}

/// Group assets by `dimension`, valued in `target`.
pub fn breakdown(
    assets: &[Asset],
    dimension: Dimension,
    fx: &FxEngine,
    target: Currency,
) -> Breakdown {
    let (valued, degraded) = value_assets(assets, fx, target);
    let total_value: f64 = valued.iter().map(|v| v.value).sum();

    let mut groups: BTreeMap<String, BreakdownSlice> = BTreeMap::new();
    for item in &valued {
        let (key, label) = dimension.classify(item.asset);
        let slice = groups.entry(key.clone()).or_insert_with(|| BreakdownSlice {
            key,
            label,
            value: 0.0,
            percent: 0.0,
            asset_count: 0,
        });
        slice.value += item.value;
        slice.asset_count += 1;
    }

    let mut slices: Vec<BreakdownSlice> = groups
        .into_values()
        .map(|mut slice| {
            if total_value > 0.0 {
                slice.percent = slice.value / total_value * 100.0;
            }
            slice
        })
        .collect();
    slices.sort_by(|a, b| b.value.total_cmp(&a.value).then_with(|| a.key.cmp(&b.key)));

    Breakdown {
        dimension,
        currency: target,
        total_value,
        slices,
        degraded,
    }
}

/// A holding with its converted value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Holding {
    pub id: AssetId,
    pub name: String,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annual_yield: Option<f64>,
}

impl Holding {
    fn from_valued(v: &Valued<'_>) -> Self {
        Self {
            id: v.asset.id,
            name: v.asset.name.clone(),
            value: v.value,
            annual_yield: v.asset.annual_yield,
        }
    }
}

/// Risk and yield observations about a portfolio.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insights {
    pub total_value: f64,
    pub currency: Currency,
    pub risk_totals: BTreeMap<RiskLevel, f64>,
    pub high_risk_percent: f64,
    /// Set when the high-risk share exceeds [`HIGH_RISK_WARNING_PERCENT`].
    pub high_risk_warning: bool,
    pub top_holdings: Vec<Holding>,
    pub highest_yield: Option<Holding>,
    pub lowest_yield: Option<Holding>,
    pub degraded: bool,
}

/// Insights for a non-empty asset list.
pub fn insights(assets: &[Asset], fx: &FxEngine, target: Currency) -> Option<Insights> {
    if assets.is_empty() {
        return None;
    }

    let (valued, degraded) = value_assets(assets, fx, target);
    let total_value: f64 = valued.iter().map(|v| v.value).sum();

    let mut risk_totals = BTreeMap::new();
    for item in &valued {
        *risk_totals.entry(item.asset.risk_level).or_insert(0.0) += item.value;
    }

    let high_risk = risk_totals.get(&RiskLevel::High).copied().unwrap_or(0.0);
    let high_risk_percent = if total_value > 0.0 {
        high_risk / total_value * 100.0
    } else {
        0.0
    };

    let mut ranked: Vec<&Valued<'_>> = valued.iter().collect();
    ranked.sort_by(|a, b| b.value.total_cmp(&a.value));
    let top_holdings = ranked
        .iter()
        .take(TOP_HOLDINGS)
        .map(|v| Holding::from_valued(v))
        .collect();

    let with_yield = || {
        valued
            .iter()
            .filter_map(|v| v.asset.annual_yield.map(|y| (y, v)))
    };
    let highest_yield = with_yield()
        .fold(None, |best: Option<(f64, &Valued<'_>)>, (y, v)| match best {
            Some((b, _)) if b >= y => best,
            _ => Some((y, v)),
        })
        .map(|(_, v)| Holding::from_valued(v));
    let lowest_yield = with_yield()
        .fold(None, |best: Option<(f64, &Valued<'_>)>, (y, v)| match best {
            Some((b, _)) if b <= y => best,
            _ => Some((y, v)),
        })
        .map(|(_, v)| Holding::from_valued(v));

    Some(Insights {
        total_value,
        currency: target,
        risk_totals,
        high_risk_percent,
        high_risk_warning: high_risk_percent > HIGH_RISK_WARNING_PERCENT,
        top_holdings,
        highest_yield,
        lowest_yield,
        degraded,
    })
}
