//! Portfolio report rendering.

use std::fmt;

use serde::Serialize;

use folio_common::{Asset, Currency};
use folio_fx::{FxEngine, RateStatus};
use folio_portfolio::{breakdown, insights, summarize, Breakdown, Dimension, Insights, PortfolioSummary};

/// Everything the `report` command prints.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub summary: PortfolioSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<Breakdown>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insights: Option<Insights>,
    pub rates: RateStatus,
}

impl Report {
    /// Build a report for `assets` valued in `currency`.
    pub fn build(
        assets: &[Asset],
        fx: &FxEngine,
        currency: Currency,
        dimension: Option<Dimension>,
    ) -> Self {
        Self {
            summary: summarize(assets, fx, currency),
            breakdown: dimension.map(|d| breakdown(assets, d, fx, currency)),
            insights: insights(assets, fx, currency),
            rates: fx.status(),
        }
    }

    /// Check if any figure used raw, unconverted values.
    pub fn is_degraded(&self) -> bool {
        self.summary.degraded
            || self.breakdown.as_ref().is_some_and(|b| b.degraded)
            || self.insights.as_ref().is_some_and(|i| i.degraded)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let currency = self.summary.currency;

        if self.is_degraded() {
            writeln!(
                f,
                "WARNING: exchange rates unavailable; totals add raw amounts across currencies"
            )?;
            if let Some(error) = &self.rates.error {
                writeln!(f, "         ({})", error)?;
            }
            writeln!(f)?;
        }

        writeln!(f, "Portfolio")?;
        writeln!(f, "  Total value:    {:.2} {}", self.summary.total_value, currency)?;
        writeln!(f, "  Assets:         {}", self.summary.asset_count)?;
        writeln!(f, "  Average yield:  {:.2}%", self.summary.average_yield)?;

        if let Some(breakdown) = &self.breakdown {
            writeln!(f)?;
            writeln!(f, "By {}", breakdown.dimension)?;
            for slice in &breakdown.slices {
                writeln!(
                    f,
                    "  {:<20} {:>14.2} {} {:>6.1}%",
                    slice.label, slice.value, currency, slice.percent
                )?;
            }
        }

        if let Some(insights) = &self.insights {
            writeln!(f)?;
            writeln!(f, "Insights")?;
            if insights.high_risk_warning {
                writeln!(
                    f,
                    "  High risk exposure: {:.1}% of the portfolio is in high-risk assets",
                    insights.high_risk_percent
                )?;
            }
            writeln!(f, "  Top holdings:")?;
            for holding in &insights.top_holdings {
                writeln!(f, "    {:<20} {:>14.2} {}", holding.name, holding.value, currency)?;
            }
            if let Some(best) = &insights.highest_yield {
                writeln!(
                    f,
                    "  Highest yield: {} ({:.2}%)",
                    best.name,
                    best.annual_yield.unwrap_or_default()
                )?;
            }
            if let Some(worst) = &insights.lowest_yield {
                writeln!(
                    f,
                    "  Lowest yield:  {} ({:.2}%)",
                    worst.name,
                    worst.annual_yield.unwrap_or_default()
                )?;
            }
        }

        if let Some(fetched_at) = self.rates.fetched_at {
            writeln!(f)?;
            writeln!(f, "Rates as of {}", fetched_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
        }

        Ok(())
    }
}
