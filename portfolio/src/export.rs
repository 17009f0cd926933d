//! CSV export of asset lists.

use folio_common::{Asset, Currency};
use folio_fx::FxEngine;

use crate::analytics::value_assets;

/// Rendered CSV and whether any value in it is unconverted.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvExport {
    pub csv: String,
    /// Some values were written in their own currency for lack of rates.
    pub degraded: bool,
}

/// Render assets as CSV with values converted to `target`.
///
/// Fields containing commas, quotes or newlines are quoted. Rows are
/// separated by `\n` with no trailing newline.
pub fn to_csv(assets: &[Asset], fx: &FxEngine, target: Currency) -> CsvExport {
    let (valued, degraded) = value_assets(assets, fx, target);

    let header = format!(
        "Name,Type,Value ({}),Original Value,Currency,Risk Level,Annual Yield,Location",
        target.code()
    );

    let mut lines = Vec::with_capacity(valued.len() + 1);
    lines.push(header);

    for item in &valued {
        let asset = item.asset;
        let fields = [
            escape(&asset.name),
            asset.asset_type.key().to_string(),
            format!("{:.2}", item.value),
            asset.value.to_string(),
            asset.currency.code().to_string(),
            asset.risk_level.key().to_string(),
            asset
                .annual_yield
                .map(|y| y.to_string())
                .unwrap_or_default(),
            escape(&asset.location),
        ];
        lines.push(fields.join(","));
    }

    CsvExport {
        csv: lines.join("\n"),
        degraded,
    }
}

fn escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::tests::{fx, loaded_fx, portfolio};

    #[tokio::test]
    async fn test_csv_layout() {
        let export = to_csv(&portfolio(), &loaded_fx().await, Currency::Usd);
        assert!(!export.degraded);

        let csv = export.csv;
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(
            lines[0],
            "Name,Type,Value (USD),Original Value,Currency,Risk Level,Annual Yield,Location"
        );
        assert_eq!(lines[1], "VTI,stock,1000.00,1000,USD,high,10,USA");
        assert_eq!(lines[2], "Deposit,cash,500.00,460,EUR,low,2,Germany");
        assert_eq!(lines[3], "Flat,realEstate,2000.00,7400,ILS,medium,,Israel");
        assert!(!csv.ends_with('\n'));
    }

    #[tokio::test]
    async fn test_csv_quotes_special_characters() {
        let mut assets = portfolio();
        assets[0].name = "Vanguard \"Total\", US".to_string();

        let csv = to_csv(&assets, &fx(), Currency::Eur).csv;

        assert!(csv.starts_with("Name,Type,Value (EUR),"));
        assert!(csv.contains("\"Vanguard \"\"Total\"\", US\",stock,"));
    }

    #[tokio::test]
    async fn test_csv_without_rates_is_degraded() {
        let export = to_csv(&portfolio(), &fx(), Currency::Usd);

        assert!(export.degraded);
        let lines: Vec<&str> = export.csv.lines().collect();
        assert_eq!(lines[2], "Deposit,cash,460.00,460,EUR,low,2,Germany");

        let assets = portfolio();
        assert!(!to_csv(&assets[..1], &fx(), Currency::Usd).degraded);
    }

    #[test]
    fn test_escape_plain_value() {
        assert_eq!(escape("Tel Aviv"), "Tel Aviv");
        assert_eq!(escape("a\nb"), "\"a\nb\"");
    }
}
