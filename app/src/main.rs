//! Folio command-line tool
//!
//! Reports on a portfolio exported as JSON, shows current exchange rates and
//! runs an interactive session guarded by the idle monitor.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use folio_app::{build_rate_provider, App, AppConfig, LocalAuth, Report};
use folio_common::{AssetType, Currency, RiskLevel};
use folio_portfolio::{to_csv, AssetFilter, AssetStore, Dimension, InMemoryAssetStore};
use folio_session::{AuthProvider, HostEvent, InteractionKind, LoggingNavigator, MemoryTokenStore};

/// Folio CLI
#[derive(Parser, Debug)]
#[command(name = "folio")]
#[command(about = "Multi-currency portfolio tracker")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Summarize a portfolio file
    Report(ReportArgs),

    /// Show current exchange rates
    Rates {
        /// Quote rates per unit of this currency
        #[arg(short, long)]
        currency: Option<Currency>,
    },

    /// Keep a session open until it idles out
    ///
    /// Every line read from stdin counts as a key press; `logout` signs out.
    Session,
}

#[derive(clap::Args, Debug)]
struct ReportArgs {
    /// JSON file holding a list of assets
    #[arg(short, long)]
    assets: PathBuf,

    /// Currency to value the portfolio in
    #[arg(short, long)]
    currency: Option<Currency>,

    /// Group holdings by type, currency, risk, location or institution
    #[arg(short, long)]
    breakdown: Option<Dimension>,

    /// Only holdings of this type (stock, etf, realEstate, ...)
    #[arg(long = "type", value_name = "TYPE")]
    asset_type: Option<AssetType>,

    /// Only holdings denominated in this currency
    #[arg(long, value_name = "CURRENCY")]
    held_in: Option<Currency>,

    /// Only holdings at this risk level
    #[arg(long)]
    risk: Option<RiskLevel>,

    /// Only holdings in this location
    #[arg(long)]
    location: Option<String>,

    /// Print the holdings as CSV instead
    #[arg(long, conflicts_with = "json")]
    csv: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

impl ReportArgs {
    fn filter(&self) -> AssetFilter {
        AssetFilter {
            asset_type: self.asset_type,
            currency: self.held_in,
            risk_level: self.risk,
            location: self.location.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = AppConfig::from_env();

    // Initialize logging
    let json = config.log_json;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone()),
        ))
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }

    let provider = build_rate_provider(&config).context("building rate provider")?;
    let auth = Arc::new(LocalAuth::from_env());
    let tokens = Arc::new(MemoryTokenStore::new());
    for key in &config.idle.auth_token_keys {
        tokens.insert(key.clone(), "local-session");
    }

    let display_currency = config.display_currency;
    let app = App::new(config, provider, auth.clone(), Arc::new(LoggingNavigator), tokens);
    app.start()?;

    let result = match args.command {
        Command::Report(report_args) => {
            let currency = report_args.currency.unwrap_or(display_currency);
            report(&app, auth.as_ref(), report_args, currency).await
        }
        Command::Rates { currency } => rates(&app, currency.unwrap_or(Currency::BASE)).await,
        Command::Session => session(&app, auth.as_ref()).await,
    };

    app.stop().await?;
    result
}

async fn report(
    app: &App,
    auth: &LocalAuth,
    args: ReportArgs,
    currency: Currency,
) -> anyhow::Result<()> {
    let user = auth
        .current_user()
        .await
        .context("no signed-in user")?;

    let path = &args.assets;
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;

    let store = InMemoryAssetStore::new();
    store.import_json(&user.id, &content).await?;
    let mut assets = store.list(&user.id).await?;

    let filter = args.filter();
    if filter.is_active() {
        assets = filter.apply(&assets);
    }

    info!(
        path = %path.display(),
        assets = assets.len(),
        filtered = filter.is_active(),
        currency = %currency,
        "Portfolio loaded"
    );

    if let Err(e) = app.fx().ensure_rates_loaded().await {
        warn!(error = %e, "Exchange rates unavailable, values will not be converted");
    }

    if args.csv {
        let export = to_csv(&assets, app.fx(), currency);
        if export.degraded {
            warn!(currency = %currency, "CSV contains unconverted values");
            eprintln!(
                "warning: exchange rates unavailable; some values are in their own currency, not {}",
                currency
            );
        }
        println!("{}", export.csv);
        return Ok(());
    }

    let report = Report::build(&assets, app.fx(), currency, args.breakdown);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report);
    }
    Ok(())
}

async fn rates(app: &App, quote: Currency) -> anyhow::Result<()> {
    app.fx().ensure_rates_loaded().await?;
    let snapshot = app.fx().snapshot()?;

    println!(
        "Rates from {} as of {}",
        snapshot.source(),
        snapshot.fetched_at().format("%Y-%m-%d %H:%M:%S UTC")
    );
    for currency in Currency::ALL.into_iter().filter(|c| *c != quote) {
        let rate = app.fx().convert(1.0, quote, currency)?;
        println!("  1 {} = {:.4} {}", quote, rate, currency);
    }
    Ok(())
}

async fn session(app: &App, auth: &LocalAuth) -> anyhow::Result<()> {
    let mut presence = auth.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    info!(
        idle_timeout = ?app.config().idle.idle_timeout,
        "Session open; type to stay signed in, `logout` to sign out"
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
            changed = presence.changed() => {
                if changed.is_err() || presence.borrow_and_update().is_none() {
                    info!("Signed out, session closed");
                    break;
                }
            }
            line = lines.next_line() => {
                let event = match line? {
                    Some(text) if text.trim() == "logout" => HostEvent::LogoutRequested,
                    Some(_) => HostEvent::Interaction(InteractionKind::KeyDown),
                    None => break,
                };
                app.notify(event).await?;
            }
        }
    }
    Ok(())
}
