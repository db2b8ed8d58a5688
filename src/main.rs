//! StockPiece: chapter replay
//!
//! Entry point. Loads configuration, initialises structured logging,
//! lists the seeded assets and replays each scripted chapter through
//! the market, printing a summary at the end.
//!
//! Usage: `stockpiece [config.toml] [--json]`

use anyhow::{Context, Result};
use tracing::{info, warn};

use stockpiece::config::AppConfig;
use stockpiece::engine::{Market, PricingEngine};
use stockpiece::types::PeriodReport;

const DEFAULT_CONFIG: &str = "config.toml";

fn main() -> Result<()> {
    let mut config_path = DEFAULT_CONFIG.to_string();
    let mut json_summary = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--json" => json_summary = true,
            other => config_path = other.to_string(),
        }
    }

    init_logging();

    let cfg = AppConfig::load(&config_path)?;
    let engine = PricingEngine::new(cfg.pricing.clone())
        .with_context(|| format!("Invalid [pricing] section in {config_path}"))?;

    info!(
        config = %config_path,
        floor_price = engine.config().floor_price,
        asymmetric_drop = engine.config().asymmetric_drop,
        model = ?engine.config().model,
        "StockPiece starting up"
    );

    let mut market = Market::new(engine);
    for seed in &cfg.assets {
        market
            .list(&seed.name, seed.price, seed.circulation)
            .with_context(|| format!("Failed to list asset {}", seed.name))?;
    }

    if cfg.periods.is_empty() {
        warn!("No [[periods]] in config, nothing to replay");
    }

    let mut reports = Vec::with_capacity(cfg.periods.len());
    for period in &cfg.periods {
        for trade in &period.trades {
            if let Err(e) = market.record_trade(&trade.asset, trade.side, trade.quantity) {
                warn!(
                    asset = %trade.asset,
                    side = %trade.side,
                    quantity = trade.quantity,
                    error = %e,
                    "Trade rejected"
                );
            }
        }
        let report = market
            .close_period()
            .with_context(|| format!("Failed to close chapter {}", market.chapter() + 1))?;
        log_period_report(&report);
        reports.push(report);
    }

    if json_summary {
        let assets: Vec<_> = market.assets().collect();
        let summary = serde_json::json!({
            "chapter": market.chapter(),
            "assets": assets,
            "reports": reports,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("After chapter {}:", market.chapter());
        for asset in market.assets() {
            println!("  {asset}");
        }
    }

    Ok(())
}

/// Log a human-readable chapter summary.
fn log_period_report(report: &PeriodReport) {
    for entry in &report.updates {
        info!(
            chapter = report.chapter,
            asset = %entry.name,
            price = format!("{:.2}", entry.update.new_price),
            change = format!("{:+.2}%", entry.update.percent_change),
            floor = entry.update.floor_engaged,
            "Repriced"
        );
    }
    info!("{report}");
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("stockpiece=info"));

    let json_logging = std::env::var("STOCKPIECE_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }
}
