//! BridgeLedger Binary
//!
//! Runs a conversion scenario against an in-process service with a
//! simulated price feed and prints the resulting report as JSON.

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bridgeledger_common::Price;
use bridgeledger_service::{Scenario, ScenarioRunner, ServiceConfig};

/// BridgeLedger CLI
#[derive(Parser, Debug)]
#[command(name = "bridgeledger")]
#[command(about = "Source-to-target asset conversion ledger")]
struct Args {
    /// JSON scenario file to run (built-in demo when omitted)
    #[arg(short, long)]
    scenario: Option<String>,

    /// Simulated source asset price in USD, e.g. 0.62
    #[arg(long)]
    source_price: Option<String>,

    /// Simulated target asset price in USD, e.g. 0.045
    #[arg(long)]
    target_price: Option<String>,

    /// Print Prometheus metrics after the report
    #[arg(long)]
    metrics: bool,
}

fn init_logging(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(filter);
    if std::env::var("BRIDGELEDGER_LOG_JSON").as_deref() == Ok("1") {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = ServiceConfig::from_env()?;
    init_logging(&config.log_level);

    if let Some(price) = &args.source_price {
        config.source_price = Some(Price::from_decimal_str(price)?);
    }
    if let Some(price) = &args.target_price {
        config.target_price = Some(Price::from_decimal_str(price)?);
    }

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }

    let scenario = match &args.scenario {
        Some(path) => Scenario::from_file(path)?,
        None => Scenario::demo(),
    };

    info!(
        source = %config.source_asset,
        target = %config.target_asset,
        scenario = %scenario.name,
        "Starting BridgeLedger"
    );

    let runner = ScenarioRunner::new(config)?;
    let report = runner.run(&scenario).await;

    println!("{}", serde_json::to_string_pretty(&report)?);
    if args.metrics {
        println!("{}", runner.service().metrics().to_prometheus());
    }

    info!(
        failed_steps = report.failed_steps(),
        conversions = report.stats.conversion_count,
        "Scenario complete"
    );

    Ok(())
}
