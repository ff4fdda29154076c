//! Market Feed Validator Binary
//!
//! Validates a persisted JSON Lines market-state file and prints the report.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p market-feed -- records.jsonl --csv-dir out/ --metrics
//! ```
//!
//! # Environment Variables
//!
//! - `MARKET_FEED_CONFIG`: Path to the YAML config (default: built-in defaults)
//! - `RUST_LOG`: Log filter, overrides `logging.level`

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use market_feed::infrastructure::config::{Config, load_config};
use market_feed::infrastructure::metrics::{init_metrics, record_validation};
use market_feed::infrastructure::records::export_all;
use market_feed::infrastructure::telemetry;
use market_feed::{MultiStreamValidator, RecordWindow};

#[derive(Parser, Debug)]
#[command(name = "market-feed-validate")]
#[command(about = "Validate persisted futures market-state records")]
struct Args {
    /// JSON Lines input file.
    input: PathBuf,

    /// YAML configuration file.
    #[arg(long, env = "MARKET_FEED_CONFIG")]
    config: Option<String>,

    /// Directory for CSV exports.
    #[arg(long)]
    csv_dir: Option<PathBuf>,

    /// Print Prometheus metrics after the report.
    #[arg(long, default_value = "false")]
    metrics: bool,
}

fn main() -> anyhow::Result<()> {
    // Missing .env is fine
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let config = match args.config.as_deref() {
        Some(path) => load_config(Some(path))?,
        None => Config::default(),
    };

    telemetry::init(&config.logging)?;

    let metrics = if args.metrics {
        Some(init_metrics().context("installing metrics recorder")?)
    } else {
        None
    };

    let window = RecordWindow::open(&args.input, config.validator.max_records())?;
    let validator = MultiStreamValidator::new(config.validator.to_validator_config());
    let report = validator.validate(&window);
    record_validation(&report);

    if let Some(dir) = &args.csv_dir {
        export_all(&window, &report, dir)
            .with_context(|| format!("writing CSV exports to {}", dir.display()))?;
    }

    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &report)?;
    writeln!(stdout)?;

    if let Some(handle) = metrics {
        write!(stdout, "{}", handle.render())?;
    }

    tracing::info!(
        records = report.records_parsed,
        skipped = report.skipped_count,
        anomalies = report.total_anomalies(),
        "Validation finished"
    );

    Ok(())
}
