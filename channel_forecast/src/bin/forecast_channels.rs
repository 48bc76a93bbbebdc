//! Notification forecasting CLI
//!
//! Loads a notification count table, forecasts every channel with the full
//! model panel and writes `report.json` and `forecasts.csv`.

use channel_forecast::config::ForecastConfig;
use channel_forecast::data::{ChannelDataset, DataLoader, Frequency};
use channel_forecast::pipeline::ForecastPipeline;
use clap::Parser;
use std::error::Error;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "forecast_channels")]
#[command(about = "Forecast notification volumes per channel")]
struct Args {
    /// CSV file with a period column, a channel column and notification_count
    #[arg(short, long)]
    input: PathBuf,

    /// Sampling frequency (monthly, weekly); overrides the configuration file
    #[arg(short, long, value_parser = parse_frequency)]
    frequency: Option<Frequency>,

    /// Periods to forecast; overrides the configuration file
    #[arg(long)]
    horizon: Option<usize>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for the report and forecast table
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// Do not forecast the sum over all channels
    #[arg(long)]
    no_total: bool,
}

fn parse_frequency(raw: &str) -> Result<Frequency, String> {
    raw.parse::<Frequency>().map_err(|e| e.to_string())
}

/// Command-line values take precedence over the configuration file
fn apply_overrides(config: &mut ForecastConfig, args: &Args) {
    if let Some(frequency) = args.frequency {
        config.frequency = frequency;
    }
    if let Some(horizon) = args.horizon {
        config.horizon = horizon;
    }
    if args.no_total {
        config.include_total = false;
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ForecastConfig::from_json_file(path)?,
        None => ForecastConfig::default(),
    };
    apply_overrides(&mut config, &args);

    let records = DataLoader::from_csv(&args.input, config.frequency)?;
    let mut dataset = ChannelDataset::from_records(&records, config.frequency)?;
    if config.include_total {
        dataset = dataset.with_total()?;
    }

    let pipeline = ForecastPipeline::new(config)?;
    let report = pipeline.run(&dataset)?;
    let (report_path, forecasts_path) = report.save(&args.output)?;

    println!("{}", report.evaluation_summary());
    println!("Best models");
    println!("{}", report.best_models_summary());
    info!(
        report = %report_path.display(),
        forecasts = %forecasts_path.display(),
        "Forecasting run complete"
    );

    Ok(())
}
