//! Convert a monthly notification table into a weekly one
//!
//! Every monthly count is spread evenly over the weeks of its month and
//! written with a `week` period column, ready for `--frequency weekly`.

use channel_forecast::data::{DataLoader, Frequency};
use clap::Parser;
use std::error::Error;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "monthly_to_weekly")]
#[command(about = "Spread monthly notification counts over weeks")]
struct Args {
    /// CSV file with month, channels and notification_count columns
    #[arg(short, long)]
    input: PathBuf,

    /// Destination CSV with week, channels and notification_count columns
    #[arg(short, long)]
    output: PathBuf,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let monthly = DataLoader::from_csv(&args.input, Frequency::Monthly)?;
    let weekly = DataLoader::monthly_to_weekly(&monthly)?;
    DataLoader::write_csv(&weekly, Frequency::Weekly, BufWriter::new(File::create(&args.output)?))?;

    info!(
        input = %args.input.display(),
        output = %args.output.display(),
        monthly = monthly.len(),
        weekly = weekly.len(),
        "Weekly table written"
    );

    Ok(())
}
