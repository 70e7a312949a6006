use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Parser;
use dotenvy::dotenv;
use tracing::info;

use liquidity_forecast::config::{self, Config};
use liquidity_forecast::data::{loader, simulation};
use liquidity_forecast::logging;

/// Write a simulated daily cashflow table to CSV.
#[derive(Parser, Debug)]
#[command(name = "simulate_data")]
#[command(about = "Generate simulated cumulative cashflows", long_about = None)]
struct Args {
    /// Output CSV path
    #[arg(short, long, default_value = "cashflows.csv")]
    output: PathBuf,

    /// Random seed
    #[arg(long)]
    seed: Option<u64>,

    /// First date (YYYY-MM-DD)
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Last date, inclusive (YYYY-MM-DD)
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Comma separated currency columns
    #[arg(short, long)]
    currencies: Option<String>,
}

fn main() -> eyre::Result<()> {
    let args = Args::parse();
    dotenv().ok();
    logging::init_logging(env!("CARGO_BIN_NAME").to_string())?;

    let mut sim = Config::load()?.simulation;
    if let Some(seed) = args.seed {
        sim.seed = seed;
    }
    if let Some(start) = args.start {
        sim.start = start;
    }
    if let Some(end) = args.end {
        sim.end = end;
    }
    if let Some(raw) = &args.currencies {
        sim.currencies = config::parse_list(raw);
    }

    let table = simulation::simulate_cashflows(&sim)?;
    loader::save_csv(&args.output, &table)?;
    info!(
        path = %args.output.display(),
        rows = table.len(),
        currencies = ?table.currencies(),
        "Simulated cashflows written"
    );
    Ok(())
}
