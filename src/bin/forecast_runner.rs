use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Parser;
use dotenvy::dotenv;
use eyre::WrapErr;
use tracing::{info, instrument, warn};

use liquidity_forecast::chart;
use liquidity_forecast::config::{self, Config};
use liquidity_forecast::data::{self, CashflowTable, loader, simulation};
use liquidity_forecast::export;
use liquidity_forecast::logging;
use liquidity_forecast::model::{ArimaOrder, SeasonalOrder};
use liquidity_forecast::report;
use liquidity_forecast::strategy::engine;

/// Forecast per-currency cashflows and allocate liquidity across them.
#[derive(Parser, Debug)]
#[command(name = "forecast_runner")]
#[command(about = "Forecast cashflows with seasonal ARIMA and allocate liquidity", long_about = None)]
struct Args {
    /// Input CSV or spreadsheet (Date column followed by one column per currency); simulated data when omitted
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Forecast horizon in days
    #[arg(long)]
    horizon: Option<usize>,

    /// Non-seasonal order as p,d,q
    #[arg(long)]
    order: Option<ArimaOrder>,

    /// Seasonal order as P,D,Q,s
    #[arg(long)]
    seasonal_order: Option<SeasonalOrder>,

    /// Comma separated subset of currencies to forecast
    #[arg(short, long)]
    currencies: Option<String>,

    /// Workbook path for the exported results
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Skip the workbook export
    #[arg(long, default_value_t = false)]
    no_export: bool,

    /// Also dump the run as JSON to this path
    #[arg(long)]
    json: Option<PathBuf>,

    /// Also render history and forecasts as an SVG chart to this path
    #[arg(long)]
    chart: Option<PathBuf>,

    /// Simulation seed
    #[arg(long)]
    seed: Option<u64>,

    /// Simulation start date (YYYY-MM-DD)
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Simulation end date, inclusive (YYYY-MM-DD)
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Retry failed fits once without seasonal terms
    #[arg(long, default_value_t = false)]
    relax_on_failure: bool,

    /// Wall-clock limit per fit in seconds (0 disables)
    #[arg(long)]
    fit_timeout_secs: Option<u64>,

    /// Optimizer iteration limit per fit
    #[arg(long)]
    max_iters: Option<u64>,
}

impl Args {
    /// Command-line flags win over environment values.
    fn apply(&self, cfg: &mut Config) {
        if let Some(horizon) = self.horizon {
            cfg.horizon = horizon;
        }
        if let Some(order) = self.order {
            cfg.order = order;
        }
        if let Some(seasonal) = self.seasonal_order {
            cfg.seasonal = seasonal;
        }
        if let Some(raw) = &self.currencies {
            cfg.currencies = config::parse_list(raw);
        }
        if let Some(input) = &self.input {
            cfg.input_path = Some(input.clone());
        }
        if let Some(output) = &self.output {
            cfg.output_path = output.clone();
        }
        if let Some(seed) = self.seed {
            cfg.simulation.seed = seed;
        }
        if let Some(start) = self.start {
            cfg.simulation.start = start;
        }
        if let Some(end) = self.end {
            cfg.simulation.end = end;
        }
        if self.relax_on_failure {
            cfg.relax_on_failure = true;
        }
        if let Some(secs) = self.fit_timeout_secs {
            cfg.fit_timeout = (secs > 0).then(|| std::time::Duration::from_secs(secs));
        }
        if let Some(iters) = self.max_iters {
            cfg.fit_max_iters = iters;
        }
    }
}

#[instrument(name = "forecast_runner_main")]
fn main() -> eyre::Result<()> {
    let args = Args::parse();

    // Load environment variables from .env file, if any
    dotenv().ok();

    // Initialize logging
    if let Err(e) = logging::init_logging(env!("CARGO_BIN_NAME").to_string()) {
        eprintln!("Failed to initialize logging: {}", e);
        return Err(e);
    }

    let mut cfg = Config::load()?;
    args.apply(&mut cfg);
    info!(horizon = cfg.horizon, order = %cfg.order, seasonal = %cfg.seasonal, "Configuration loaded and logging initialized");

    let table = load_table(&cfg)?;
    let table = if cfg.currencies.is_empty() {
        table
    } else {
        table.select(&cfg.currencies)?
    };

    let missing = table.missing_count();
    let table = data::preprocess(&table);
    if missing > 0 {
        info!(missing, remaining = table.missing_count(), "Forward-filled missing values");
    }

    let run = engine::run_strategy_engine(&table, &cfg.engine_config()).wrap_err("Strategy engine failed")?;
    if !run.relaxed.is_empty() {
        warn!(currencies = ?run.relaxed, "Some currencies were fitted without seasonal terms");
    }
    run.allocation.log_allocation();

    println!("{}", report::allocation_report(&run.allocation, &run.currencies));
    println!("{}", report::forecast_summary(&table, &run));

    if !args.no_export {
        export::export_workbook(&cfg.output_path, &table, &run)?;
    }
    if let Some(path) = &args.json {
        export::export_json(path, &run)?;
    }
    if let Some(path) = &args.chart {
        chart::render_forecast_chart(path, &table, &run)?;
    }

    info!("Forecast run completed");
    Ok(())
}

fn load_table(cfg: &Config) -> eyre::Result<CashflowTable> {
    match &cfg.input_path {
        Some(path) => loader::load_table(path),
        None => {
            let table = simulation::simulate_cashflows(&cfg.simulation).wrap_err("Failed to simulate cashflow data")?;
            info!(rows = table.len(), seed = cfg.simulation.seed, "Using simulated cashflow data");
            Ok(table)
        }
    }
}
