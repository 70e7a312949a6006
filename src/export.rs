use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use eyre::{Result, WrapErr};
use rust_xlsxwriter::{Format, Workbook, Worksheet};
use tracing::{info, instrument};

use crate::data::CashflowTable;
use crate::strategy::types::ForecastRun;

pub const HISTORICAL_SHEET: &str = "Historical";
pub const FORECASTS_SHEET: &str = "Forecasts";
pub const ALLOCATION_SHEET: &str = "Allocation";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Write history, forecasts and allocation percentages to an `.xlsx` workbook.
///
/// Missing historical values are left as blank cells.
#[instrument(skip(history, run), fields(path = %path.display()))]
pub fn export_workbook(path: &Path, history: &CashflowTable, run: &ForecastRun) -> Result<()> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    let sheet = workbook.add_worksheet().set_name(HISTORICAL_SHEET)?;
    write_historical(sheet, history, &header)?;

    let sheet = workbook.add_worksheet().set_name(FORECASTS_SHEET)?;
    write_forecasts(sheet, run, &header)?;

    let sheet = workbook.add_worksheet().set_name(ALLOCATION_SHEET)?;
    write_allocation(sheet, run, &header)?;

    workbook
        .save(path)
        .wrap_err_with(|| format!("Failed to save workbook {}", path.display()))?;
    info!("Results exported to {}", path.display());
    Ok(())
}

fn write_historical(sheet: &mut Worksheet, history: &CashflowTable, header: &Format) -> Result<()> {
    sheet.write_string_with_format(0, 0, "Date", header)?;
    for (j, ccy) in history.currencies().iter().enumerate() {
        sheet.write_string_with_format(0, col_index(j + 1)?, ccy, header)?;
    }
    for (i, date) in history.dates().iter().enumerate() {
        let row = row_index(i + 1)?;
        sheet.write_string(row, 0, date.format(DATE_FORMAT).to_string())?;
        for (j, value) in history.values().row(i).iter().enumerate() {
            if value.is_finite() {
                sheet.write_number(row, col_index(j + 1)?, *value)?;
            }
        }
    }
    sheet.set_column_width(0, 12.0)?;
    Ok(())
}

fn write_forecasts(sheet: &mut Worksheet, run: &ForecastRun, header: &Format) -> Result<()> {
    sheet.write_string_with_format(0, 0, "Forecast_Date", header)?;
    // Columns follow the input column order, not map order
    let columns: Vec<_> = run
        .currencies
        .iter()
        .filter_map(|ccy| run.forecasts.get(ccy))
        .collect();
    let Some(first) = columns.first() else {
        return Ok(());
    };

    for (j, forecast) in columns.iter().enumerate() {
        sheet.write_string_with_format(0, col_index(j + 1)?, forecast.currency(), header)?;
    }
    for (i, date) in first.dates().iter().enumerate() {
        let row = row_index(i + 1)?;
        sheet.write_string(row, 0, date.format(DATE_FORMAT).to_string())?;
        for (j, forecast) in columns.iter().enumerate() {
            if let Some(value) = forecast.values().get(i) {
                sheet.write_number(row, col_index(j + 1)?, *value)?;
            }
        }
    }
    sheet.set_column_width(0, 14.0)?;
    Ok(())
}

fn write_allocation(sheet: &mut Worksheet, run: &ForecastRun, header: &Format) -> Result<()> {
    sheet.write_string_with_format(0, 0, "Currency", header)?;
    sheet.write_string_with_format(0, 1, "Allocation", header)?;
    for (i, (ccy, pct)) in run.allocation.percentages().iter().enumerate() {
        let row = row_index(i + 1)?;
        sheet.write_string(row, 0, ccy)?;
        sheet.write_number(row, 1, *pct)?;
    }
    Ok(())
}

/// Dump the full run (forecasts, weights, relaxed currencies) as pretty JSON.
pub fn export_json(path: &Path, run: &ForecastRun) -> Result<()> {
    let file = File::create(path).wrap_err_with(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), run).wrap_err("Failed to serialize forecast run")?;
    info!("Run written to {}", path.display());
    Ok(())
}

fn row_index(i: usize) -> Result<u32> {
    u32::try_from(i).wrap_err("row index out of range")
}

fn col_index(j: usize) -> Result<u16> {
    u16::try_from(j).wrap_err("column index out of range")
}
