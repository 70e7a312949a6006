use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use calamine::{Data, Reader as _, open_workbook_auto};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::{Reader, Writer};
use eyre::{Result, WrapErr, eyre};
use ndarray::Array2;
use tracing::{info, instrument};

use super::table::CashflowTable;

const SPREADSHEET_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Load from CSV or a spreadsheet, chosen by file extension.
pub fn load_table(path: &Path) -> Result<CashflowTable> {
    let is_spreadsheet = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SPREADSHEET_EXTENSIONS.iter().any(|s| e.eq_ignore_ascii_case(s)));
    if is_spreadsheet { load_xlsx(path) } else { load_csv(path) }
}

/// Load a cashflow table from a CSV file: first column is the date, every other
/// column is a currency. Blank or `NaN` cells become missing values.
#[instrument(skip(path), fields(path = %path.display()))]
pub fn load_csv(path: &Path) -> Result<CashflowTable> {
    let file = File::open(path).wrap_err_with(|| format!("Failed to open {}", path.display()))?;
    let table = read_csv(file).wrap_err_with(|| format!("Failed to load {}", path.display()))?;
    info!(rows = table.len(), currencies = table.currencies().len(), "Loaded cashflow table");
    Ok(table)
}

pub fn read_csv<R: Read>(source: R) -> Result<CashflowTable> {
    let mut reader = Reader::from_reader(source);
    let headers = reader.headers().wrap_err("Failed to read CSV header")?.clone();
    if headers.len() < 2 {
        return Err(eyre!("CSV needs a date column and at least one currency column"));
    }
    let currencies: Vec<String> = headers.iter().skip(1).map(|h| h.trim().to_string()).collect();

    let mut dates = Vec::new();
    let mut flat = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.wrap_err_with(|| format!("Failed to read CSV row {}", row + 1))?;
        if record.len() != headers.len() {
            return Err(eyre!(
                "CSV row {} has {} fields, expected {}",
                row + 1,
                record.len(),
                headers.len()
            ));
        }
        dates.push(parse_date(&record[0]).wrap_err_with(|| format!("Bad date on row {}", row + 1))?);
        for field in record.iter().skip(1) {
            flat.push(parse_value(field).wrap_err_with(|| format!("Bad value on row {}", row + 1))?);
        }
    }

    assemble(dates, currencies, flat)
}

/// Load the first worksheet of a spreadsheet, laid out like the CSV: date column
/// first, then one column per currency. Blank and error cells become missing values.
#[instrument(skip(path), fields(path = %path.display()))]
pub fn load_xlsx(path: &Path) -> Result<CashflowTable> {
    let mut workbook =
        open_workbook_auto(path).map_err(|e| eyre!("Failed to open {}: {}", path.display(), e))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| eyre!("{} has no worksheets", path.display()))?
        .map_err(|e| eyre!("Failed to read first worksheet of {}: {}", path.display(), e))?;

    let mut rows = range.rows();
    let headers = rows.next().ok_or_else(|| eyre!("worksheet is empty"))?;
    if headers.len() < 2 {
        return Err(eyre!("worksheet needs a date column and at least one currency column"));
    }
    let currencies: Vec<String> = headers.iter().skip(1).map(|h| h.to_string().trim().to_string()).collect();

    let mut dates = Vec::new();
    let mut flat = Vec::new();
    for (row, cells) in rows.enumerate() {
        // Trailing blank rows are padding, not data
        if cells.iter().all(|c| matches!(c, Data::Empty)) {
            continue;
        }
        dates.push(cell_date(&cells[0]).wrap_err_with(|| format!("Bad date on row {}", row + 1))?);
        for cell in cells.iter().skip(1) {
            flat.push(cell_value(cell).wrap_err_with(|| format!("Bad value on row {}", row + 1))?);
        }
    }

    let table = assemble(dates, currencies, flat)?;
    info!(rows = table.len(), currencies = table.currencies().len(), "Loaded cashflow table");
    Ok(table)
}

fn assemble(dates: Vec<NaiveDate>, currencies: Vec<String>, flat: Vec<f64>) -> Result<CashflowTable> {
    let values = Array2::from_shape_vec((dates.len(), currencies.len()), flat)?;
    Ok(CashflowTable::new(dates, currencies, values)?)
}

fn cell_date(cell: &Data) -> Result<NaiveDate> {
    match cell {
        Data::String(s) | Data::DateTimeIso(s) => parse_date(s),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| d.date())
            .ok_or_else(|| eyre!("date cell {:?} out of range", dt)),
        other => Err(eyre!("unrecognized date cell '{}'", other)),
    }
}

fn cell_value(cell: &Data) -> Result<f64> {
    match cell {
        Data::Float(f) => Ok(*f),
        Data::Int(i) => Ok(*i as f64),
        Data::String(s) => parse_value(s),
        Data::Empty | Data::Error(_) => Ok(f64::NAN),
        other => Err(eyre!("'{}' is not a number", other)),
    }
}

/// Write a table in the same layout `read_csv` accepts.
pub fn save_csv(path: &Path, table: &CashflowTable) -> Result<()> {
    let file = File::create(path).wrap_err_with(|| format!("Failed to create {}", path.display()))?;
    write_csv(file, table)
}

pub fn write_csv<W: Write>(sink: W, table: &CashflowTable) -> Result<()> {
    let mut writer = Writer::from_writer(sink);

    let mut header = vec!["Date".to_string()];
    header.extend(table.currencies().iter().cloned());
    writer.write_record(&header)?;

    for (date, row) in table.dates().iter().zip(table.values().rows()) {
        let mut record = vec![date.format("%Y-%m-%d").to_string()];
        record.extend(row.iter().map(|v| if v.is_nan() { String::new() } else { v.to_string() }));
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt.date());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.date_naive());
    }
    Err(eyre!("unrecognized date '{}'", raw))
}

fn parse_value(raw: &str) -> Result<f64> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
        return Ok(f64::NAN);
    }
    raw.parse::<f64>()
        .map_err(|e| eyre!("'{}' is not a number: {}", raw, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::simulation::{SimulationConfig, simulate_cashflows};
    use approx::assert_relative_eq;

    #[test]
    fn test_read_csv_with_gaps() {
        let csv = "Date,EUR,USD\n2024-01-01,1.5,\n2024-01-02,,2.0\n2024-01-03 00:00:00,3.0,NaN\n";
        let table = read_csv(csv.as_bytes()).unwrap();
        assert_eq!(table.currencies(), &["EUR".to_string(), "USD".to_string()]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.missing_count(), 3);
        assert_eq!(table.last_date(), NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
    }

    #[test]
    fn test_read_csv_rejects_bad_values() {
        assert!(read_csv("Date,EUR\n2024-01-01,abc\n".as_bytes()).is_err());
        assert!(read_csv("Date,EUR\nyesterday,1.0\n".as_bytes()).is_err());
        assert!(read_csv("Date\n2024-01-01\n".as_bytes()).is_err());
    }

    #[test]
    fn test_load_xlsx_with_gaps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cashflows.xlsx");
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "Date").unwrap();
        sheet.write_string(0, 1, "EUR").unwrap();
        sheet.write_string(0, 2, "USD").unwrap();
        sheet.write_string(1, 0, "2024-01-01").unwrap();
        sheet.write_number(1, 1, 1.5).unwrap();
        sheet.write_number(1, 2, -2.0).unwrap();
        sheet.write_string(2, 0, "2024-01-02 00:00:00").unwrap();
        sheet.write_number(2, 2, 4.0).unwrap();
        sheet.write_string(3, 0, "2024-01-03").unwrap();
        sheet.write_number(3, 1, 3.0).unwrap();
        sheet.write_string(3, 2, "NaN").unwrap();
        workbook.save(&path).unwrap();

        let table = load_table(&path).unwrap();
        assert_eq!(table.currencies(), &["EUR".to_string(), "USD".to_string()]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.missing_count(), 2);
        assert!(table.series("EUR").unwrap()[1].is_nan());
        assert_eq!(table.series("USD").unwrap()[1], 4.0);
    }

    #[test]
    fn test_load_xlsx_rejects_bad_date() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.xlsx");
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "Date").unwrap();
        sheet.write_string(0, 1, "EUR").unwrap();
        sheet.write_string(1, 0, "yesterday").unwrap();
        sheet.write_number(1, 1, 1.0).unwrap();
        workbook.save(&path).unwrap();

        assert!(load_xlsx(&path).is_err());
    }

    #[test]
    fn test_save_then_load_file() {
        let config = SimulationConfig {
            end: NaiveDate::from_ymd_opt(2022, 2, 1).unwrap(),
            currencies: vec!["EUR".into(), "JPY".into()],
            ..SimulationConfig::default()
        };
        let table = simulate_cashflows(&config).unwrap();
        let file = tempfile::NamedTempFile::new().unwrap();
        save_csv(file.path(), &table).unwrap();

        let loaded = load_csv(file.path()).unwrap();
        assert_eq!(loaded.dates(), table.dates());
        assert_eq!(loaded.currencies(), table.currencies());
        for (a, b) in loaded.values().iter().zip(table.values().iter()) {
            assert_relative_eq!(a, b, max_relative = 1e-12);
        }
    }
}
