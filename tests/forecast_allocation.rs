use std::collections::BTreeMap;

use approx::assert_abs_diff_eq;
use chrono::NaiveDate;
use ndarray::array;

use liquidity_forecast::data::simulation::{SimulationConfig, simulate_cashflows};
use liquidity_forecast::data::{self, CashflowTable, loader};
use liquidity_forecast::export;
use liquidity_forecast::model::{ArimaOrder, SeasonalOrder};
use liquidity_forecast::strategy::allocator::allocate;
use liquidity_forecast::strategy::engine::{EngineConfig, run_strategy_engine};
use liquidity_forecast::strategy::forecaster::forecast_currency;
use liquidity_forecast::strategy::types::{Forecast, ForecastRun};
use liquidity_forecast::ForecastError;

fn three_years(currencies: &[&str]) -> CashflowTable {
    let config = SimulationConfig {
        currencies: currencies.iter().map(|c| c.to_string()).collect(),
        ..SimulationConfig::default()
    };
    simulate_cashflows(&config).unwrap()
}

#[test]
fn three_years_of_eur_usd_forecast_and_allocate() {
    let table = three_years(&["EUR", "USD"]);
    assert_eq!(table.len(), 1097);

    let eur = forecast_currency(&table, "EUR", 30, ArimaOrder::default(), SeasonalOrder::default()).unwrap();
    assert_eq!(eur.len(), 30);
    assert!(eur.values().iter().all(|v| v.is_finite()));
    assert_eq!(eur.dates()[0], NaiveDate::from_ymd_opt(2025, 1, 2).unwrap());

    let usd = forecast_currency(&table, "USD", 30, ArimaOrder::default(), SeasonalOrder::default()).unwrap();
    let forecasts = BTreeMap::from([("EUR".to_string(), eur), ("USD".to_string(), usd)]);
    let allocation = allocate(&forecasts).unwrap();
    assert_eq!(allocation.len(), 2);
    assert_abs_diff_eq!(allocation.total_weight(), 1.0, epsilon = 1e-6);
    assert!(allocation.iter().all(|(_, w)| *w > 0.0));
}

#[test]
fn zero_forecasts_split_evenly() {
    let forecasts = BTreeMap::from([
        ("EUR".to_string(), vec![0.0, 0.0, 0.0]),
        ("USD".to_string(), vec![0.0, 0.0, 0.0]),
    ]);
    let allocation = allocate(&forecasts).unwrap();
    assert_eq!(allocation.weight("EUR"), Some(0.5));
    assert_eq!(allocation.weight("USD"), Some(0.5));
    assert!(allocation.is_degenerate());
}

#[test]
fn invalid_inputs_are_rejected() {
    let table = three_years(&["EUR"]);
    let err = forecast_currency(&table, "EUR", 0, ArimaOrder::default(), SeasonalOrder::default()).unwrap_err();
    assert!(matches!(err, ForecastError::InvalidInput(_)));

    let empty: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    assert!(matches!(allocate(&empty), Err(ForecastError::InvalidInput(_))));
}

#[test]
fn forward_fill_keeps_leading_gaps() {
    let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    let table = CashflowTable::new(
        start.iter_days().take(4).collect(),
        vec!["EUR".into(), "USD".into()],
        array![[f64::NAN, 1.0], [2.0, f64::NAN], [f64::NAN, f64::NAN], [5.0, 4.0]],
    )
    .unwrap();
    let filled = data::preprocess(&table);
    let eur = filled.series("EUR").unwrap();
    assert!(eur[0].is_nan());
    assert_eq!(&eur[1..], &[2.0, 2.0, 5.0]);
    assert_eq!(filled.series("USD").unwrap(), vec![1.0, 1.0, 1.0, 4.0]);
}

#[test]
fn csv_to_workbook_pipeline() {
    let config = SimulationConfig {
        end: NaiveDate::from_ymd_opt(2022, 4, 30).unwrap(),
        currencies: vec!["BRL".into(), "INR".into()],
        seed: 11,
        ..SimulationConfig::default()
    };
    let table = simulate_cashflows(&config).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("cashflows.csv");
    loader::save_csv(&csv_path, &table).unwrap();
    let loaded = data::preprocess(&loader::load_csv(&csv_path).unwrap());
    assert_eq!(loaded.currencies(), table.currencies());
    assert_eq!(loaded.len(), 120);

    let run = run_strategy_engine(
        &loaded,
        &EngineConfig {
            horizon: 7,
            ..EngineConfig::default()
        },
    )
    .unwrap();
    assert_abs_diff_eq!(run.allocation.total_weight(), 1.0, epsilon = 1e-6);

    let xlsx = dir.path().join("output.xlsx");
    export::export_workbook(&xlsx, &loaded, &run).unwrap();
    assert!(xlsx.exists());

    // The Historical sheet comes first and reads back as the input table
    let reloaded = loader::load_table(&xlsx).unwrap();
    assert_eq!(reloaded.dates(), loaded.dates());
    assert_eq!(reloaded.currencies(), loaded.currencies());
    for (a, b) in reloaded.values().iter().zip(loaded.values().iter()) {
        assert_abs_diff_eq!(a, b, epsilon = 1e-9);
    }
}

#[test]
fn exported_workbook_keeps_missing_cells_blank() {
    let start = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
    let history = CashflowTable::new(
        start.iter_days().take(3).collect(),
        vec!["JPY".into(), "AUD".into()],
        array![[10.0, f64::NAN], [12.5, 3.0], [f64::NAN, 4.0]],
    )
    .unwrap();
    let next = NaiveDate::from_ymd_opt(2024, 5, 4).unwrap();
    let forecasts = BTreeMap::from([
        ("JPY".to_string(), Forecast::new("JPY", next, vec![1.0]).unwrap()),
        ("AUD".to_string(), Forecast::new("AUD", next, vec![3.0]).unwrap()),
    ]);
    let allocation = allocate(&forecasts).unwrap();
    let run = ForecastRun {
        currencies: history.currencies().to_vec(),
        forecasts,
        allocation,
        relaxed: Vec::new(),
    };

    let dir = tempfile::tempdir().unwrap();
    let xlsx = dir.path().join("history.xlsx");
    export::export_workbook(&xlsx, &history, &run).unwrap();

    let reloaded = loader::load_xlsx(&xlsx).unwrap();
    assert_eq!(reloaded.missing_count(), 2);
    assert!(reloaded.series("AUD").unwrap()[0].is_nan());
    assert_eq!(reloaded.series("JPY").unwrap()[1], 12.5);
}
