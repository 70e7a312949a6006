use std::path::Path;

use chrono::NaiveDate;
use eyre::{Result, eyre};
use plotters::prelude::*;
use tracing::{info, instrument};

use crate::data::CashflowTable;
use crate::strategy::types::ForecastRun;

const CHART_SIZE: (u32, u32) = (1280, 720);

/// Render history (thin) and forecast (thick) lines per currency to an SVG file.
#[instrument(skip(history, run), fields(path = %path.display()))]
pub fn render_forecast_chart(path: &Path, history: &CashflowTable, run: &ForecastRun) -> Result<()> {
    let n_hist = history.len();
    let horizon = run.forecasts.values().map(|f| f.len()).max().unwrap_or(0);
    let dates: Vec<NaiveDate> = history
        .dates()
        .iter()
        .copied()
        .chain(history.last_date().iter_days().skip(1).take(horizon))
        .collect();

    let mut lines: Vec<(String, Vec<(f64, f64)>, Vec<(f64, f64)>)> = Vec::new();
    for ccy in &run.currencies {
        let past: Vec<(f64, f64)> = history
            .series(ccy)?
            .into_iter()
            .enumerate()
            .filter(|(_, v)| v.is_finite())
            .map(|(i, v)| (i as f64, v))
            .collect();
        let future: Vec<(f64, f64)> = run
            .forecasts
            .get(ccy)
            .map(|f| {
                f.values()
                    .iter()
                    .enumerate()
                    .map(|(i, v)| ((n_hist + i) as f64, *v))
                    .collect()
            })
            .unwrap_or_default();
        lines.push((ccy.clone(), past, future));
    }

    let (y_min, y_max) = lines
        .iter()
        .flat_map(|(_, p, f)| p.iter().chain(f.iter()).map(|(_, y)| *y))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), y| (lo.min(y), hi.max(y)));
    if !y_min.is_finite() || !y_max.is_finite() {
        return Err(eyre!("nothing to plot"));
    }
    let pad = ((y_max - y_min) * 0.05).max(1.0);
    let x_max = (dates.len().max(2) - 1) as f64;

    let root = SVGBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Cashflow history and forecast", ("sans-serif", 24))
        .margin(12)
        .x_label_area_size(40)
        .y_label_area_size(80)
        .build_cartesian_2d(0f64..x_max, (y_min - pad)..(y_max + pad))?;

    let label_date = |x: &f64| {
        dates
            .get(x.round().max(0.0) as usize)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default()
    };
    chart
        .configure_mesh()
        .x_labels(8)
        .x_label_formatter(&label_date)
        .y_desc("Cumulative cashflow")
        .draw()?;

    for (i, (ccy, past, future)) in lines.into_iter().enumerate() {
        let color = Palette99::pick(i).to_rgba();
        chart
            .draw_series(LineSeries::new(past, color.stroke_width(1)))?
            .label(ccy)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
        chart.draw_series(LineSeries::new(future, color.stroke_width(3)))?;
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    root.present()?;

    info!("Chart written to {}", path.display());
    Ok(())
}
