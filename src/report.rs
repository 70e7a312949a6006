use std::fmt::Write;

use crate::data::CashflowTable;
use crate::strategy::types::{Allocation, ForecastRun};

/// "Optimized Allocation:" block, one `CCY: xx.xx%` line per currency in `order`.
pub fn allocation_report(allocation: &Allocation, order: &[String]) -> String {
    let mut out = String::from("Optimized Allocation:\n");
    for ccy in order {
        if let Some(weight) = allocation.weight(ccy) {
            let _ = writeln!(out, "{}: {:.2}%", ccy, weight * 100.0);
        }
    }
    if allocation.is_degenerate() {
        out.push_str("(all forecasts were zero; equal weights used)\n");
    }
    out
}

/// Per-currency table of last observation, first/last forecast and magnitude.
pub fn forecast_summary(history: &CashflowTable, run: &ForecastRun) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<6} {:>14} {:>14} {:>14} {:>16}",
        "CCY", "Last Obs", "First Fcst", "Last Fcst", "Magnitude"
    );
    for ccy in &run.currencies {
        let Some(forecast) = run.forecasts.get(ccy) else { continue };
        let last_obs = history
            .series(ccy)
            .ok()
            .and_then(|s| s.last().copied())
            .unwrap_or(f64::NAN);
        let first = forecast.values().first().copied().unwrap_or(f64::NAN);
        let last = forecast.values().last().copied().unwrap_or(f64::NAN);
        let marker = if run.relaxed.contains(ccy) { " *" } else { "" };
        let _ = writeln!(
            out,
            "{:<6} {:>14.2} {:>14.2} {:>14.2} {:>16.2}{}",
            ccy,
            last_obs,
            first,
            last,
            forecast.magnitude(),
            marker
        );
    }
    if !run.relaxed.is_empty() {
        out.push_str("* fitted without seasonal terms\n");
    }
    out
}
