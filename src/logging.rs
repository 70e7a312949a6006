// Centralized logging setup for tracing with runtime log level, file logging, and structured output
use std::env;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use eyre::{Result, WrapErr};
use tracing::{Id, Subscriber, debug, field::Field, field::Visit, span};
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Context, Layer, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
};

static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

const CRATE_TARGET: &str = "liquidity_forecast";
const LOG_DIR: &str = "logs";

/// Install the global subscriber: pretty console output, optional JSON file output, span timing.
///
/// Levels come from `CONSOLE_LOG_LEVEL` / `FILE_LOG_LEVEL` (default INFO); `LOG_TO_FILE=true`
/// writes `logs/<bin_name>_<timestamp>.log`.
pub fn init_logging(bin_name: String) -> Result<()> {
    let console_log_level = env::var("CONSOLE_LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string());
    let file_log_level = env::var("FILE_LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string());
    let log_to_file = env::var("LOG_TO_FILE").map(|v| v.eq_ignore_ascii_case("true")).unwrap_or(false);

    // Everything else at warn, our own crate at the configured level
    let console_layer = fmt::Layer::new().pretty().with_filter(crate_filter(&console_log_level));
    let timing_layer = SpanTimingLayer;

    if log_to_file {
        let timestamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
        let log_dir = Path::new(LOG_DIR);
        fs::create_dir_all(log_dir).wrap_err("Failed to create log directory")?;
        let log_file_name = format!("{}_{}.log", bin_name, timestamp);

        let file_appender = tracing_appender::rolling::never(log_dir, log_file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        FILE_GUARD.set(guard).ok();

        // File layer: structured JSON logs with UTC timestamps
        let file_layer = fmt::Layer::new()
            .json()
            .with_writer(non_blocking)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_filter(crate_filter(&file_log_level));

        tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer)
            .with(timing_layer)
            .try_init()
            .wrap_err("Failed to install tracing subscriber")?;
    } else {
        tracing_subscriber::registry()
            .with(console_layer)
            .with(timing_layer)
            .try_init()
            .wrap_err("Failed to install tracing subscriber")?;
    }

    debug!(bin = %bin_name, log_to_file, "Logging initialized");
    Ok(())
}

fn crate_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(format!("warn,{}={}", CRATE_TARGET, level))
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,{}=info", CRATE_TARGET)))
}

// Tracks busy/idle time for spans declared with `on_close = true`
struct SpanTimingLayer;

struct StartInstant(Instant);
struct LastInstant(Instant);
struct BusyTime(Duration);
struct IdleTime(Duration);

struct OnCloseVisitor<'a> {
    on_close: &'a mut bool,
}

impl Visit for OnCloseVisitor<'_> {
    fn record_bool(&mut self, field: &Field, value: bool) {
        if field.name() == "on_close" {
            *self.on_close = value;
        }
    }

    fn record_debug(&mut self, _field: &Field, _value: &dyn std::fmt::Debug) {}
}

impl<S> Layer<S> for SpanTimingLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let mut on_close = false;
        attrs.record(&mut OnCloseVisitor { on_close: &mut on_close });
        if on_close {
            let now = Instant::now();
            let mut extensions = span.extensions_mut();
            extensions.insert(StartInstant(now));
            extensions.insert(LastInstant(now));
            extensions.insert(BusyTime(Duration::ZERO));
            extensions.insert(IdleTime(Duration::ZERO));
        }
    }

    fn on_enter(&self, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let mut exts = span.extensions_mut();
        if exts.get_mut::<StartInstant>().is_none() {
            return;
        }
        // Time since the last exit counts as idle
        let last = exts.remove::<LastInstant>().map(|li| li.0).unwrap_or_else(Instant::now);
        let idle = exts.remove::<IdleTime>().map(|it| it.0).unwrap_or(Duration::ZERO);
        exts.insert(IdleTime(idle + last.elapsed()));
        exts.insert(LastInstant(Instant::now()));
    }

    fn on_exit(&self, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let mut exts = span.extensions_mut();
        if exts.get_mut::<StartInstant>().is_none() {
            return;
        }
        let last = exts.remove::<LastInstant>().map(|li| li.0).unwrap_or_else(Instant::now);
        let busy = exts.remove::<BusyTime>().map(|bt| bt.0).unwrap_or(Duration::ZERO);
        exts.insert(BusyTime(busy + last.elapsed()));
        exts.insert(LastInstant(Instant::now()));
    }

    fn on_close(&self, id: Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(&id) else { return };
        let mut exts = span.extensions_mut();
        if let Some(StartInstant(start)) = exts.remove::<StartInstant>() {
            let busy_time = exts.remove::<BusyTime>().map(|bt| bt.0).unwrap_or(Duration::ZERO);
            let idle_time = exts.remove::<IdleTime>().map(|it| it.0).unwrap_or(Duration::ZERO);
            debug!(
                span = span.name(),
                busy_time = ?busy_time,
                idle_time = ?idle_time,
                total_time = ?start.elapsed(),
                "span closed"
            );
        }
    }
}
