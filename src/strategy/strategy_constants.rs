// --- FORECAST DEFAULTS ---
/// Forecast horizon in days
pub const DEFAULT_HORIZON_DAYS: usize = 30;

// --- SOLVER LIMITS ---
pub const DEFAULT_FIT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_FIT_MAX_ITERS: u64 = 5000;

// --- OUTPUT ---
pub const DEFAULT_OUTPUT_PATH: &str = "output.xlsx";
