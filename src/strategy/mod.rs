pub mod allocator;
pub mod engine;
pub mod forecaster;
pub mod strategy_constants;
pub mod types;
