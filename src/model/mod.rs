mod likelihood;
pub mod polynomial;
pub mod sarima;

pub use sarima::{ArimaOrder, FittedSarima, Sarima, SeasonalOrder, SolverSettings};
