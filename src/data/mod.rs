pub mod loader;
pub mod simulation;
pub mod table;

pub use table::CashflowTable;

/// Forward-fill pass applied before forecasting.
pub fn preprocess(table: &CashflowTable) -> CashflowTable {
    table.forward_fill()
}
