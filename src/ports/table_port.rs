//! Time-series table storage port.

use crate::domain::error::IndiforgeError;
use crate::domain::table::TimeSeriesTable;

/// One table per symbol.
pub trait TablePort {
    /// Symbols with a stored table, sorted.
    fn list_symbols(&self) -> Result<Vec<String>, IndiforgeError>;

    fn read_table(&self, symbol: &str) -> Result<TimeSeriesTable, IndiforgeError>;

    /// Store `table` for `symbol`, replacing any previous table.
    fn write_table(&self, symbol: &str, table: &TimeSeriesTable) -> Result<(), IndiforgeError>;
}
