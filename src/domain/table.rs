//! Time-series table: date-indexed rows with named `f64` columns.
//!
//! Column order is insertion order. Indicator evaluation only ever appends or
//! replaces columns; rows are never reordered or dropped.

use crate::domain::error::IndiforgeError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;

/// Columns every input table must carry before indicator evaluation.
pub const REQUIRED_COLUMNS: [&str; 5] = ["open", "high", "low", "close", "volume"];

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimeSeriesTable {
    dates: Vec<NaiveDate>,
    columns: Vec<Column>,
}

impl TimeSeriesTable {
    pub fn new(dates: Vec<NaiveDate>) -> Self {
        Self {
            dates,
            columns: Vec::new(),
        }
    }

    /// Build an OHLCV table from provider bars, keeping bar order.
    pub fn from_bars(bars: &[OhlcvBar]) -> Self {
        let mut table = Self::new(bars.iter().map(|b| b.date).collect());
        table.columns = vec![
            Column {
                name: "open".into(),
                values: bars.iter().map(|b| b.open).collect(),
            },
            Column {
                name: "high".into(),
                values: bars.iter().map(|b| b.high).collect(),
            },
            Column {
                name: "low".into(),
                values: bars.iter().map(|b| b.low).collect(),
            },
            Column {
                name: "close".into(),
                values: bars.iter().map(|b| b.close).collect(),
            },
            Column {
                name: "volume".into(),
                values: bars.iter().map(|b| b.volume).collect(),
            },
        ];
        table
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Append a column, or replace the values of an existing one in place.
    ///
    /// Returns `true` when an existing column was replaced.
    pub fn set_column(
        &mut self,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<bool, IndiforgeError> {
        let name = name.into();
        if values.len() != self.dates.len() {
            return Err(IndiforgeError::ColumnLength {
                name,
                expected: self.dates.len(),
                found: values.len(),
            });
        }
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(existing) => {
                existing.values = values;
                Ok(true)
            }
            None => {
                self.columns.push(Column { name, values });
                Ok(false)
            }
        }
    }

    /// First required OHLCV column that is absent, if any.
    pub fn missing_required_column(&self) -> Option<&'static str> {
        REQUIRED_COLUMNS
            .iter()
            .copied()
            .find(|name| !self.has_column(name))
    }

    /// Check the OHLCV precondition shared by engine and manager.
    pub fn require_ohlcv(&self) -> Result<(), IndiforgeError> {
        match self.missing_required_column() {
            Some(name) => Err(IndiforgeError::MissingColumn(name.to_string())),
            None => Ok(()),
        }
    }

    /// Row values across every column, in column order.
    pub fn row(&self, index: usize) -> Option<Vec<f64>> {
        if index >= self.len() {
            return None;
        }
        Some(self.columns.iter().map(|c| c.values[index]).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bars() -> Vec<OhlcvBar> {
        (0..3)
            .map(|i| OhlcvBar {
                date: NaiveDate::from_ymd_opt(2024, 1, i + 1).unwrap(),
                open: 10.0 + i as f64,
                high: 11.0 + i as f64,
                low: 9.0 + i as f64,
                close: 10.5 + i as f64,
                volume: 1000.0,
            })
            .collect()
    }

    #[test]
    fn from_bars_has_required_columns_in_order() {
        let table = TimeSeriesTable::from_bars(&bars());
        assert_eq!(table.len(), 3);
        assert_eq!(
            table.column_names(),
            vec!["open", "high", "low", "close", "volume"]
        );
        assert_eq!(table.column("close").unwrap(), &[10.5, 11.5, 12.5]);
        assert!(table.require_ohlcv().is_ok());
    }

    #[test]
    fn set_column_appends_then_replaces() {
        let mut table = TimeSeriesTable::from_bars(&bars());
        assert!(!table.set_column("MA3", vec![1.0, 2.0, 3.0]).unwrap());
        assert!(table.set_column("MA3", vec![4.0, 5.0, 6.0]).unwrap());
        assert_eq!(table.columns().len(), 6);
        assert_eq!(table.column("MA3").unwrap(), &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn set_column_rejects_wrong_length() {
        let mut table = TimeSeriesTable::from_bars(&bars());
        let err = table.set_column("X", vec![1.0]).unwrap_err();
        assert!(matches!(
            err,
            IndiforgeError::ColumnLength {
                expected: 3,
                found: 1,
                ..
            }
        ));
    }

    #[test]
    fn missing_column_is_reported() {
        let mut table = TimeSeriesTable::new(vec![NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()]);
        table.set_column("open", vec![1.0]).unwrap();
        table.set_column("high", vec![1.0]).unwrap();
        assert_eq!(table.missing_required_column(), Some("low"));
        assert!(matches!(
            table.require_ohlcv(),
            Err(IndiforgeError::MissingColumn(name)) if name == "low"
        ));
    }

    #[test]
    fn row_reads_across_columns() {
        let table = TimeSeriesTable::from_bars(&bars());
        assert_eq!(table.row(1), Some(vec![11.0, 12.0, 10.0, 11.5, 1000.0]));
        assert_eq!(table.row(3), None);
    }
}
