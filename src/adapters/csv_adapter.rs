//! CSV directory table adapter.
//!
//! Each symbol is stored as `<symbol>.csv` with a `date` column first and
//! one column per series. Empty cells read as `NaN` and `NaN` is written as
//! an empty cell.

use crate::domain::error::IndiforgeError;
use crate::domain::table::TimeSeriesTable;
use crate::ports::table_port::TablePort;
use chrono::NaiveDate;
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol))
    }

    fn parse_cell(cell: &str, column: &str, line: usize) -> Result<f64, IndiforgeError> {
        let cell = cell.trim();
        if cell.is_empty() || cell.eq_ignore_ascii_case("nan") {
            return Ok(f64::NAN);
        }
        cell.parse().map_err(|e| IndiforgeError::Data {
            reason: format!("invalid {} value '{}' on line {}: {}", column, cell, line, e),
        })
    }
}

impl TablePort for CsvAdapter {
    fn list_symbols(&self) -> Result<Vec<String>, IndiforgeError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| IndiforgeError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() || path.extension().is_none_or(|ext| ext != "csv") {
                continue;
            }
            if let Some(stem) = path.file_stem() {
                symbols.push(stem.to_string_lossy().into_owned());
            }
        }

        symbols.sort();
        Ok(symbols)
    }

    fn read_table(&self, symbol: &str) -> Result<TimeSeriesTable, IndiforgeError> {
        let path = self.csv_path(symbol);
        let content = fs::read_to_string(&path).map_err(|e| IndiforgeError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr
            .headers()
            .map_err(|e| IndiforgeError::Data {
                reason: format!("CSV header error in {}: {}", path.display(), e),
            })?
            .clone();

        if headers.get(0).map(str::trim) != Some("date") {
            return Err(IndiforgeError::Data {
                reason: format!("{}: first column must be 'date'", path.display()),
            });
        }
        let names: Vec<String> = headers.iter().skip(1).map(|h| h.trim().to_string()).collect();
        let mut unique = HashSet::new();
        if let Some(dup) = names.iter().find(|n| !unique.insert(n.as_str())) {
            return Err(IndiforgeError::Data {
                reason: format!("{}: duplicate column '{}'", path.display(), dup),
            });
        }

        let mut rows: Vec<(NaiveDate, Vec<f64>)> = Vec::new();
        for (i, result) in rdr.records().enumerate() {
            let line = i + 2;
            let record = result.map_err(|e| IndiforgeError::Data {
                reason: format!("CSV parse error: {}", e),
            })?;

            let date_str = record.get(0).unwrap_or_default().trim();
            let date = NaiveDate::parse_from_str(date_str, DATE_FORMAT).map_err(|e| {
                IndiforgeError::Data {
                    reason: format!("invalid date '{}' on line {}: {}", date_str, line, e),
                }
            })?;

            let mut values = Vec::with_capacity(names.len());
            for (j, name) in names.iter().enumerate() {
                let cell = record.get(j + 1).ok_or_else(|| IndiforgeError::Data {
                    reason: format!("missing {} column on line {}", name, line),
                })?;
                values.push(Self::parse_cell(cell, name, line)?);
            }
            rows.push((date, values));
        }

        rows.sort_by_key(|(date, _)| *date);

        let mut table = TimeSeriesTable::new(rows.iter().map(|(d, _)| *d).collect());
        for (j, name) in names.iter().enumerate() {
            table.set_column(name.as_str(), rows.iter().map(|(_, v)| v[j]).collect())?;
        }
        Ok(table)
    }

    fn write_table(&self, symbol: &str, table: &TimeSeriesTable) -> Result<(), IndiforgeError> {
        fs::create_dir_all(&self.base_path)?;
        let path = self.csv_path(symbol);
        let csv_err = |e: csv::Error| IndiforgeError::Data {
            reason: format!("failed to write {}: {}", path.display(), e),
        };

        let mut wtr = csv::Writer::from_path(&path).map_err(csv_err)?;
        let mut header = vec!["date".to_string()];
        header.extend(table.column_names().into_iter().map(String::from));
        wtr.write_record(&header).map_err(csv_err)?;

        for (i, date) in table.dates().iter().enumerate() {
            let mut record = vec![date.format(DATE_FORMAT).to_string()];
            for column in table.columns() {
                let v = column.values[i];
                record.push(if v.is_nan() { String::new() } else { v.to_string() });
            }
            wtr.write_record(&record).map_err(csv_err)?;
        }
        wtr.flush()?;
        Ok(())
    }
}
