#![allow(dead_code)]

use chrono::NaiveDate;
use indiforge::domain::builtins::BuiltinTable;
use indiforge::domain::definition::{IndicatorDefinition, IndicatorSet};
use indiforge::domain::engine::IndicatorEngine;
use indiforge::domain::error::IndiforgeError;
pub use indiforge::domain::ohlcv::OhlcvBar;
use indiforge::domain::table::TimeSeriesTable;
use indiforge::ports::table_port::TablePort;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// In-memory table store. Reads come from `tables`, writes land in `written`.
pub struct MockTablePort {
    pub tables: HashMap<String, TimeSeriesTable>,
    pub errors: HashMap<String, String>,
    pub written: RefCell<HashMap<String, TimeSeriesTable>>,
}

impl MockTablePort {
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
            errors: HashMap::new(),
            written: RefCell::new(HashMap::new()),
        }
    }

    pub fn with_table(mut self, symbol: &str, table: TimeSeriesTable) -> Self {
        self.tables.insert(symbol.to_string(), table);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }

    pub fn written(&self, symbol: &str) -> Option<TimeSeriesTable> {
        self.written.borrow().get(symbol).cloned()
    }
}

impl TablePort for MockTablePort {
    fn list_symbols(&self) -> Result<Vec<String>, IndiforgeError> {
        let mut symbols: Vec<String> = self
            .tables
            .keys()
            .chain(self.errors.keys())
            .cloned()
            .collect();
        symbols.sort();
        symbols.dedup();
        Ok(symbols)
    }

    fn read_table(&self, symbol: &str) -> Result<TimeSeriesTable, IndiforgeError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(IndiforgeError::Data {
                reason: reason.clone(),
            });
        }
        self.tables
            .get(symbol)
            .cloned()
            .ok_or_else(|| IndiforgeError::Data {
                reason: format!("no table for {}", symbol),
            })
    }

    fn write_table(&self, symbol: &str, table: &TimeSeriesTable) -> Result<(), IndiforgeError> {
        self.written
            .borrow_mut()
            .insert(symbol.to_string(), table.clone());
        Ok(())
    }
}

pub fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(day as i64)
}

pub fn make_bar(day: u32, close: f64) -> OhlcvBar {
    OhlcvBar {
        date: date(day),
        open: close - 0.5,
        high: close + 1.0,
        low: close - 1.0,
        close,
        volume: 1000.0 + day as f64 * 10.0,
    }
}

/// Bars with the given closes on consecutive days.
pub fn make_bars(closes: &[f64]) -> Vec<OhlcvBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar(i as u32, c))
        .collect()
}

/// A gently trending OHLCV table with `rows` rows.
pub fn make_table(rows: usize) -> TimeSeriesTable {
    let closes: Vec<f64> = (0..rows)
        .map(|i| 100.0 + i as f64 * 0.5 + ((i % 7) as f64 - 3.0))
        .collect();
    TimeSeriesTable::from_bars(&make_bars(&closes))
}

pub fn make_set(set_name: &str, indicators: &[(&str, &str)]) -> IndicatorSet {
    IndicatorSet {
        set_name: set_name.to_string(),
        indicators: indicators
            .iter()
            .map(|(name, formula)| IndicatorDefinition::new(*name, "", *formula))
            .collect(),
    }
}

/// Write `set` as `<file>` inside `dir` and return its path.
pub fn write_set(dir: &Path, file: &str, set: &IndicatorSet) -> PathBuf {
    let path = dir.join(file);
    fs::write(&path, set.to_json_pretty().unwrap()).unwrap();
    path
}

pub fn engine() -> IndicatorEngine {
    IndicatorEngine::new(Arc::new(BuiltinTable::standard()))
}

pub fn engine_with_set(set_name: &str, indicators: &[(&str, &str)]) -> IndicatorEngine {
    let mut engine = engine();
    engine.register_set(make_set(set_name, indicators)).unwrap();
    engine
}

/// Write an OHLCV CSV for `symbol` into `dir`.
pub fn write_csv(dir: &Path, symbol: &str, bars: &[OhlcvBar]) {
    let mut text = String::from("date,open,high,low,close,volume\n");
    for b in bars {
        text.push_str(&format!(
            "{},{},{},{},{},{}\n",
            b.date.format("%Y-%m-%d"),
            b.open,
            b.high,
            b.low,
            b.close,
            b.volume
        ));
    }
    fs::write(dir.join(format!("{}.csv", symbol)), text).unwrap();
}
