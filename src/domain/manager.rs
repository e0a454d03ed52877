//! Indicator manager: a definitions directory plus the engine it feeds.

use crate::domain::engine::IndicatorEngine;
use crate::domain::error::IndiforgeError;
use crate::domain::table::TimeSeriesTable;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug)]
pub struct IndicatorManager {
    indicators_dir: PathBuf,
    engine: IndicatorEngine,
}

impl IndicatorManager {
    /// Create a manager over `indicators_dir`, creating the directory if it
    /// does not exist yet.
    pub fn new(
        indicators_dir: impl Into<PathBuf>,
        engine: IndicatorEngine,
    ) -> Result<Self, IndiforgeError> {
        let indicators_dir = indicators_dir.into();
        fs::create_dir_all(&indicators_dir)?;
        Ok(Self {
            indicators_dir,
            engine,
        })
    }

    pub fn indicators_dir(&self) -> &Path {
        &self.indicators_dir
    }

    pub fn engine(&self) -> &IndicatorEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut IndicatorEngine {
        &mut self.engine
    }

    /// `*.json` files directly inside the definitions directory, by file name.
    pub fn definition_files(&self) -> Result<Vec<PathBuf>, IndiforgeError> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.indicators_dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(files)
    }

    /// Load every document in the definitions directory.
    ///
    /// Documents that fail to load are logged by the engine and skipped.
    /// Calling this again reloads: sets with the same name are replaced.
    /// Returns how many documents loaded.
    pub fn load_all_sets(&mut self) -> Result<usize, IndiforgeError> {
        let files = self.definition_files()?;
        let mut loaded = 0;
        for path in &files {
            if self.engine.load_set_from_file(path) {
                loaded += 1;
            }
        }
        info!(
            "IndicatorManager: loaded {}/{} indicator set(s) from {}",
            loaded,
            files.len(),
            self.indicators_dir.display()
        );
        Ok(loaded)
    }

    pub fn list_sets(&self) -> Vec<String> {
        self.engine.set_names()
    }

    /// Apply every loaded set in registration order, each one seeing the
    /// columns added by the sets before it.
    ///
    /// A table with no rows is returned unchanged without evaluation.
    pub fn calculate(&self, table: &TimeSeriesTable) -> Result<TimeSeriesTable, IndiforgeError> {
        if table.is_empty() {
            return Ok(table.clone());
        }
        table.require_ohlcv()?;
        let mut current = table.clone();
        for name in self.engine.set_names() {
            current = self.engine.calculate_set(&current, &name)?;
        }
        Ok(current)
    }

    /// [`calculate`](Self::calculate) for a table that may be absent.
    pub fn calculate_optional(
        &self,
        table: Option<&TimeSeriesTable>,
    ) -> Result<Option<TimeSeriesTable>, IndiforgeError> {
        table.map(|t| self.calculate(t)).transpose()
    }
}
