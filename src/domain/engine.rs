//! Indicator engine: holds loaded indicator sets and applies them to tables.
//!
//! The engine is constructed with an immutable builtin table and an
//! [`EvalBudget`]. Loading takes `&mut self` and calculation takes `&self`, so
//! one instance can never load and evaluate at the same time. Engines on
//! different threads share the builtin table through its `Arc`.

use crate::domain::builtins::BuiltinTable;
use crate::domain::context::EvaluationContext;
use crate::domain::definition::IndicatorSet;
use crate::domain::error::{FormulaError, IndiforgeError, ParseError};
use crate::domain::eval::{EvalBudget, evaluate_column};
use crate::domain::formula::Expr;
use crate::domain::formula_parser::parse_with_limits;
use crate::domain::table::TimeSeriesTable;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// An indicator whose formula has been parsed once, at registration.
#[derive(Debug, Clone)]
struct CompiledIndicator {
    name: String,
    formula: String,
    expr: Result<Expr, ParseError>,
}

#[derive(Debug, Clone)]
struct LoadedSet {
    set: IndicatorSet,
    compiled: Vec<CompiledIndicator>,
}

#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    builtins: Arc<BuiltinTable>,
    budget: EvalBudget,
    sets: Vec<LoadedSet>,
}

impl IndicatorEngine {
    pub fn new(builtins: Arc<BuiltinTable>) -> Self {
        Self::with_budget(builtins, EvalBudget::default())
    }

    pub fn with_budget(builtins: Arc<BuiltinTable>, budget: EvalBudget) -> Self {
        Self {
            builtins,
            budget,
            sets: Vec::new(),
        }
    }

    pub fn builtins(&self) -> &Arc<BuiltinTable> {
        &self.builtins
    }

    pub fn budget(&self) -> &EvalBudget {
        &self.budget
    }

    /// Parse a formula under this engine's length and depth limits.
    pub fn parse_formula(&self, formula: &str) -> Result<Expr, ParseError> {
        parse_with_limits(formula, &self.budget.parse_limits())
    }

    /// Load a set document, logging and swallowing any failure.
    ///
    /// Returns whether the set was loaded. On failure the engine is unchanged.
    pub fn load_set_from_file(&mut self, path: &Path) -> bool {
        match self.try_load_set_from_file(path) {
            Ok(_) => true,
            Err(e) => {
                error!("IndicatorEngine: failed to load {}: {}", path.display(), e);
                false
            }
        }
    }

    /// Load a set document. Returns the loaded set's name.
    pub fn try_load_set_from_file(&mut self, path: &Path) -> Result<String, IndiforgeError> {
        let text = fs::read_to_string(path)?;
        let set = IndicatorSet::from_json(&text).map_err(|e| IndiforgeError::DefinitionParse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let name = set.set_name.clone();
        self.register_set(set)?;
        Ok(name)
    }

    /// Validate and register an in-memory set.
    ///
    /// A set with the name of one already loaded replaces it in its original
    /// position.
    pub fn register_set(&mut self, set: IndicatorSet) -> Result<(), IndiforgeError> {
        set.validate(&self.builtins)?;
        let compiled: Vec<CompiledIndicator> = set
            .indicators
            .iter()
            .map(|def| CompiledIndicator {
                name: def.name.clone(),
                formula: def.formula.clone(),
                expr: self.parse_formula(&def.formula),
            })
            .collect();
        let unparsed = compiled.iter().filter(|c| c.expr.is_err()).count();
        if unparsed > 0 {
            warn!(
                "IndicatorEngine: set '{}' has {} formula(s) that do not parse",
                set.set_name, unparsed
            );
        }
        let count = compiled.len();
        let loaded = LoadedSet { set, compiled };
        let name = loaded.set.set_name.clone();
        match self.sets.iter_mut().find(|s| s.set.set_name == name) {
            Some(existing) => {
                *existing = loaded;
                info!(
                    "IndicatorEngine: replaced set '{}' ({} indicators)",
                    name, count
                );
            }
            None => {
                self.sets.push(loaded);
                info!("IndicatorEngine: loaded set '{}' ({} indicators)", name, count);
            }
        }
        Ok(())
    }

    /// Apply one set to `table`, returning an augmented copy.
    ///
    /// Indicators run in declared order. Each success becomes a column and is
    /// visible to later formulas; each failure is logged and leaves no column.
    pub fn calculate_set(
        &self,
        table: &TimeSeriesTable,
        set_name: &str,
    ) -> Result<TimeSeriesTable, IndiforgeError> {
        let loaded = self
            .find(set_name)
            .ok_or_else(|| IndiforgeError::SetNotLoaded(set_name.to_string()))?;
        table.require_ohlcv()?;

        let mut output = table.clone();
        let mut ctx = EvaluationContext::for_table(&self.builtins, table);
        let mut failed = 0usize;

        for indicator in &loaded.compiled {
            let started = Instant::now();
            let result = match &indicator.expr {
                Ok(expr) => evaluate_column(expr, &ctx, &self.budget),
                Err(e) => Err(FormulaError::Parse(e.clone())),
            };
            match result {
                Ok(values) => {
                    output.set_column(indicator.name.as_str(), values.clone())?;
                    ctx.bind_series(indicator.name.as_str(), values);
                    debug!(
                        "IndicatorEngine: {}.{} computed in {:?}",
                        set_name,
                        indicator.name,
                        started.elapsed()
                    );
                }
                Err(e) => {
                    failed += 1;
                    ctx.mark_unbound(indicator.name.as_str());
                    warn!(
                        "IndicatorEngine: {}.{} = {} failed: {}",
                        set_name, indicator.name, indicator.formula, e
                    );
                }
            }
        }

        debug!(
            "IndicatorEngine: applied '{}' to {} rows ({} ok, {} failed)",
            set_name,
            table.len(),
            loaded.compiled.len() - failed,
            failed
        );
        Ok(output)
    }

    /// Loaded set names in registration order.
    pub fn set_names(&self) -> Vec<String> {
        self.sets.iter().map(|s| s.set.set_name.clone()).collect()
    }

    pub fn contains_set(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    pub fn indicator_set(&self, name: &str) -> Option<&IndicatorSet> {
        self.find(name).map(|s| &s.set)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    fn find(&self, name: &str) -> Option<&LoadedSet> {
        self.sets.iter().find(|s| s.set.set_name == name)
    }
}
