//! Indicator-set documents.
//!
//! ```json
//! {
//!   "set_name": "basic",
//!   "indicators": [
//!     {"name": "MA5", "description": "5-day mean", "formula": "MA(CLOSE, 5)"}
//!   ]
//! }
//! ```
//!
//! Unknown fields are rejected at every level.

use crate::domain::builtins::BuiltinTable;
use crate::domain::context::is_market_series;
use crate::domain::error::IndiforgeError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndicatorDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub formula: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndicatorSet {
    pub set_name: String,
    pub indicators: Vec<IndicatorDefinition>,
}

/// `^[A-Z0-9_]+$`
pub fn is_valid_indicator_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_')
}

impl IndicatorDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        formula: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            formula: formula.into(),
        }
    }
}

impl IndicatorSet {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Two-space indented document.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn indicator_names(&self) -> impl Iterator<Item = &str> {
        self.indicators.iter().map(|d| d.name.as_str())
    }

    /// Structural checks shared by loading and authoring.
    ///
    /// Formulas are only checked for being non-empty here; syntax errors are
    /// reported per indicator at evaluation time.
    pub fn validate(&self, builtins: &BuiltinTable) -> Result<(), IndiforgeError> {
        let invalid = |reason: String| IndiforgeError::DefinitionInvalid {
            set_name: self.set_name.clone(),
            reason,
        };
        if self.set_name.trim().is_empty() {
            return Err(invalid("set_name must not be empty".into()));
        }
        let mut seen = HashSet::new();
        for (i, def) in self.indicators.iter().enumerate() {
            if !is_valid_indicator_name(&def.name) {
                return Err(invalid(format!(
                    "indicator #{} name '{}' must match [A-Z0-9_]+",
                    i + 1,
                    def.name
                )));
            }
            if is_market_series(&def.name) {
                return Err(invalid(format!(
                    "indicator name '{}' is reserved for market data",
                    def.name
                )));
            }
            if builtins.contains(&def.name) {
                return Err(invalid(format!(
                    "indicator name '{}' shadows a builtin function",
                    def.name
                )));
            }
            if !seen.insert(def.name.as_str()) {
                return Err(invalid(format!("duplicate indicator name '{}'", def.name)));
            }
            if def.formula.trim().is_empty() {
                return Err(invalid(format!("indicator '{}' has an empty formula", def.name)));
            }
        }
        Ok(())
    }
}
