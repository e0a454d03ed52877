//! Evaluation context: the identifiers a formula can see.
//!
//! A context lives for one set evaluation. It is seeded with the builtin
//! table, the five market series under their canonical names, and every
//! other column the input table already carries. Each successfully computed
//! indicator is then bound under its own name, so formulas only ever see
//! indicators declared before them.

use crate::domain::builtins::{Builtin, BuiltinTable};
use crate::domain::table::{REQUIRED_COLUMNS, TimeSeriesTable};
use std::borrow::Cow;
use std::collections::HashMap;

/// Canonical formula names of the market series, paired with table columns.
pub const MARKET_SERIES: [(&str, &str); 5] = [
    ("OPEN", "open"),
    ("HIGH", "high"),
    ("LOW", "low"),
    ("CLOSE", "close"),
    ("VOL", "volume"),
];

pub fn is_market_series(name: &str) -> bool {
    MARKET_SERIES.iter().any(|(alias, _)| *alias == name)
}

#[derive(Debug, Clone)]
pub enum ContextEntry<'a> {
    Function(&'a Builtin),
    Series(Cow<'a, [f64]>),
    /// Declared earlier in the set but failed to evaluate.
    Unbound,
}

#[derive(Debug)]
pub struct EvaluationContext<'a> {
    len: usize,
    entries: HashMap<String, ContextEntry<'a>>,
}

impl<'a> EvaluationContext<'a> {
    /// Context holding only the builtins, for tables of `len` rows.
    pub fn new(builtins: &'a BuiltinTable, len: usize) -> Self {
        let entries = builtins
            .iter()
            .map(|b| (b.name.to_string(), ContextEntry::Function(b)))
            .collect();
        Self { len, entries }
    }

    /// Context for evaluating against `table`.
    ///
    /// Missing market columns are simply not bound; callers check the OHLCV
    /// precondition first. Extra columns whose names clash with a builtin or
    /// a market alias are not bound either.
    pub fn for_table(builtins: &'a BuiltinTable, table: &'a TimeSeriesTable) -> Self {
        let mut ctx = Self::new(builtins, table.len());
        for (alias, column) in MARKET_SERIES {
            if let Some(values) = table.column(column) {
                ctx.entries
                    .insert(alias.to_string(), ContextEntry::Series(Cow::Borrowed(values)));
            }
        }
        for column in table.columns() {
            let name = column.name.as_str();
            if REQUIRED_COLUMNS.contains(&name)
                || is_market_series(name)
                || builtins.contains(name)
            {
                continue;
            }
            ctx.entries.insert(
                name.to_string(),
                ContextEntry::Series(Cow::Borrowed(column.values.as_slice())),
            );
        }
        ctx
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn lookup(&self, name: &str) -> Option<&ContextEntry<'a>> {
        self.entries.get(name)
    }

    /// Bind a computed series, shadowing any earlier binding of `name`.
    pub fn bind_series(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.entries
            .insert(name.into(), ContextEntry::Series(Cow::Owned(values)));
    }

    pub fn mark_unbound(&mut self, name: impl Into<String>) {
        self.entries.insert(name.into(), ContextEntry::Unbound);
    }
}
