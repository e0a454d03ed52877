//! Builtin series functions available to formulas.
//!
//! A [`BuiltinTable`] is the capability table an engine is constructed with:
//! it is built once, never mutated afterwards, and shared behind an `Arc`.
//! Formulas can only call what the table holds, so a restricted table
//! (see [`BuiltinTable::restricted_to`]) is how untrusted sources get a
//! smaller surface.
//!
//! The numeric kernels live in the submodules and work on plain slices. They
//! use `NaN` for "no value": warm-up rows and any window touching a `NaN`
//! input.

pub mod averages;
pub mod math;
pub mod oscillators;
pub mod rolling;
pub mod volatility;
pub mod volume;

use crate::domain::error::FormulaError;
use crate::domain::value::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

pub type BuiltinFn = fn(&[Value], &CallContext<'_>) -> Result<Value, FormulaError>;

/// One entry of the capability table.
#[derive(Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub min_args: usize,
    pub max_args: usize,
    pub signature: &'static str,
    pub func: BuiltinFn,
}

impl Builtin {
    pub const fn fixed(
        name: &'static str,
        args: usize,
        signature: &'static str,
        func: BuiltinFn,
    ) -> Self {
        Self {
            name,
            min_args: args,
            max_args: args,
            signature,
            func,
        }
    }

    pub fn check_arity(&self, found: usize) -> Result<(), FormulaError> {
        if found < self.min_args || found > self.max_args {
            let expected = if self.min_args == self.max_args {
                self.min_args.to_string()
            } else {
                format!("{}..{}", self.min_args, self.max_args)
            };
            return Err(FormulaError::Arity {
                name: self.name.to_string(),
                expected,
                found,
            });
        }
        Ok(())
    }
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builtin")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish()
    }
}

/// Per-call information handed to a builtin.
#[derive(Debug, Clone, Copy)]
pub struct CallContext<'a> {
    pub name: &'a str,
    pub len: usize,
    pub max_window: usize,
}

impl CallContext<'_> {
    fn invalid(&self, reason: impl Into<String>) -> FormulaError {
        FormulaError::InvalidArgument {
            name: self.name.to_string(),
            reason: reason.into(),
        }
    }

    /// Argument `index` as a series; scalars are broadcast to the table length.
    pub fn series<'v>(&self, args: &'v [Value], index: usize) -> Cow<'v, [f64]> {
        match &args[index] {
            Value::Series(values) => Cow::Borrowed(values.as_slice()),
            Value::Scalar(v) => Cow::Owned(vec![*v; self.len]),
        }
    }

    pub fn scalar(&self, args: &[Value], index: usize) -> Result<f64, FormulaError> {
        match args[index].as_scalar() {
            Some(v) if v.is_finite() => Ok(v),
            Some(v) => Err(self.invalid(format!("argument {} must be finite, got {}", index + 1, v))),
            None => Err(self.invalid(format!(
                "argument {} must be a constant, not a series",
                index + 1
            ))),
        }
    }

    fn period(&self, args: &[Value], index: usize, min: usize) -> Result<usize, FormulaError> {
        let v = self.scalar(args, index)?;
        if v.fract() != 0.0 || v < min as f64 {
            return Err(self.invalid(format!(
                "argument {} must be an integer >= {}, got {}",
                index + 1,
                min,
                v
            )));
        }
        if v > self.max_window as f64 {
            return Err(FormulaError::BudgetExceeded {
                reason: format!(
                    "{} window {} exceeds maximum of {}",
                    self.name, v, self.max_window
                ),
            });
        }
        Ok(v as usize)
    }

    /// Window length argument: integer in `1..=max_window`.
    pub fn window(&self, args: &[Value], index: usize) -> Result<usize, FormulaError> {
        self.period(args, index, 1)
    }

    /// Lag argument: integer in `0..=max_window`.
    pub fn lag(&self, args: &[Value], index: usize) -> Result<usize, FormulaError> {
        self.period(args, index, 0)
    }
}

/// Immutable table of callable builtins keyed by name.
#[derive(Debug, Clone, Default)]
pub struct BuiltinTable {
    functions: BTreeMap<&'static str, Builtin>,
}

impl BuiltinTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every builtin the formula language knows about.
    pub fn standard() -> Self {
        let mut table = Self::empty();
        for builtin in rolling::BUILTINS
            .iter()
            .chain(averages::BUILTINS)
            .chain(oscillators::BUILTINS)
            .chain(volatility::BUILTINS)
            .chain(volume::BUILTINS)
            .chain(math::BUILTINS)
        {
            table.functions.insert(builtin.name, *builtin);
        }
        table
    }

    /// A copy holding only the named builtins. Unknown names are ignored.
    pub fn restricted_to(&self, names: &[&str]) -> Self {
        let functions = self
            .functions
            .iter()
            .filter(|(name, _)| names.contains(*name))
            .map(|(name, builtin)| (*name, *builtin))
            .collect();
        Self { functions }
    }

    pub fn get(&self, name: &str) -> Option<&Builtin> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Builtin names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.functions.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Builtin> {
        self.functions.values()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// Index of the first row where every input is non-`NaN` (`len` if none).
///
/// Recursive filters start at this row so that series derived from other
/// indicators, which begin with warm-up `NaN`s, can still be smoothed.
pub(crate) fn first_valid(inputs: &[&[f64]]) -> usize {
    let len = inputs.iter().map(|s| s.len()).min().unwrap_or(0);
    (0..len)
        .find(|&i| inputs.iter().all(|s| !s[i].is_nan()))
        .unwrap_or(len)
}

/// Run `compute` on the rows from [`first_valid`] onwards and pad the front
/// with `NaN` so the output stays aligned with the inputs.
pub(crate) fn from_first_valid(
    inputs: &[&[f64]],
    compute: impl FnOnce(&[&[f64]]) -> Vec<f64>,
) -> Vec<f64> {
    let len = inputs.iter().map(|s| s.len()).min().unwrap_or(0);
    let start = first_valid(inputs);
    let tails: Vec<&[f64]> = inputs.iter().map(|s| &s[start..len]).collect();
    let mut out = vec![f64::NAN; start];
    out.extend(compute(&tails));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(len: usize) -> CallContext<'static> {
        CallContext {
            name: "MA",
            len,
            max_window: 100,
        }
    }

    #[test]
    fn standard_table_covers_documented_functions() {
        let table = BuiltinTable::standard();
        for name in [
            "REF", "MA", "STD", "VAR", "MAX", "MIN", "HHV", "LLV", "SUM", "CORR", "EMA", "SMA",
            "WMA", "KAMA", "RSI", "MACD", "MACD_SIGNAL", "MACD_HIST", "KDJ_K", "KDJ_D", "KDJ_J",
            "ADX", "CCI", "MOM", "ROC", "TR", "ATR", "OBV", "AD", "ADOSC", "MFI", "BOLL_UPPER",
            "BOLL_MID", "BOLL_LOWER", "SAR", "LOG", "EXP", "SQRT", "POW", "ABS", "IF",
        ] {
            assert!(table.contains(name), "missing builtin {}", name);
        }
    }

    #[test]
    fn names_are_sorted_and_unique() {
        let table = BuiltinTable::standard();
        let names: Vec<&str> = table.names().collect();
        let mut sorted = names.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(names, sorted);
        assert_eq!(names.len(), table.len());
    }

    #[test]
    fn restricted_table_keeps_only_named() {
        let table = BuiltinTable::standard().restricted_to(&["MA", "EMA", "NOPE"]);
        assert_eq!(table.len(), 2);
        assert!(table.contains("MA"));
        assert!(!table.contains("RSI"));
    }

    #[test]
    fn arity_check_reports_expected_count() {
        let table = BuiltinTable::standard();
        let ma = table.get("MA").unwrap();
        assert!(ma.check_arity(2).is_ok());
        let err = ma.check_arity(3).unwrap_err();
        assert_eq!(
            err,
            FormulaError::Arity {
                name: "MA".into(),
                expected: "2".into(),
                found: 3
            }
        );
    }

    #[test]
    fn window_argument_validation() {
        let c = ctx(3);
        let args = vec![Value::Scalar(5.0), Value::Scalar(2.5), Value::Scalar(0.0)];
        assert_eq!(c.window(&args, 0).unwrap(), 5);
        assert!(matches!(
            c.window(&args, 1),
            Err(FormulaError::InvalidArgument { .. })
        ));
        assert!(matches!(
            c.window(&args, 2),
            Err(FormulaError::InvalidArgument { .. })
        ));
        assert_eq!(c.lag(&args, 2).unwrap(), 0);
    }

    #[test]
    fn window_argument_respects_budget() {
        let c = ctx(3);
        let args = vec![Value::Scalar(101.0)];
        assert!(matches!(
            c.window(&args, 0),
            Err(FormulaError::BudgetExceeded { .. })
        ));
    }

    #[test]
    fn series_window_argument_is_rejected() {
        let c = ctx(2);
        let args = vec![Value::Series(vec![1.0, 2.0])];
        assert!(matches!(
            c.window(&args, 0),
            Err(FormulaError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn series_argument_broadcasts_scalar() {
        let c = ctx(3);
        let args = vec![Value::Scalar(2.0)];
        assert_eq!(c.series(&args, 0).as_ref(), &[2.0, 2.0, 2.0]);
    }

    #[test]
    fn first_valid_skips_leading_nan() {
        let a = [f64::NAN, 1.0, 2.0, 3.0];
        let b = [f64::NAN, f64::NAN, 2.0, 3.0];
        assert_eq!(first_valid(&[&a, &b]), 2);
        assert_eq!(first_valid(&[&[f64::NAN, f64::NAN][..]]), 2);

        let out = from_first_valid(&[&a], |tails| tails[0].iter().map(|v| v * 2.0).collect());
        assert!(out[0].is_nan());
        assert_eq!(&out[1..], &[2.0, 4.0, 6.0]);
    }
}
