//! Lag and rolling-window statistics.
//!
//! A window of `n` rows ending at row `i` yields a value only when `i >= n-1`
//! and every input in the window is a number. `STD`/`VAR` are sample
//! statistics (divide by `n-1`), so a window of one row is `NaN`.

use super::{Builtin, CallContext};
use crate::domain::error::FormulaError;
use crate::domain::value::Value;

pub const BUILTINS: &[Builtin] = &[
    Builtin::fixed("REF", 2, "REF(X, N)", builtin_ref),
    Builtin::fixed("MA", 2, "MA(X, N)", builtin_ma),
    Builtin::fixed("SUM", 2, "SUM(X, N)", builtin_sum),
    Builtin::fixed("STD", 2, "STD(X, N)", builtin_std),
    Builtin::fixed("VAR", 2, "VAR(X, N)", builtin_var),
    Builtin::fixed("MAX", 2, "MAX(X, N)", builtin_max),
    Builtin::fixed("MIN", 2, "MIN(X, N)", builtin_min),
    Builtin::fixed("HHV", 2, "HHV(X, N)", builtin_max),
    Builtin::fixed("LLV", 2, "LLV(X, N)", builtin_min),
    Builtin::fixed("CORR", 3, "CORR(X, Y, N)", builtin_corr),
];

/// Value `n` rows earlier.
pub fn shift(x: &[f64], n: usize) -> Vec<f64> {
    (0..x.len())
        .map(|i| if i >= n { x[i - n] } else { f64::NAN })
        .collect()
}

/// Apply `f` to every full, `NaN`-free window of length `n`.
pub fn rolling(x: &[f64], n: usize, f: impl Fn(&[f64]) -> f64) -> Vec<f64> {
    (0..x.len())
        .map(|i| {
            if n == 0 || i + 1 < n {
                return f64::NAN;
            }
            let window = &x[i + 1 - n..=i];
            if window.iter().any(|v| v.is_nan()) {
                f64::NAN
            } else {
                f(window)
            }
        })
        .collect()
}

pub fn rolling_sum(x: &[f64], n: usize) -> Vec<f64> {
    rolling(x, n, |w| w.iter().sum())
}

pub fn rolling_mean(x: &[f64], n: usize) -> Vec<f64> {
    rolling(x, n, |w| w.iter().sum::<f64>() / w.len() as f64)
}

pub fn rolling_var(x: &[f64], n: usize) -> Vec<f64> {
    rolling(x, n, sample_variance)
}

pub fn rolling_std(x: &[f64], n: usize) -> Vec<f64> {
    rolling(x, n, |w| sample_variance(w).sqrt())
}

pub fn rolling_max(x: &[f64], n: usize) -> Vec<f64> {
    rolling(x, n, |w| w.iter().copied().fold(f64::NEG_INFINITY, f64::max))
}

pub fn rolling_min(x: &[f64], n: usize) -> Vec<f64> {
    rolling(x, n, |w| w.iter().copied().fold(f64::INFINITY, f64::min))
}

/// Rolling Pearson correlation. Windows with zero variance are `NaN`.
pub fn rolling_corr(x: &[f64], y: &[f64], n: usize) -> Vec<f64> {
    let len = x.len().min(y.len());
    (0..len)
        .map(|i| {
            if n == 0 || i + 1 < n {
                return f64::NAN;
            }
            let wx = &x[i + 1 - n..=i];
            let wy = &y[i + 1 - n..=i];
            if wx.iter().chain(wy).any(|v| v.is_nan()) {
                return f64::NAN;
            }
            let mx = wx.iter().sum::<f64>() / n as f64;
            let my = wy.iter().sum::<f64>() / n as f64;
            let mut cov = 0.0;
            let mut vx = 0.0;
            let mut vy = 0.0;
            for (a, b) in wx.iter().zip(wy) {
                cov += (a - mx) * (b - my);
                vx += (a - mx) * (a - mx);
                vy += (b - my) * (b - my);
            }
            if vx == 0.0 || vy == 0.0 {
                f64::NAN
            } else {
                cov / (vx * vy).sqrt()
            }
        })
        .collect()
}

/// Population variance, used by Bollinger bands.
pub(crate) fn population_variance(w: &[f64]) -> f64 {
    let mean = w.iter().sum::<f64>() / w.len() as f64;
    w.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / w.len() as f64
}

fn sample_variance(w: &[f64]) -> f64 {
    if w.len() < 2 {
        return f64::NAN;
    }
    let mean = w.iter().sum::<f64>() / w.len() as f64;
    w.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (w.len() - 1) as f64
}

fn builtin_ref(args: &[Value], ctx: &CallContext<'_>) -> Result<Value, FormulaError> {
    let n = ctx.lag(args, 1)?;
    Ok(Value::Series(shift(&ctx.series(args, 0), n)))
}

fn builtin_ma(args: &[Value], ctx: &CallContext<'_>) -> Result<Value, FormulaError> {
    let n = ctx.window(args, 1)?;
    Ok(Value::Series(rolling_mean(&ctx.series(args, 0), n)))
}

fn builtin_sum(args: &[Value], ctx: &CallContext<'_>) -> Result<Value, FormulaError> {
    let n = ctx.window(args, 1)?;
    Ok(Value::Series(rolling_sum(&ctx.series(args, 0), n)))
}

fn builtin_std(args: &[Value], ctx: &CallContext<'_>) -> Result<Value, FormulaError> {
    let n = ctx.window(args, 1)?;
    Ok(Value::Series(rolling_std(&ctx.series(args, 0), n)))
}

fn builtin_var(args: &[Value], ctx: &CallContext<'_>) -> Result<Value, FormulaError> {
    let n = ctx.window(args, 1)?;
    Ok(Value::Series(rolling_var(&ctx.series(args, 0), n)))
}

fn builtin_max(args: &[Value], ctx: &CallContext<'_>) -> Result<Value, FormulaError> {
    let n = ctx.window(args, 1)?;
    Ok(Value::Series(rolling_max(&ctx.series(args, 0), n)))
}

fn builtin_min(args: &[Value], ctx: &CallContext<'_>) -> Result<Value, FormulaError> {
    let n = ctx.window(args, 1)?;
    Ok(Value::Series(rolling_min(&ctx.series(args, 0), n)))
}

fn builtin_corr(args: &[Value], ctx: &CallContext<'_>) -> Result<Value, FormulaError> {
    let n = ctx.window(args, 2)?;
    Ok(Value::Series(rolling_corr(
        &ctx.series(args, 0),
        &ctx.series(args, 1),
        n,
    )))
}
