//! Moving averages.
//!
//! `EMA` and `SMA` are exponentially weighted means without bias adjustment:
//! the first value seeds the average, then `y[i] = a*x[i] + (1-a)*y[i-1]`.
//! A `NaN` input after the seed carries the previous average forward.
//!
//! `SMA(X, N, M)` is the weighting used by Chinese charting packages,
//! `a = M/N`, so `SMA(X, N, 1)` is Wilder smoothing.

use super::rolling::rolling;
use super::{Builtin, CallContext, from_first_valid};
use crate::domain::error::FormulaError;
use crate::domain::value::Value;

const KAMA_FAST: f64 = 2.0 / 3.0;
const KAMA_SLOW: f64 = 2.0 / 31.0;

pub const BUILTINS: &[Builtin] = &[
    Builtin::fixed("EMA", 2, "EMA(X, N)", builtin_ema),
    Builtin::fixed("SMA", 3, "SMA(X, N, M)", builtin_sma),
    Builtin::fixed("WMA", 2, "WMA(X, N)", builtin_wma),
    Builtin::fixed("KAMA", 2, "KAMA(X, N)", builtin_kama),
];

/// Exponentially weighted mean with smoothing factor `alpha`.
pub fn ewm(x: &[f64], alpha: f64) -> Vec<f64> {
    from_first_valid(&[x], |tails| {
        let x = tails[0];
        let mut out = Vec::with_capacity(x.len());
        let mut prev = f64::NAN;
        for &v in x {
            if prev.is_nan() {
                prev = v;
            } else if !v.is_nan() {
                prev = alpha * v + (1.0 - alpha) * prev;
            }
            out.push(prev);
        }
        out
    })
}

pub fn ema(x: &[f64], n: usize) -> Vec<f64> {
    ewm(x, 2.0 / (n as f64 + 1.0))
}

/// Linearly weighted moving average, newest row weighted `n`.
pub fn wma(x: &[f64], n: usize) -> Vec<f64> {
    let denom = (n * (n + 1)) as f64 / 2.0;
    rolling(x, n, |w| {
        w.iter()
            .enumerate()
            .map(|(i, v)| v * (i + 1) as f64)
            .sum::<f64>()
            / denom
    })
}

/// Kaufman adaptive moving average.
///
/// The efficiency ratio over `n` rows scales the smoothing constant between
/// the 2- and 30-period EMA constants. The first value is at row `n`, seeded
/// from row `n-1`; a gap in the input restarts the seeding.
pub fn kama(x: &[f64], n: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; x.len()];
    let mut prev = f64::NAN;
    for i in n..x.len() {
        let window = &x[i - n..=i];
        if n == 0 || window.iter().any(|v| v.is_nan()) {
            prev = f64::NAN;
            continue;
        }
        if prev.is_nan() {
            prev = x[i - 1];
        }
        let change = (x[i] - x[i - n]).abs();
        let volatility: f64 = window.windows(2).map(|p| (p[1] - p[0]).abs()).sum();
        let er = if volatility == 0.0 {
            0.0
        } else {
            change / volatility
        };
        let sc = (er * (KAMA_FAST - KAMA_SLOW) + KAMA_SLOW).powi(2);
        prev += sc * (x[i] - prev);
        out[i] = prev;
    }
    out
}

fn builtin_ema(args: &[Value], ctx: &CallContext<'_>) -> Result<Value, FormulaError> {
    let n = ctx.window(args, 1)?;
    Ok(Value::Series(ema(&ctx.series(args, 0), n)))
}

fn builtin_sma(args: &[Value], ctx: &CallContext<'_>) -> Result<Value, FormulaError> {
    let n = ctx.window(args, 1)?;
    let m = ctx.scalar(args, 2)?;
    if m <= 0.0 || m > n as f64 {
        return Err(FormulaError::InvalidArgument {
            name: ctx.name.to_string(),
            reason: format!("weight M must be in (0, N], got {}", m),
        });
    }
    Ok(Value::Series(ewm(&ctx.series(args, 0), m / n as f64)))
}

fn builtin_wma(args: &[Value], ctx: &CallContext<'_>) -> Result<Value, FormulaError> {
    let n = ctx.window(args, 1)?;
    Ok(Value::Series(wma(&ctx.series(args, 0), n)))
}

fn builtin_kama(args: &[Value], ctx: &CallContext<'_>) -> Result<Value, FormulaError> {
    let n = ctx.window(args, 1)?;
    Ok(Value::Series(kama(&ctx.series(args, 0), n)))
}
