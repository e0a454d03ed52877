//! Volume-weighted indicators.

use super::averages::ema;
use super::rolling::rolling_sum;
use super::{Builtin, CallContext, from_first_valid};
use crate::domain::error::FormulaError;
use crate::domain::value::Value;

pub const BUILTINS: &[Builtin] = &[
    Builtin::fixed("OBV", 2, "OBV(C, V)", builtin_obv),
    Builtin::fixed("AD", 4, "AD(H, L, C, V)", builtin_ad),
    Builtin::fixed("ADOSC", 6, "ADOSC(H, L, C, V, FAST, SLOW)", builtin_adosc),
    Builtin::fixed("MFI", 5, "MFI(H, L, C, V, N)", builtin_mfi),
];

/// On-balance volume.
///
/// OBV[0] = volume[0]
/// If close[i] > close[i-1]: OBV[i] = OBV[i-1] + volume[i]
/// If close[i] < close[i-1]: OBV[i] = OBV[i-1] - volume[i]
/// Otherwise OBV[i] = OBV[i-1]
pub fn obv(c: &[f64], v: &[f64]) -> Vec<f64> {
    from_first_valid(&[c, v], |tails| {
        let (c, v) = (tails[0], tails[1]);
        let mut out = Vec::with_capacity(c.len());
        let mut total = 0.0;
        for i in 0..c.len() {
            if i == 0 {
                total = v[0];
            } else if c[i] > c[i - 1] {
                total += v[i];
            } else if c[i] < c[i - 1] {
                total -= v[i];
            }
            out.push(total);
        }
        out
    })
}

/// Chaikin accumulation/distribution line. A bar with `high == low` adds
/// nothing.
pub fn ad(h: &[f64], l: &[f64], c: &[f64], v: &[f64]) -> Vec<f64> {
    from_first_valid(&[h, l, c, v], |tails| {
        let (h, l, c, v) = (tails[0], tails[1], tails[2], tails[3]);
        let mut total = 0.0;
        (0..h.len())
            .map(|i| {
                let range = h[i] - l[i];
                let clv = if range == 0.0 {
                    0.0
                } else {
                    ((c[i] - l[i]) - (h[i] - c[i])) / range
                };
                total += clv * v[i];
                total
            })
            .collect()
    })
}

/// Chaikin oscillator: `EMA(AD, fast) - EMA(AD, slow)`.
pub fn adosc(h: &[f64], l: &[f64], c: &[f64], v: &[f64], fast: usize, slow: usize) -> Vec<f64> {
    let line = ad(h, l, c, v);
    ema(&line, fast)
        .into_iter()
        .zip(ema(&line, slow))
        .map(|(f, s)| f - s)
        .collect()
}

/// Money flow index over `n` typical-price changes. First value at row `n`;
/// no negative flow gives 100.
pub fn mfi(h: &[f64], l: &[f64], c: &[f64], v: &[f64], n: usize) -> Vec<f64> {
    let tp: Vec<f64> = (0..c.len()).map(|i| (h[i] + l[i] + c[i]) / 3.0).collect();
    let mut positive = vec![f64::NAN; tp.len()];
    let mut negative = vec![f64::NAN; tp.len()];
    for i in 1..tp.len() {
        let flow = tp[i] * v[i];
        if flow.is_nan() || tp[i - 1].is_nan() {
            continue;
        }
        positive[i] = if tp[i] > tp[i - 1] { flow } else { 0.0 };
        negative[i] = if tp[i] < tp[i - 1] { flow } else { 0.0 };
    }
    let pos = rolling_sum(&positive, n);
    let neg = rolling_sum(&negative, n);
    pos.iter()
        .zip(&neg)
        .map(|(p, q)| {
            if p.is_nan() || q.is_nan() {
                f64::NAN
            } else if *q == 0.0 {
                100.0
            } else {
                100.0 - 100.0 / (1.0 + p / q)
            }
        })
        .collect()
}

fn builtin_obv(args: &[Value], ctx: &CallContext<'_>) -> Result<Value, FormulaError> {
    Ok(Value::Series(obv(&ctx.series(args, 0), &ctx.series(args, 1))))
}

fn builtin_ad(args: &[Value], ctx: &CallContext<'_>) -> Result<Value, FormulaError> {
    Ok(Value::Series(ad(
        &ctx.series(args, 0),
        &ctx.series(args, 1),
        &ctx.series(args, 2),
        &ctx.series(args, 3),
    )))
}

fn builtin_adosc(args: &[Value], ctx: &CallContext<'_>) -> Result<Value, FormulaError> {
    let fast = ctx.window(args, 4)?;
    let slow = ctx.window(args, 5)?;
    Ok(Value::Series(adosc(
        &ctx.series(args, 0),
        &ctx.series(args, 1),
        &ctx.series(args, 2),
        &ctx.series(args, 3),
        fast,
        slow,
    )))
}

fn builtin_mfi(args: &[Value], ctx: &CallContext<'_>) -> Result<Value, FormulaError> {
    let n = ctx.window(args, 4)?;
    Ok(Value::Series(mfi(
        &ctx.series(args, 0),
        &ctx.series(args, 1),
        &ctx.series(args, 2),
        &ctx.series(args, 3),
        n,
    )))
}
