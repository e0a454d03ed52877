//! Momentum and trend-strength oscillators.
//!
//! RSI and ADX use Wilder smoothing: the first average is the simple mean of
//! the first `n` observations, then `avg = (prev * (n-1) + current) / n`.
//! MACD lines are differences of [`ema`], so they start at the first valid
//! input row.

use super::averages::{ema, ewm};
use super::rolling::{rolling_max, rolling_mean, rolling_min, shift};
use super::{Builtin, CallContext, from_first_valid};
use crate::domain::error::FormulaError;
use crate::domain::ohlcv::true_range;
use crate::domain::value::Value;

pub const BUILTINS: &[Builtin] = &[
    Builtin::fixed("RSI", 2, "RSI(X, N)", builtin_rsi),
    Builtin::fixed("MACD", 3, "MACD(X, FAST, SLOW)", builtin_macd),
    Builtin::fixed(
        "MACD_SIGNAL",
        4,
        "MACD_SIGNAL(X, FAST, SLOW, SIGNAL)",
        builtin_macd_signal,
    ),
    Builtin::fixed(
        "MACD_HIST",
        4,
        "MACD_HIST(X, FAST, SLOW, SIGNAL)",
        builtin_macd_hist,
    ),
    Builtin::fixed("KDJ_K", 6, "KDJ_K(H, L, C, N, M1, M2)", builtin_kdj_k),
    Builtin::fixed("KDJ_D", 6, "KDJ_D(H, L, C, N, M1, M2)", builtin_kdj_d),
    Builtin::fixed("KDJ_J", 6, "KDJ_J(H, L, C, N, M1, M2)", builtin_kdj_j),
    Builtin::fixed("ADX", 4, "ADX(H, L, C, N)", builtin_adx),
    Builtin::fixed("CCI", 4, "CCI(H, L, C, N)", builtin_cci),
    Builtin::fixed("MOM", 2, "MOM(X, N)", builtin_mom),
    Builtin::fixed("ROC", 2, "ROC(X, N)", builtin_roc),
];

/// Relative strength index.
///
/// The first value is at the `n`-th price change. `avg_loss == 0` gives 100.
/// A change touching a `NaN` price yields `NaN` and leaves the averages as
/// they were.
pub fn rsi(x: &[f64], n: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; x.len()];
    if n == 0 {
        return out;
    }
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    let mut seen = 0usize;
    for i in 1..x.len() {
        let change = x[i] - x[i - 1];
        if change.is_nan() {
            continue;
        }
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);
        seen += 1;
        if seen <= n {
            avg_gain += gain / n as f64;
            avg_loss += loss / n as f64;
            if seen < n {
                continue;
            }
        } else {
            avg_gain = (avg_gain * (n - 1) as f64 + gain) / n as f64;
            avg_loss = (avg_loss * (n - 1) as f64 + loss) / n as f64;
        }
        out[i] = if avg_loss == 0.0 {
            100.0
        } else {
            100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
        };
    }
    out
}

pub fn macd_line(x: &[f64], fast: usize, slow: usize) -> Vec<f64> {
    ema(x, fast)
        .into_iter()
        .zip(ema(x, slow))
        .map(|(f, s)| f - s)
        .collect()
}

pub fn macd_signal(x: &[f64], fast: usize, slow: usize, signal: usize) -> Vec<f64> {
    ema(&macd_line(x, fast, slow), signal)
}

/// `MACD - MACD_SIGNAL`, unscaled.
pub fn macd_hist(x: &[f64], fast: usize, slow: usize, signal: usize) -> Vec<f64> {
    let line = macd_line(x, fast, slow);
    let sig = ema(&line, signal);
    line.iter().zip(&sig).map(|(l, s)| l - s).collect()
}

/// KDJ stochastic lines `(K, D, J)`.
///
/// `RSV = (C - LLV(L, n)) / (HHV(H, n) - LLV(L, n)) * 100`, 50 when the range
/// is zero. `K` smooths RSV with weight `1/m1`, `D` smooths `K` with `1/m2`,
/// and `J = 3K - 2D`.
pub fn kdj(
    h: &[f64],
    l: &[f64],
    c: &[f64],
    n: usize,
    m1: usize,
    m2: usize,
) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let hh = rolling_max(h, n);
    let ll = rolling_min(l, n);
    let rsv: Vec<f64> = (0..c.len())
        .map(|i| {
            let range = hh[i] - ll[i];
            if range == 0.0 {
                50.0
            } else {
                (c[i] - ll[i]) / range * 100.0
            }
        })
        .collect();
    let k = ewm(&rsv, 1.0 / m1 as f64);
    let d = ewm(&k, 1.0 / m2 as f64);
    let j = k.iter().zip(&d).map(|(k, d)| 3.0 * k - 2.0 * d).collect();
    (k, d, j)
}

/// Average directional index.
///
/// Directional movement and true range are Wilder-summed over `n` rows from
/// row `n`; DX is averaged over another `n` rows, so the first value is at
/// row `2n-1` counted from the first valid input.
pub fn adx(h: &[f64], l: &[f64], c: &[f64], n: usize) -> Vec<f64> {
    from_first_valid(&[h, l, c], |tails| adx_from_start(tails[0], tails[1], tails[2], n))
}

fn adx_from_start(h: &[f64], l: &[f64], c: &[f64], n: usize) -> Vec<f64> {
    let len = h.len();
    let mut out = vec![f64::NAN; len];
    if n == 0 || len <= 2 * n - 1 {
        return out;
    }
    let nf = n as f64;
    let mut tr_sum = 0.0;
    let mut plus_sum = 0.0;
    let mut minus_sum = 0.0;
    let mut dx_sum = 0.0;
    let mut adx = f64::NAN;
    for i in 1..len {
        let up = h[i] - h[i - 1];
        let down = l[i - 1] - l[i];
        let plus_dm = if up > down && up > 0.0 { up } else { 0.0 };
        let minus_dm = if down > up && down > 0.0 { down } else { 0.0 };
        let tr = true_range(h[i], l[i], c[i - 1]);
        if i <= n {
            tr_sum += tr;
            plus_sum += plus_dm;
            minus_sum += minus_dm;
            if i < n {
                continue;
            }
        } else {
            tr_sum = tr_sum - tr_sum / nf + tr;
            plus_sum = plus_sum - plus_sum / nf + plus_dm;
            minus_sum = minus_sum - minus_sum / nf + minus_dm;
        }
        let (plus_di, minus_di) = if tr_sum == 0.0 {
            (0.0, 0.0)
        } else {
            (100.0 * plus_sum / tr_sum, 100.0 * minus_sum / tr_sum)
        };
        let di_sum = plus_di + minus_di;
        let dx = if di_sum == 0.0 {
            0.0
        } else {
            100.0 * (plus_di - minus_di).abs() / di_sum
        };
        if i < 2 * n - 1 {
            dx_sum += dx;
        } else if i == 2 * n - 1 {
            adx = (dx_sum + dx) / nf;
            out[i] = adx;
        } else {
            adx = (adx * (nf - 1.0) + dx) / nf;
            out[i] = adx;
        }
    }
    out
}

/// Commodity channel index on the typical price. Zero mean deviation gives 0.
pub fn cci(h: &[f64], l: &[f64], c: &[f64], n: usize) -> Vec<f64> {
    let tp: Vec<f64> = (0..c.len()).map(|i| (h[i] + l[i] + c[i]) / 3.0).collect();
    let mean = rolling_mean(&tp, n);
    (0..tp.len())
        .map(|i| {
            if mean[i].is_nan() {
                return f64::NAN;
            }
            let window = &tp[i + 1 - n..=i];
            let md = window.iter().map(|v| (v - mean[i]).abs()).sum::<f64>() / n as f64;
            if md == 0.0 {
                0.0
            } else {
                (tp[i] - mean[i]) / (0.015 * md)
            }
        })
        .collect()
}

pub fn momentum(x: &[f64], n: usize) -> Vec<f64> {
    x.iter().zip(shift(x, n)).map(|(v, p)| v - p).collect()
}

/// Percentage rate of change. A zero base price gives 0.
pub fn roc(x: &[f64], n: usize) -> Vec<f64> {
    x.iter()
        .zip(shift(x, n))
        .map(|(v, p)| {
            if p == 0.0 {
                0.0
            } else {
                (v - p) / p * 100.0
            }
        })
        .collect()
}

fn builtin_rsi(args: &[Value], ctx: &CallContext<'_>) -> Result<Value, FormulaError> {
    let n = ctx.window(args, 1)?;
    Ok(Value::Series(rsi(&ctx.series(args, 0), n)))
}

fn macd_periods(args: &[Value], ctx: &CallContext<'_>) -> Result<(usize, usize), FormulaError> {
    Ok((ctx.window(args, 1)?, ctx.window(args, 2)?))
}

fn builtin_macd(args: &[Value], ctx: &CallContext<'_>) -> Result<Value, FormulaError> {
    let (fast, slow) = macd_periods(args, ctx)?;
    Ok(Value::Series(macd_line(&ctx.series(args, 0), fast, slow)))
}

fn builtin_macd_signal(args: &[Value], ctx: &CallContext<'_>) -> Result<Value, FormulaError> {
    let (fast, slow) = macd_periods(args, ctx)?;
    let signal = ctx.window(args, 3)?;
    Ok(Value::Series(macd_signal(
        &ctx.series(args, 0),
        fast,
        slow,
        signal,
    )))
}

fn builtin_macd_hist(args: &[Value], ctx: &CallContext<'_>) -> Result<Value, FormulaError> {
    let (fast, slow) = macd_periods(args, ctx)?;
    let signal = ctx.window(args, 3)?;
    Ok(Value::Series(macd_hist(
        &ctx.series(args, 0),
        fast,
        slow,
        signal,
    )))
}

fn kdj_args(
    args: &[Value],
    ctx: &CallContext<'_>,
) -> Result<(Vec<f64>, Vec<f64>, Vec<f64>), FormulaError> {
    let n = ctx.window(args, 3)?;
    let m1 = ctx.window(args, 4)?;
    let m2 = ctx.window(args, 5)?;
    Ok(kdj(
        &ctx.series(args, 0),
        &ctx.series(args, 1),
        &ctx.series(args, 2),
        n,
        m1,
        m2,
    ))
}

fn builtin_kdj_k(args: &[Value], ctx: &CallContext<'_>) -> Result<Value, FormulaError> {
    kdj_args(args, ctx).map(|(k, _, _)| Value::Series(k))
}

fn builtin_kdj_d(args: &[Value], ctx: &CallContext<'_>) -> Result<Value, FormulaError> {
    kdj_args(args, ctx).map(|(_, d, _)| Value::Series(d))
}

fn builtin_kdj_j(args: &[Value], ctx: &CallContext<'_>) -> Result<Value, FormulaError> {
    kdj_args(args, ctx).map(|(_, _, j)| Value::Series(j))
}

fn builtin_adx(args: &[Value], ctx: &CallContext<'_>) -> Result<Value, FormulaError> {
    let n = ctx.window(args, 3)?;
    Ok(Value::Series(adx(
        &ctx.series(args, 0),
        &ctx.series(args, 1),
        &ctx.series(args, 2),
        n,
    )))
}

fn builtin_cci(args: &[Value], ctx: &CallContext<'_>) -> Result<Value, FormulaError> {
    let n = ctx.window(args, 3)?;
    Ok(Value::Series(cci(
        &ctx.series(args, 0),
        &ctx.series(args, 1),
        &ctx.series(args, 2),
        n,
    )))
}

fn builtin_mom(args: &[Value], ctx: &CallContext<'_>) -> Result<Value, FormulaError> {
    let n = ctx.lag(args, 1)?;
    Ok(Value::Series(momentum(&ctx.series(args, 0), n)))
}

fn builtin_roc(args: &[Value], ctx: &CallContext<'_>) -> Result<Value, FormulaError> {
    let n = ctx.window(args, 1)?;
    Ok(Value::Series(roc(&ctx.series(args, 0), n)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rsi_warmup_period() {
        let x: Vec<f64> = (1..=15).map(|i| 100.0 + (i as f64 % 5.0) * 2.0).collect();
        let out = rsi(&x, 14);
        for v in &out[..14] {
            assert!(v.is_nan());
        }
        assert!(!out[14].is_nan());
    }

    #[test]
    fn rsi_all_gains_is_100_all_losses_is_0() {
        let up: Vec<f64> = (0..15).map(|i| 100.0 + i as f64).collect();
        assert_relative_eq!(rsi(&up, 14)[14], 100.0);

        let down: Vec<f64> = (0..15).map(|i| 100.0 - i as f64).collect();
        assert_relative_eq!(rsi(&down, 14)[14], 0.0);
    }

    #[test]
    fn rsi_wilder_smoothing() {
        // changes: +2, -1, +1 ; n = 2
        // seed: gain (2+0)/2 = 1, loss (0+1)/2 = 0.5 -> 100 - 100/3
        // next: gain (1*1 + 1)/2 = 1, loss (0.5*1 + 0)/2 = 0.25 -> 80
        let out = rsi(&[10.0, 12.0, 11.0, 12.0], 2);
        assert!(out[1].is_nan());
        assert_relative_eq!(out[2], 100.0 - 100.0 / 3.0);
        assert_relative_eq!(out[3], 80.0);
    }

    #[test]
    fn macd_hist_is_line_minus_signal() {
        let x: Vec<f64> = (0..30).map(|i| 10.0 + (i as f64 * 0.7).sin()).collect();
        let line = macd_line(&x, 3, 6);
        let signal = macd_signal(&x, 3, 6, 4);
        let hist = macd_hist(&x, 3, 6, 4);
        for i in 0..x.len() {
            assert_relative_eq!(hist[i], line[i] - signal[i], epsilon = 1e-12);
        }
        assert_relative_eq!(line[0], 0.0);
    }

    #[test]
    fn kdj_zero_range_is_neutral() {
        let flat = [10.0; 5];
        let (k, d, j) = kdj(&flat, &flat, &flat, 3, 3, 3);
        assert!(k[1].is_nan());
        for i in 2..5 {
            assert_relative_eq!(k[i], 50.0);
            assert_relative_eq!(d[i], 50.0);
            assert_relative_eq!(j[i], 50.0);
        }
    }

    #[test]
    fn kdj_close_at_high_gives_rsv_100() {
        let h = [10.0, 11.0, 12.0];
        let l = [9.0, 10.0, 11.0];
        let (k, _, _) = kdj(&h, &l, &h, 2, 3, 3);
        // RSV at row 1 is (11 - 9) / (11 - 9) * 100; it seeds K
        assert_relative_eq!(k[1], 100.0);
        assert_relative_eq!(k[2], 100.0);
    }

    #[test]
    fn adx_first_value_at_two_n_minus_one() {
        let h: Vec<f64> = (0..12).map(|i| 10.0 + i as f64).collect();
        let l: Vec<f64> = h.iter().map(|v| v - 1.0).collect();
        let c: Vec<f64> = h.iter().map(|v| v - 0.5).collect();
        let out = adx(&h, &l, &c, 3);
        for v in &out[..5] {
            assert!(v.is_nan());
        }
        // steady uptrend: no minus DM, DX is 100 every row
        for v in &out[5..] {
            assert_relative_eq!(*v, 100.0);
        }
    }

    #[test]
    fn adx_too_short_is_all_nan() {
        let x = [1.0, 2.0, 3.0];
        assert!(adx(&x, &x, &x, 3).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn cci_constant_prices_are_zero() {
        let x = [5.0; 4];
        let out = cci(&x, &x, &x, 3);
        assert!(out[1].is_nan());
        assert_eq!(&out[2..], &[0.0, 0.0]);
    }

    #[test]
    fn cci_known_value() {
        // tp = 1, 2, 3 ; mean 2 ; md = 2/3 ; (3 - 2) / (0.015 * 2/3) = 100
        let tp = [1.0, 2.0, 3.0];
        let out = cci(&tp, &tp, &tp, 3);
        assert_relative_eq!(out[2], 100.0, epsilon = 1e-9);
    }

    #[test]
    fn momentum_and_roc() {
        let x = [100.0, 110.0, 121.0];
        let m = momentum(&x, 1);
        assert!(m[0].is_nan());
        assert_relative_eq!(m[1], 10.0);
        let r = roc(&x, 1);
        assert_relative_eq!(r[1], 10.0);
        assert_relative_eq!(r[2], 10.0);
        assert_eq!(roc(&[0.0, 5.0], 1)[1], 0.0);
    }
}
