//! Volatility measures and price channels.
//!
//! - `TR`: true range, `high - low` on the first row
//! - `ATR`: Wilder average of TR, seeded with the mean of the first `n` ranges
//! - `BOLL_*`: moving average ± `k` population standard deviations
//! - `SAR`: Wilder's parabolic stop-and-reverse

use super::rolling::{population_variance, rolling, rolling_mean};
use super::{Builtin, CallContext, from_first_valid};
use crate::domain::error::FormulaError;
use crate::domain::ohlcv::true_range;
use crate::domain::value::Value;

pub const BUILTINS: &[Builtin] = &[
    Builtin::fixed("TR", 3, "TR(H, L, C)", builtin_tr),
    Builtin::fixed("ATR", 4, "ATR(H, L, C, N)", builtin_atr),
    Builtin::fixed("BOLL_UPPER", 3, "BOLL_UPPER(X, N, K)", builtin_boll_upper),
    Builtin::fixed("BOLL_MID", 2, "BOLL_MID(X, N)", builtin_boll_mid),
    Builtin::fixed("BOLL_LOWER", 3, "BOLL_LOWER(X, N, K)", builtin_boll_lower),
    Builtin::fixed("SAR", 4, "SAR(H, L, STEP, MAX)", builtin_sar),
];

pub fn true_ranges(h: &[f64], l: &[f64], c: &[f64]) -> Vec<f64> {
    (0..h.len())
        .map(|i| {
            let prev_close = if i == 0 { f64::NAN } else { c[i - 1] };
            true_range(h[i], l[i], prev_close)
        })
        .collect()
}

pub fn atr(h: &[f64], l: &[f64], c: &[f64], n: usize) -> Vec<f64> {
    from_first_valid(&[h, l, c], |tails| {
        let tr = true_ranges(tails[0], tails[1], tails[2]);
        let mut out = vec![f64::NAN; tr.len()];
        if n == 0 || tr.len() < n {
            return out;
        }
        let mut prev = tr[..n].iter().sum::<f64>() / n as f64;
        out[n - 1] = prev;
        for i in n..tr.len() {
            prev = (prev * (n - 1) as f64 + tr[i]) / n as f64;
            out[i] = prev;
        }
        out
    })
}

fn band(x: &[f64], n: usize, k: f64) -> Vec<f64> {
    let mid = rolling_mean(x, n);
    let std = rolling(x, n, |w| population_variance(w).sqrt());
    mid.iter().zip(&std).map(|(m, s)| m + k * s).collect()
}

/// Parabolic SAR. Row 0 has no value; the initial trend is up when the
/// second high is at least the first.
pub fn sar(h: &[f64], l: &[f64], step: f64, max_step: f64) -> Vec<f64> {
    from_first_valid(&[h, l], |tails| sar_from_start(tails[0], tails[1], step, max_step))
}

fn sar_from_start(h: &[f64], l: &[f64], step: f64, max_step: f64) -> Vec<f64> {
    let len = h.len();
    let mut out = vec![f64::NAN; len];
    if len < 2 {
        return out;
    }
    let mut rising = h[1] >= h[0];
    let mut sar = if rising { l[0] } else { h[0] };
    let mut ep = if rising { h[1] } else { l[1] };
    let mut af = step;
    out[1] = sar;
    for i in 2..len {
        sar += af * (ep - sar);
        if rising {
            sar = sar.min(l[i - 1]).min(l[i - 2]);
            if l[i] < sar {
                rising = false;
                sar = ep;
                ep = l[i];
                af = step;
            } else if h[i] > ep {
                ep = h[i];
                af = (af + step).min(max_step);
            }
        } else {
            sar = sar.max(h[i - 1]).max(h[i - 2]);
            if h[i] > sar {
                rising = true;
                sar = ep;
                ep = h[i];
                af = step;
            } else if l[i] < ep {
                ep = l[i];
                af = (af + step).min(max_step);
            }
        }
        out[i] = sar;
    }
    out
}

fn builtin_tr(args: &[Value], ctx: &CallContext<'_>) -> Result<Value, FormulaError> {
    Ok(Value::Series(true_ranges(
        &ctx.series(args, 0),
        &ctx.series(args, 1),
        &ctx.series(args, 2),
    )))
}

fn builtin_atr(args: &[Value], ctx: &CallContext<'_>) -> Result<Value, FormulaError> {
    let n = ctx.window(args, 3)?;
    Ok(Value::Series(atr(
        &ctx.series(args, 0),
        &ctx.series(args, 1),
        &ctx.series(args, 2),
        n,
    )))
}

fn builtin_boll_upper(args: &[Value], ctx: &CallContext<'_>) -> Result<Value, FormulaError> {
    let n = ctx.window(args, 1)?;
    let k = ctx.scalar(args, 2)?;
    Ok(Value::Series(band(&ctx.series(args, 0), n, k)))
}

fn builtin_boll_mid(args: &[Value], ctx: &CallContext<'_>) -> Result<Value, FormulaError> {
    let n = ctx.window(args, 1)?;
    Ok(Value::Series(rolling_mean(&ctx.series(args, 0), n)))
}

fn builtin_boll_lower(args: &[Value], ctx: &CallContext<'_>) -> Result<Value, FormulaError> {
    let n = ctx.window(args, 1)?;
    let k = ctx.scalar(args, 2)?;
    Ok(Value::Series(band(&ctx.series(args, 0), n, -k)))
}

fn builtin_sar(args: &[Value], ctx: &CallContext<'_>) -> Result<Value, FormulaError> {
    let step = ctx.scalar(args, 2)?;
    let max_step = ctx.scalar(args, 3)?;
    if step <= 0.0 || max_step < step {
        return Err(FormulaError::InvalidArgument {
            name: ctx.name.to_string(),
            reason: format!(
                "need 0 < STEP <= MAX, got STEP={} MAX={}",
                step, max_step
            ),
        });
    }
    Ok(Value::Series(sar(
        &ctx.series(args, 0),
        &ctx.series(args, 1),
        step,
        max_step,
    )))
}
