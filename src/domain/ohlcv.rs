//! OHLCV bars and the per-bar true range.

use chrono::NaiveDate;

/// One daily quote as delivered by an upstream provider.
#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// True range from raw values. A `NaN` previous close degrades to `high - low`.
pub fn true_range(high: f64, low: f64, prev_close: f64) -> f64 {
    let hl = high - low;
    if prev_close.is_nan() {
        return hl;
    }
    let hc = (high - prev_close).abs();
    let lc = (low - prev_close).abs();
    hl.max(hc).max(lc)
}
