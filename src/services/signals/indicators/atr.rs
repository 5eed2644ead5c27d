//! Average True Range (ATR).
//!
//! Not part of the confluence registry. The regime detector uses it as its
//! volatility estimate.

use crate::types::PricePoint;

/// True range of `current` given the previous point.
pub fn true_range(current: &PricePoint, previous: &PricePoint) -> f64 {
    let hl = current.high - current.low;
    let hc = (current.high - previous.close).abs();
    let lc = (current.low - previous.close).abs();
    hl.max(hc).max(lc)
}

/// Wilder-smoothed ATR. Needs `period + 1` points.
pub fn atr(window: &[PricePoint], period: usize) -> Option<f64> {
    if period == 0 || window.len() < period + 1 {
        return None;
    }

    let ranges: Vec<f64> = window
        .windows(2)
        .map(|pair| true_range(&pair[1], &pair[0]))
        .collect();

    let mut value = ranges.iter().take(period).sum::<f64>() / period as f64;
    for range in &ranges[period..] {
        value = (value * (period - 1) as f64 + range) / period as f64;
    }
    Some(value)
}

/// ATR as a percentage of the latest close.
pub fn atr_percent(window: &[PricePoint], period: usize) -> Option<f64> {
    let value = atr(window, period)?;
    let price = window.last()?.close;
    if price <= 0.0 {
        return None;
    }
    Some(value / price * 100.0)
}
