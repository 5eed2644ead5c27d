//! Volume Weighted Average Price (VWAP) indicator.

use crate::services::signals::{strength_from_pct, Indicator};
use crate::types::{IndicatorKind, IndicatorReading, IndicatorSignal, PricePoint};

/// Relative slack when comparing volume against its average.
const VOLUME_TOLERANCE: f64 = 1e-9;

/// VWAP (Volume Weighted Average Price) indicator.
///
/// VWAP = Σ(TP * Volume) / Σ(Volume) over the last `period` points,
/// where TP is the typical price (high + low + close) / 3.
///
/// Signals:
/// - Price above VWAP = BUY
/// - Otherwise = SELL
pub struct Vwap {
    period: usize,
}

impl Default for Vwap {
    fn default() -> Self {
        Self {
            period: Self::DEFAULT_PERIOD,
        }
    }
}

impl Vwap {
    pub const DEFAULT_PERIOD: usize = 20;

    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
        }
    }

    /// Calculate typical price.
    fn typical_price(point: &PricePoint) -> f64 {
        (point.high + point.low + point.close) / 3.0
    }

    /// VWAP over the trailing `period` points. None when total volume is zero.
    pub fn calculate_vwap(window: &[PricePoint], period: usize) -> Option<f64> {
        if window.is_empty() {
            return None;
        }
        let recent = &window[window.len().saturating_sub(period)..];

        let (cum_tp_vol, cum_vol) = recent.iter().fold((0.0, 0.0), |(tp_vol, vol), p| {
            let volume = p.volume.max(0.0);
            (tp_vol + Self::typical_price(p) * volume, vol + volume)
        });

        if cum_vol > 0.0 {
            Some(cum_tp_vol / cum_vol)
        } else {
            None
        }
    }

    /// Whether the most recent volume is at or above the average of the
    /// `period` points before it. A lone point has nothing to compare against
    /// and counts as expanding.
    pub fn volume_expanding(window: &[PricePoint], period: usize) -> bool {
        let Some((last, earlier)) = window.split_last() else {
            return false;
        };
        let prior = &earlier[earlier.len().saturating_sub(period)..];
        if prior.is_empty() {
            return true;
        }
        let avg = prior.iter().map(|p| p.volume).sum::<f64>() / prior.len() as f64;
        last.volume >= avg * (1.0 - VOLUME_TOLERANCE)
    }
}

impl Indicator for Vwap {
    fn kind(&self) -> IndicatorKind {
        IndicatorKind::Vwap
    }

    fn min_periods(&self) -> usize {
        self.period
    }

    fn calculate(&self, window: &[PricePoint]) -> Option<IndicatorReading> {
        let vwap = Self::calculate_vwap(window, self.period)?;
        let current_price = window.last()?.close;

        let pct_diff = (current_price - vwap) / vwap * 100.0;
        let signal = if current_price > vwap {
            IndicatorSignal::Buy
        } else {
            IndicatorSignal::Sell
        };

        Some(IndicatorReading::new(
            self.kind(),
            vwap,
            signal,
            strength_from_pct(pct_diff),
        ))
    }

    fn default_reading(&self, window: &[PricePoint]) -> IndicatorReading {
        IndicatorReading::neutral(self.kind(), window.last().map(|p| p.close).unwrap_or(0.0))
    }
}
