//! Average Directional Index (ADX) indicator.

use super::atr::true_range;
use crate::services::signals::Indicator;
use crate::types::{IndicatorKind, IndicatorReading, IndicatorSignal, PricePoint, SignalStrength};

/// Latest directional movement values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdxOutput {
    pub adx: f64,
    pub plus_di: f64,
    pub minus_di: f64,
}

/// ADX (Average Directional Index) indicator.
///
/// Measures trend strength, with +DI / -DI giving direction:
/// - Below 20: Weak trend / ranging market
/// - 20-40: Trending
/// - Above 40: Strong trend
///
/// The reported ADX is the current DX. It skips the second Wilder
/// smoothing pass of the full ADX definition.
pub struct Adx {
    period: usize,
}

impl Default for Adx {
    fn default() -> Self {
        Self { period: 14 }
    }
}

impl Adx {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
        }
    }

    /// Cumulative-decay smoothing: seed with the sum of the first `period`
    /// values, then `smoothed -= smoothed / period; smoothed += value`.
    fn smooth(values: &[f64], period: usize) -> Option<f64> {
        if values.len() < period {
            return None;
        }
        let mut smoothed: f64 = values.iter().take(period).sum();
        for value in &values[period..] {
            smoothed -= smoothed / period as f64;
            smoothed += value;
        }
        Some(smoothed)
    }

    pub fn compute(&self, window: &[PricePoint]) -> Option<AdxOutput> {
        if window.len() < self.period + 1 {
            return None;
        }

        let steps = window.len() - 1;
        let mut plus_dm = Vec::with_capacity(steps);
        let mut minus_dm = Vec::with_capacity(steps);
        let mut tr = Vec::with_capacity(steps);

        for pair in window.windows(2) {
            let (previous, current) = (&pair[0], &pair[1]);
            let up_move = current.high - previous.high;
            let down_move = previous.low - current.low;

            plus_dm.push(if up_move > down_move && up_move > 0.0 {
                up_move
            } else {
                0.0
            });
            minus_dm.push(if down_move > up_move && down_move > 0.0 {
                down_move
            } else {
                0.0
            });
            tr.push(true_range(current, previous));
        }

        let atr = Self::smooth(&tr, self.period)?;
        let smoothed_plus = Self::smooth(&plus_dm, self.period)?;
        let smoothed_minus = Self::smooth(&minus_dm, self.period)?;

        if atr <= 0.0 {
            return Some(AdxOutput {
                adx: 0.0,
                plus_di: 0.0,
                minus_di: 0.0,
            });
        }

        let plus_di = smoothed_plus / atr * 100.0;
        let minus_di = smoothed_minus / atr * 100.0;
        let di_sum = plus_di + minus_di;
        let dx = if di_sum > 0.0 {
            (plus_di - minus_di).abs() / di_sum * 100.0
        } else {
            0.0
        };

        Some(AdxOutput {
            adx: dx,
            plus_di,
            minus_di,
        })
    }

    fn classify(output: &AdxOutput) -> (IndicatorSignal, SignalStrength) {
        if output.adx < 20.0 || output.plus_di == output.minus_di {
            return (IndicatorSignal::Neutral, SignalStrength::Weak);
        }
        let signal = if output.plus_di > output.minus_di {
            IndicatorSignal::Buy
        } else {
            IndicatorSignal::Sell
        };
        let strength = if output.adx >= 40.0 {
            SignalStrength::Strong
        } else if output.adx >= 25.0 {
            SignalStrength::Moderate
        } else {
            SignalStrength::Weak
        };
        (signal, strength)
    }
}

impl Indicator for Adx {
    fn kind(&self) -> IndicatorKind {
        IndicatorKind::Adx
    }

    fn min_periods(&self) -> usize {
        self.period + 1
    }

    fn calculate(&self, window: &[PricePoint]) -> Option<IndicatorReading> {
        let output = self.compute(window)?;
        let (signal, strength) = Self::classify(&output);
        Some(IndicatorReading::new(self.kind(), output.adx, signal, strength))
    }
}
