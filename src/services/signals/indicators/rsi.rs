//! Relative Strength Index (RSI) indicator.

use crate::services::signals::{closes, Indicator};
use crate::types::{IndicatorKind, IndicatorReading, IndicatorSignal, PricePoint, SignalStrength};

/// Value reported when RSI cannot be computed.
pub const RSI_NEUTRAL: f64 = 50.0;

/// RSI (Relative Strength Index) indicator.
///
/// Measures momentum by comparing the magnitude of recent gains to recent losses.
/// Values range from 0-100:
/// - 70 or above: Overbought
/// - 30 or below: Oversold
pub struct Rsi {
    period: usize,
}

impl Default for Rsi {
    fn default() -> Self {
        Self { period: 14 }
    }
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
        }
    }

    /// Wilder-smoothed RSI over closing prices.
    ///
    /// Returns None when fewer than `period + 1` closes are available. A
    /// series with no movement at all is degenerate and reads 50.
    pub fn calculate_rsi(closes: &[f64], period: usize) -> Option<f64> {
        if period == 0 || closes.len() < period + 1 {
            return None;
        }

        let mut gains = Vec::with_capacity(closes.len() - 1);
        let mut losses = Vec::with_capacity(closes.len() - 1);

        for pair in closes.windows(2) {
            let change = pair[1] - pair[0];
            if change > 0.0 {
                gains.push(change);
                losses.push(0.0);
            } else {
                gains.push(0.0);
                losses.push(-change);
            }
        }

        // Calculate initial averages
        let mut avg_gain: f64 = gains.iter().take(period).sum::<f64>() / period as f64;
        let mut avg_loss: f64 = losses.iter().take(period).sum::<f64>() / period as f64;

        // Wilder's smoothing for the remaining deltas
        for i in period..gains.len() {
            avg_gain = (avg_gain * (period - 1) as f64 + gains[i]) / period as f64;
            avg_loss = (avg_loss * (period - 1) as f64 + losses[i]) / period as f64;
        }

        if avg_loss == 0.0 {
            if avg_gain == 0.0 {
                return Some(RSI_NEUTRAL);
            }
            return Some(100.0);
        }

        let rs = avg_gain / avg_loss;
        Some(100.0 - (100.0 / (1.0 + rs)))
    }

    fn classify(rsi: f64) -> (IndicatorSignal, SignalStrength) {
        if rsi >= 70.0 {
            let strength = if rsi >= 80.0 {
                SignalStrength::Strong
            } else {
                SignalStrength::Moderate
            };
            (IndicatorSignal::Overbought, strength)
        } else if rsi <= 30.0 {
            let strength = if rsi <= 20.0 {
                SignalStrength::Strong
            } else {
                SignalStrength::Moderate
            };
            (IndicatorSignal::Oversold, strength)
        } else {
            (IndicatorSignal::Neutral, SignalStrength::Weak)
        }
    }
}

impl Indicator for Rsi {
    fn kind(&self) -> IndicatorKind {
        IndicatorKind::Rsi
    }

    fn min_periods(&self) -> usize {
        self.period + 1
    }

    fn calculate(&self, window: &[PricePoint]) -> Option<IndicatorReading> {
        let rsi = Self::calculate_rsi(&closes(window), self.period)?;
        let (signal, strength) = Self::classify(rsi);
        Some(IndicatorReading::new(self.kind(), rsi, signal, strength))
    }

    fn default_reading(&self, _window: &[PricePoint]) -> IndicatorReading {
        IndicatorReading::neutral(self.kind(), RSI_NEUTRAL)
    }
}
