//! MACD (Moving Average Convergence Divergence) indicator.

use super::ema::ema_series;
use crate::services::signals::{closes, Indicator};
use crate::types::{IndicatorKind, IndicatorReading, IndicatorSignal, PricePoint, SignalStrength};

/// Latest MACD line values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdOutput {
    pub macd: f64,
    pub signal_line: f64,
    pub histogram: f64,
}

/// MACD indicator.
///
/// - MACD Line = EMA(12) - EMA(26)
/// - Signal Line = EMA(9) of MACD Line
/// - Histogram = MACD Line - Signal Line
pub struct Macd {
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
}

impl Default for Macd {
    fn default() -> Self {
        Self {
            fast_period: 12,
            slow_period: 26,
            signal_period: 9,
        }
    }
}

impl Macd {
    pub fn new(fast_period: usize, slow_period: usize, signal_period: usize) -> Self {
        Self {
            fast_period: fast_period.max(1),
            slow_period: slow_period.max(1),
            signal_period: signal_period.max(1),
        }
    }

    pub fn compute(&self, closes: &[f64]) -> Option<MacdOutput> {
        if closes.is_empty() {
            return None;
        }

        let fast = ema_series(closes, self.fast_period);
        let slow = ema_series(closes, self.slow_period);
        let macd_line: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
        let signal_line = ema_series(&macd_line, self.signal_period);

        let macd = *macd_line.last()?;
        let signal_line = *signal_line.last()?;
        Some(MacdOutput {
            macd,
            signal_line,
            histogram: macd - signal_line,
        })
    }

    fn classify(output: &MacdOutput) -> (IndicatorSignal, SignalStrength) {
        let signal = if output.macd > output.signal_line && output.histogram > 0.0 {
            IndicatorSignal::Buy
        } else if output.macd < output.signal_line && output.histogram < 0.0 {
            IndicatorSignal::Sell
        } else {
            IndicatorSignal::Neutral
        };

        let hist = output.histogram.abs();
        let macd = output.macd.abs();
        let strength = if signal == IndicatorSignal::Neutral {
            SignalStrength::Weak
        } else if hist > macd * 0.10 {
            SignalStrength::Strong
        } else if hist > macd * 0.05 {
            SignalStrength::Moderate
        } else {
            SignalStrength::Weak
        };

        (signal, strength)
    }
}

impl Indicator for Macd {
    fn kind(&self) -> IndicatorKind {
        IndicatorKind::Macd
    }

    fn min_periods(&self) -> usize {
        self.slow_period
    }

    fn calculate(&self, window: &[PricePoint]) -> Option<IndicatorReading> {
        let output = self.compute(&closes(window))?;
        let (signal, strength) = Self::classify(&output);
        Some(IndicatorReading::new(
            self.kind(),
            output.histogram,
            signal,
            strength,
        ))
    }
}
