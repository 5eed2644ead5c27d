//! Exponential Moving Average (EMA) indicator.

use crate::services::signals::{closes, strength_from_pct, Indicator};
use crate::types::{IndicatorKind, IndicatorReading, IndicatorSignal, PricePoint};

/// EMA series seeded with the first value.
///
/// `ema[0] = values[0]`, then `ema[i] = values[i] * k + ema[i-1] * (1 - k)`
/// with `k = 2 / (period + 1)`.
pub fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    let Some(&first) = values.first() else {
        return Vec::new();
    };
    let multiplier = 2.0 / (period.max(1) as f64 + 1.0);

    let mut ema = Vec::with_capacity(values.len());
    ema.push(first);
    for value in &values[1..] {
        let prev = ema[ema.len() - 1];
        ema.push(value * multiplier + prev * (1.0 - multiplier));
    }
    ema
}

/// EMA (Exponential Moving Average) indicator.
///
/// Trend-following convention: price above the EMA is bullish (BUY),
/// price below is bearish (SELL).
pub struct Ema {
    period: usize,
}

impl Default for Ema {
    fn default() -> Self {
        Self { period: 20 }
    }
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
        }
    }
}

impl Indicator for Ema {
    fn kind(&self) -> IndicatorKind {
        IndicatorKind::Ema
    }

    fn min_periods(&self) -> usize {
        self.period
    }

    fn calculate(&self, window: &[PricePoint]) -> Option<IndicatorReading> {
        let ema = *ema_series(&closes(window), self.period).last()?;
        let current_price = window.last()?.close;
        if ema == 0.0 {
            return None;
        }

        let pct_diff = (current_price - ema) / ema * 100.0;
        let signal = if pct_diff > 0.0 {
            IndicatorSignal::Buy
        } else if pct_diff < 0.0 {
            IndicatorSignal::Sell
        } else {
            IndicatorSignal::Neutral
        };

        Some(IndicatorReading::new(
            self.kind(),
            ema,
            signal,
            strength_from_pct(pct_diff),
        ))
    }

    fn default_reading(&self, window: &[PricePoint]) -> IndicatorReading {
        IndicatorReading::neutral(self.kind(), window.last().map(|p| p.close).unwrap_or(0.0))
    }
}
