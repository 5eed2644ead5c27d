//! Bollinger Bands indicator.

use crate::services::signals::Indicator;
use crate::types::{IndicatorKind, IndicatorReading, IndicatorSignal, PricePoint, SignalStrength};

/// Relative band width below which the bands count as collapsed.
const COLLAPSE_EPSILON: f64 = 1e-12;

/// Band values for the latest window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerOutput {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    /// Price position within the bands, clamped to [0, 1].
    pub position: f64,
}

/// Bollinger Bands indicator.
///
/// Consists of:
/// - Middle band: SMA(20)
/// - Upper band: SMA + 2 * StdDev
/// - Lower band: SMA - 2 * StdDev
///
/// Signals:
/// - Price near lower band = oversold
/// - Price near upper band = overbought
///
/// When the bands collapse (zero variance) the position reads 0.5.
pub struct BollingerBands {
    period: usize,
    std_dev_multiplier: f64,
}

impl Default for BollingerBands {
    fn default() -> Self {
        Self {
            period: 20,
            std_dev_multiplier: 2.0,
        }
    }
}

impl BollingerBands {
    pub fn new(period: usize, std_dev_multiplier: f64) -> Self {
        Self {
            period: period.max(1),
            std_dev_multiplier,
        }
    }

    /// Population standard deviation.
    fn std_dev(values: &[f64], mean: f64) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        let variance: f64 =
            values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
        variance.sqrt()
    }

    pub fn compute(&self, window: &[PricePoint]) -> Option<BollingerOutput> {
        if window.len() < self.period {
            return None;
        }

        let closes: Vec<f64> = window[window.len() - self.period..]
            .iter()
            .map(|p| p.close)
            .collect();
        let first = closes[0];
        let flat = closes.iter().all(|c| *c == first);
        let middle = if flat {
            first
        } else {
            closes.iter().sum::<f64>() / self.period as f64
        };
        let mut band_width = Self::std_dev(&closes, middle) * self.std_dev_multiplier;
        // Rounding in the mean leaves a residue of a few ulps on flat series.
        if flat || band_width <= middle.abs() * COLLAPSE_EPSILON {
            band_width = 0.0;
        }
        let upper = middle + band_width;
        let lower = middle - band_width;
        let price = window.last()?.close;

        let position = if upper > lower {
            ((price - lower) / (upper - lower)).clamp(0.0, 1.0)
        } else {
            0.5
        };

        Some(BollingerOutput {
            upper,
            middle,
            lower,
            position,
        })
    }

    fn classify(position: f64) -> (IndicatorSignal, SignalStrength) {
        let extremity = (position - 0.5).abs();
        let strength = if extremity >= 0.45 {
            SignalStrength::Strong
        } else if extremity >= 0.40 {
            SignalStrength::Moderate
        } else {
            SignalStrength::Weak
        };

        if position >= 0.8 {
            (IndicatorSignal::Overbought, strength)
        } else if position <= 0.2 {
            (IndicatorSignal::Oversold, strength)
        } else {
            (IndicatorSignal::Neutral, SignalStrength::Weak)
        }
    }
}

impl Indicator for BollingerBands {
    fn kind(&self) -> IndicatorKind {
        IndicatorKind::Bollinger
    }

    fn min_periods(&self) -> usize {
        self.period
    }

    fn calculate(&self, window: &[PricePoint]) -> Option<IndicatorReading> {
        let output = self.compute(window)?;
        let (signal, strength) = Self::classify(output.position);
        Some(IndicatorReading::new(
            self.kind(),
            output.position,
            signal,
            strength,
        ))
    }

    fn default_reading(&self, _window: &[PricePoint]) -> IndicatorReading {
        IndicatorReading::neutral(self.kind(), 0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(closes: &[f64]) -> Vec<PricePoint> {
        closes
            .iter()
            .enumerate()
            .map(|(i, c)| PricePoint::flat(i as i64 * 60, *c, 1000.0))
            .collect()
    }

    #[test]
    fn test_zero_variance_position_defaults_to_half() {
        let output = BollingerBands::default().compute(&series(&[42.0; 30])).unwrap();
        assert_eq!(output.upper, output.lower);
        assert_eq!(output.position, 0.5);

        let reading = BollingerBands::default().evaluate(&series(&[42.0; 30]));
        assert_eq!(reading.value, 0.5);
        assert_eq!(reading.signal, IndicatorSignal::Neutral);
    }

    #[test]
    fn test_inexact_constants_collapse_bands() {
        for price in [0.1, 0.3, 1.1, 3_000.7, 64_123.37] {
            let output = BollingerBands::default()
                .compute(&series(&[price; 30]))
                .unwrap();
            assert_eq!(output.upper, output.lower, "price {}", price);
            assert_eq!(output.middle, price);
            assert_eq!(output.position, 0.5, "price {}", price);
        }

        for k in 0..2_000 {
            let price = k as f64 * 0.01 + 0.003;
            let output = BollingerBands::default()
                .compute(&series(&[price; 20]))
                .unwrap();
            assert_eq!(output.position, 0.5, "price {}", price);
        }
    }

    #[test]
    fn test_uptrend_near_upper_band() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let output = BollingerBands::default().compute(&series(&closes)).unwrap();
        assert!(output.position > 0.8 && output.position <= 1.0);
        assert!((output.middle - 119.5).abs() < 1e-9);

        let reading = BollingerBands::default().evaluate(&series(&closes));
        assert_eq!(reading.signal, IndicatorSignal::Overbought);
    }

    #[test]
    fn test_spike_below_band_clamps_to_zero() {
        let mut closes = vec![100.0; 19];
        closes.push(50.0);
        let output = BollingerBands::default().compute(&series(&closes)).unwrap();
        assert!(output.position >= 0.0);
        assert!(output.position < 0.2);

        let reading = BollingerBands::default().evaluate(&series(&closes));
        assert_eq!(reading.signal, IndicatorSignal::Oversold);
    }

    #[test]
    fn test_insufficient_history_is_neutral() {
        let reading = BollingerBands::default().evaluate(&series(&[1.0, 2.0, 3.0]));
        assert_eq!(reading.value, 0.5);
        assert_eq!(reading.signal, IndicatorSignal::Neutral);
    }
}
