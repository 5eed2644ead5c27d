//! Technical indicator implementations.

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod vwap;

pub use adx::Adx;
pub use bollinger::BollingerBands;
pub use ema::Ema;
pub use macd::Macd;
pub use rsi::Rsi;
pub use vwap::Vwap;

use super::Indicator;
use crate::types::{IndicatorSnapshot, PricePoint};

/// Get all indicators that take part in confluence scoring.
pub fn all_indicators() -> Vec<Box<dyn Indicator>> {
    vec![
        // Trend indicators
        Box::new(Ema::default()),
        Box::new(Macd::default()),
        Box::new(Adx::default()),
        // Momentum indicators
        Box::new(Rsi::default()),
        // Volatility indicators
        Box::new(BollingerBands::default()),
        // Volume indicators
        Box::new(Vwap::default()),
    ]
}

/// Registry of indicators evaluated generically over a price window.
pub struct IndicatorSet {
    indicators: Vec<Box<dyn Indicator>>,
}

impl Default for IndicatorSet {
    fn default() -> Self {
        Self::new(all_indicators())
    }
}

impl IndicatorSet {
    pub fn new(indicators: Vec<Box<dyn Indicator>>) -> Self {
        Self { indicators }
    }

    /// Longest window any indicator needs.
    pub fn required_periods(&self) -> usize {
        self.indicators
            .iter()
            .map(|i| i.min_periods())
            .max()
            .unwrap_or(0)
    }

    /// Evaluate every indicator. Short windows yield neutral defaults.
    pub fn evaluate(&self, window: &[PricePoint]) -> IndicatorSnapshot {
        let mut snapshot = IndicatorSnapshot::new();
        for indicator in &self.indicators {
            snapshot.insert(indicator.evaluate(window));
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{IndicatorKind, IndicatorSignal};

    #[test]
    fn test_registry_covers_every_kind() {
        let snapshot = IndicatorSet::default().evaluate(&[]);
        assert_eq!(snapshot.len(), IndicatorKind::ALL.len());
        for kind in IndicatorKind::ALL {
            assert!(snapshot.get(kind).is_some(), "missing {}", kind);
        }
    }

    #[test]
    fn test_empty_window_is_all_neutral() {
        let snapshot = IndicatorSet::default().evaluate(&[]);
        assert!(snapshot
            .iter()
            .all(|r| r.signal == IndicatorSignal::Neutral));
        assert_eq!(snapshot.get(IndicatorKind::Rsi).unwrap().value, 50.0);
        assert_eq!(snapshot.get(IndicatorKind::Bollinger).unwrap().value, 0.5);
    }

    #[test]
    fn test_required_periods() {
        assert_eq!(IndicatorSet::default().required_periods(), 26);
    }
}
