//! Trading signals service module.
//!
//! Provides technical indicator calculations, market regime detection,
//! adaptive indicator weighting, confluence scoring, and the scheduled
//! calculation pass that keeps the signal cache fresh.

pub mod confluence;
pub mod indicators;
pub mod regime;
pub mod scheduler;
pub mod store;
pub mod weights;

pub use confluence::{ConfluenceEngine, ConfluenceInput, TradeLevels};
pub use indicators::IndicatorSet;
pub use regime::{RegimeDetector, RegimeInputs, RegimeService};
pub use scheduler::{consume_records, SchedulerState, SignalScheduler, TickOutcome, TickReport};
pub use store::SignalStore;
pub use weights::{AdaptiveWeightManager, WeightSnapshot};

use crate::types::{IndicatorKind, IndicatorReading, PricePoint, SignalStrength};

/// Trait for implementing technical indicators.
pub trait Indicator: Send + Sync {
    /// Which registry slot this indicator fills.
    fn kind(&self) -> IndicatorKind;

    /// Minimum number of points required for calculation.
    fn min_periods(&self) -> usize;

    /// Calculate the reading from an oldest-first window.
    /// Returns None if the window is too short or degenerate.
    fn calculate(&self, window: &[PricePoint]) -> Option<IndicatorReading>;

    /// Documented neutral reading returned when `calculate` yields nothing.
    fn default_reading(&self, _window: &[PricePoint]) -> IndicatorReading {
        IndicatorReading::neutral(self.kind(), 0.0)
    }

    /// Calculate, falling back to the neutral default. Never fails.
    fn evaluate(&self, window: &[PricePoint]) -> IndicatorReading {
        if window.len() < self.min_periods() {
            return self.default_reading(window);
        }
        self.calculate(window)
            .filter(|r| r.value.is_finite())
            .unwrap_or_else(|| self.default_reading(window))
    }
}

/// Closing prices of a window.
pub fn closes(window: &[PricePoint]) -> Vec<f64> {
    window.iter().map(|p| p.close).collect()
}

/// Strength from an absolute percentage deviation (2% strong, 0.5% moderate).
pub fn strength_from_pct(pct: f64) -> SignalStrength {
    let pct = pct.abs();
    if pct >= 2.0 {
        SignalStrength::Strong
    } else if pct >= 0.5 {
        SignalStrength::Moderate
    } else {
        SignalStrength::Weak
    }
}
