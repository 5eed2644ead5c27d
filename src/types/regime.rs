use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Direction, IndicatorCategory};

/// Coarse classification of current price action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegimeType {
    BullTrend,
    BearTrend,
    Sideways,
    HighVolatility,
    LowVolatility,
}

impl RegimeType {
    /// Direction this regime favors, if any.
    pub fn favored_direction(&self) -> Option<Direction> {
        match self {
            RegimeType::BullTrend => Some(Direction::Long),
            RegimeType::BearTrend => Some(Direction::Short),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RegimeType::BullTrend => "bull trend",
            RegimeType::BearTrend => "bear trend",
            RegimeType::Sideways => "sideways",
            RegimeType::HighVolatility => "high volatility",
            RegimeType::LowVolatility => "low volatility",
        }
    }

    /// Per-category multipliers applied to indicator weights in this regime.
    pub fn multipliers(&self) -> CategoryMultipliers {
        use IndicatorCategory::*;
        let table: [(IndicatorCategory, f64); 4] = match self {
            RegimeType::BullTrend | RegimeType::BearTrend => {
                [(Trend, 1.3), (Momentum, 0.8), (Volatility, 0.8), (Volume, 1.1)]
            }
            RegimeType::Sideways => {
                [(Trend, 0.7), (Momentum, 1.3), (Volatility, 1.2), (Volume, 1.0)]
            }
            RegimeType::HighVolatility => {
                [(Trend, 0.9), (Momentum, 0.9), (Volatility, 1.3), (Volume, 1.2)]
            }
            RegimeType::LowVolatility => {
                [(Trend, 1.0), (Momentum, 1.1), (Volatility, 0.8), (Volume, 0.9)]
            }
        };
        CategoryMultipliers(table.into_iter().collect())
    }
}

/// Indicator-category to weight multiplier table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryMultipliers(BTreeMap<IndicatorCategory, f64>);

impl CategoryMultipliers {
    /// All categories at 1.0.
    pub fn neutral() -> Self {
        Self(IndicatorCategory::ALL.into_iter().map(|c| (c, 1.0)).collect())
    }

    pub fn get(&self, category: IndicatorCategory) -> f64 {
        self.0.get(&category).copied().unwrap_or(1.0)
    }
}

impl Default for CategoryMultipliers {
    fn default() -> Self {
        Self::neutral()
    }
}

/// Current market regime for one reference series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketRegime {
    pub regime_type: RegimeType,
    /// Confidence in percent (0-100).
    pub confidence: f64,
    /// Signed mean of the multi-period returns (percent).
    pub trend_strength: f64,
    /// Fraction of periods agreeing with the dominant sign (0-1).
    pub trend_consistency: f64,
    /// Normalized volatility (ATR as percent of price).
    pub volatility_level: f64,
    pub regime_multipliers: CategoryMultipliers,
    /// Unix timestamp (milliseconds) when detected.
    pub detected_at: i64,
}

impl MarketRegime {
    /// Regime reported before any detection has succeeded.
    pub fn unknown() -> Self {
        Self {
            regime_type: RegimeType::Sideways,
            confidence: 0.0,
            trend_strength: 0.0,
            trend_consistency: 0.0,
            volatility_level: 0.0,
            regime_multipliers: CategoryMultipliers::neutral(),
            detected_at: 0,
        }
    }
}
