use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::Timeframe;

/// Category of a technical indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorCategory {
    Trend,
    Momentum,
    Volatility,
    Volume,
}

impl IndicatorCategory {
    pub const ALL: [IndicatorCategory; 4] = [
        IndicatorCategory::Trend,
        IndicatorCategory::Momentum,
        IndicatorCategory::Volatility,
        IndicatorCategory::Volume,
    ];

    /// Get display name for this category.
    pub fn name(&self) -> &'static str {
        match self {
            IndicatorCategory::Trend => "Trend",
            IndicatorCategory::Momentum => "Momentum",
            IndicatorCategory::Volatility => "Volatility",
            IndicatorCategory::Volume => "Volume",
        }
    }
}

/// Indicators that take part in confluence scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    Rsi,
    Ema,
    Macd,
    Adx,
    Bollinger,
    Vwap,
}

impl IndicatorKind {
    pub const ALL: [IndicatorKind; 6] = [
        IndicatorKind::Rsi,
        IndicatorKind::Ema,
        IndicatorKind::Macd,
        IndicatorKind::Adx,
        IndicatorKind::Bollinger,
        IndicatorKind::Vwap,
    ];

    /// Stable identifier.
    pub fn id(&self) -> &'static str {
        match self {
            IndicatorKind::Rsi => "rsi",
            IndicatorKind::Ema => "ema",
            IndicatorKind::Macd => "macd",
            IndicatorKind::Adx => "adx",
            IndicatorKind::Bollinger => "bollinger",
            IndicatorKind::Vwap => "vwap",
        }
    }

    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            IndicatorKind::Rsi => "RSI",
            IndicatorKind::Ema => "EMA",
            IndicatorKind::Macd => "MACD",
            IndicatorKind::Adx => "ADX",
            IndicatorKind::Bollinger => "Bollinger Bands",
            IndicatorKind::Vwap => "VWAP",
        }
    }

    pub fn category(&self) -> IndicatorCategory {
        match self {
            IndicatorKind::Ema | IndicatorKind::Macd | IndicatorKind::Adx => {
                IndicatorCategory::Trend
            }
            IndicatorKind::Rsi => IndicatorCategory::Momentum,
            IndicatorKind::Bollinger => IndicatorCategory::Volatility,
            IndicatorKind::Vwap => IndicatorCategory::Volume,
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        IndicatorKind::ALL
            .into_iter()
            .find(|k| k.id().eq_ignore_ascii_case(s.trim()))
    }
}

impl std::fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Discrete signal emitted by a single indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndicatorSignal {
    Buy,
    Sell,
    Neutral,
    Overbought,
    Oversold,
}

impl IndicatorSignal {
    /// Directional vote: +1 bullish, -1 bearish, 0 none.
    ///
    /// Oscillator extremes are read as mean-reversion votes, so an
    /// oversold reading counts as bullish.
    pub fn bias(&self) -> f64 {
        match self {
            IndicatorSignal::Buy | IndicatorSignal::Oversold => 1.0,
            IndicatorSignal::Sell | IndicatorSignal::Overbought => -1.0,
            IndicatorSignal::Neutral => 0.0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            IndicatorSignal::Buy => "buy",
            IndicatorSignal::Sell => "sell",
            IndicatorSignal::Neutral => "neutral",
            IndicatorSignal::Overbought => "overbought",
            IndicatorSignal::Oversold => "oversold",
        }
    }
}

/// Strength of an indicator signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalStrength {
    Weak,
    Moderate,
    Strong,
}

impl SignalStrength {
    /// Magnitude factor used when weighting votes.
    pub fn factor(&self) -> f64 {
        match self {
            SignalStrength::Weak => 0.33,
            SignalStrength::Moderate => 0.66,
            SignalStrength::Strong => 1.0,
        }
    }
}

/// Output from a single indicator calculation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorReading {
    pub kind: IndicatorKind,
    /// Raw indicator value.
    pub value: f64,
    pub signal: IndicatorSignal,
    pub strength: SignalStrength,
}

impl IndicatorReading {
    pub fn new(
        kind: IndicatorKind,
        value: f64,
        signal: IndicatorSignal,
        strength: SignalStrength,
    ) -> Self {
        Self {
            kind,
            value,
            signal,
            strength,
        }
    }

    /// Neutral reading used when an indicator cannot be computed.
    pub fn neutral(kind: IndicatorKind, value: f64) -> Self {
        Self::new(kind, value, IndicatorSignal::Neutral, SignalStrength::Weak)
    }

    /// Signed vote scaled by strength, in [-1, 1].
    pub fn vote(&self) -> f64 {
        self.signal.bias() * self.strength.factor()
    }
}

/// All indicator readings for one window, keyed by kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    readings: BTreeMap<IndicatorKind, IndicatorReading>,
}

impl IndicatorSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, reading: IndicatorReading) {
        self.readings.insert(reading.kind, reading);
    }

    pub fn get(&self, kind: IndicatorKind) -> Option<&IndicatorReading> {
        self.readings.get(&kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndicatorReading> {
        self.readings.values()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Indicators whose vote points the same way as `direction`.
    pub fn agreeing_with(&self, direction: Direction) -> Vec<IndicatorKind> {
        let sign = direction.sign();
        if sign == 0.0 {
            return Vec::new();
        }
        self.readings
            .values()
            .filter(|r| r.signal.bias() * sign > 0.0)
            .map(|r| r.kind)
            .collect()
    }
}

/// Direction of a fused trading signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Long,
    Short,
    Neutral,
}

impl Direction {
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
            Direction::Neutral => 0.0,
        }
    }

    pub fn from_sign(value: f64) -> Self {
        if value > 0.0 {
            Direction::Long
        } else if value < 0.0 {
            Direction::Short
        } else {
            Direction::Neutral
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Direction::Long => "LONG",
            Direction::Short => "SHORT",
            Direction::Neutral => "NEUTRAL",
        }
    }
}

/// Chart pattern reported by the pattern recognition collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternSignal {
    pub pattern_type: String,
    pub direction: Direction,
    /// Confidence in percent (0-100).
    pub confidence: f64,
}

/// Sub-scores of a confluence result, each in [-100, 100] (positive = bullish).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentBreakdown {
    pub indicator_consensus: f64,
    pub pattern_strength: f64,
    pub volume_confirmation: f64,
    pub regime_alignment: f64,
    pub historical_accuracy: f64,
}

/// Fused result of the confluence engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfluenceResult {
    pub direction: Direction,
    /// Weighted score in [-100, 100].
    pub raw_score: f64,
    /// Always within [25, 95].
    pub confidence: f64,
    pub breakdown: ComponentBreakdown,
    /// One line per factor that materially moved the score.
    pub reasoning: Vec<String>,
}

/// A cached trading signal for one (symbol, timeframe).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub id: Uuid,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub direction: Direction,
    pub confidence: f64,
    pub raw_score: f64,
    pub entry_price: f64,
    /// Absent for NEUTRAL signals.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<f64>,
    /// Absent for NEUTRAL signals.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<f64>,
    /// Unix timestamp (milliseconds) when calculated.
    pub timestamp: i64,
    pub indicator_snapshot: IndicatorSnapshot,
    pub breakdown: ComponentBreakdown,
    pub reasoning: Vec<String>,
}

impl Signal {
    /// Cache key: "{SYMBOL}:{timeframe}".
    pub fn cache_key(symbol: &str, timeframe: Timeframe) -> String {
        format!("{}:{}", symbol.to_uppercase(), timeframe.as_str())
    }

    pub fn key(&self) -> String {
        Self::cache_key(&self.symbol, self.timeframe)
    }
}
