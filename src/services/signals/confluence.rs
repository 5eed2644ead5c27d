//! Confluence analysis.
//!
//! Fuses indicator consensus, chart patterns, volume, the market regime and
//! tracked indicator accuracy into one score in [-100, 100] and derives a
//! direction, a confidence and entry/exit levels from it.

use super::indicators::Vwap;
use super::weights::WeightSnapshot;
use crate::config::ConfluenceConfig;
use crate::types::{
    ComponentBreakdown, ConfluenceResult, Direction, IndicatorKind, IndicatorSnapshot,
    MarketRegime, PatternSignal, PricePoint, Timeframe,
};

pub const INDICATOR_CONSENSUS_WEIGHT: f64 = 0.35;
pub const PATTERN_STRENGTH_WEIGHT: f64 = 0.25;
pub const VOLUME_CONFIRMATION_WEIGHT: f64 = 0.20;
pub const REGIME_ALIGNMENT_WEIGHT: f64 = 0.12;
pub const HISTORICAL_ACCURACY_WEIGHT: f64 = 0.08;

pub const CONFIDENCE_FLOOR: f64 = 25.0;
pub const CONFIDENCE_CEILING: f64 = 95.0;

/// Weighted contribution (in score points) a factor needs to be reported.
pub const MATERIAL_CONTRIBUTION: f64 = 2.0;

/// Volume factor applied when the latest volume is below its average.
const THIN_VOLUME_FACTOR: f64 = 0.5;

/// Longest allowed take-profit distance for shorts, in percent.
const MAX_SHORT_TARGET_PCT: f64 = 95.0;

/// Everything the engine reads for one (symbol, timeframe).
pub struct ConfluenceInput<'a> {
    pub window: &'a [PricePoint],
    pub snapshot: &'a IndicatorSnapshot,
    pub weights: &'a WeightSnapshot,
    pub regime: &'a MarketRegime,
    pub patterns: &'a [PatternSignal],
}

/// Stop-loss and take-profit derived from an entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeLevels {
    pub stop_loss: f64,
    pub take_profit: f64,
    pub stop_pct: f64,
    pub target_pct: f64,
}

pub struct ConfluenceEngine {
    config: ConfluenceConfig,
}

impl Default for ConfluenceEngine {
    fn default() -> Self {
        Self::new(ConfluenceConfig::default())
    }
}

impl ConfluenceEngine {
    pub fn new(config: ConfluenceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConfluenceConfig {
        &self.config
    }

    /// Weight- and regime-scaled mean of indicator votes.
    fn indicator_consensus(input: &ConfluenceInput) -> f64 {
        let multipliers = &input.regime.regime_multipliers;
        let (weighted, total) = input.snapshot.iter().fold((0.0, 0.0), |(sum, total), r| {
            let w = input.weights.weights.get(r.kind) * multipliers.get(r.kind.category());
            (sum + w * r.vote(), total + w)
        });
        if total > 0.0 {
            weighted / total * 100.0
        } else {
            0.0
        }
    }

    /// Mean signed pattern confidence.
    fn pattern_strength(patterns: &[PatternSignal]) -> f64 {
        if patterns.is_empty() {
            return 0.0;
        }
        let sum: f64 = patterns
            .iter()
            .map(|p| p.direction.sign() * p.confidence.clamp(0.0, 100.0))
            .sum();
        sum / patterns.len() as f64
    }

    /// VWAP side, damped when volume is not expanding.
    fn volume_confirmation(input: &ConfluenceInput) -> (f64, bool) {
        let Some(vwap) = input.snapshot.get(IndicatorKind::Vwap) else {
            return (0.0, false);
        };
        let expanding = Vwap::volume_expanding(input.window, Vwap::DEFAULT_PERIOD);
        let factor = if expanding { 1.0 } else { THIN_VOLUME_FACTOR };
        (vwap.vote() * 100.0 * factor, expanding)
    }

    /// Regime confidence, signed toward the regime's favored direction.
    fn regime_alignment(regime: &MarketRegime, candidate: Direction) -> f64 {
        match (regime.regime_type.favored_direction(), candidate) {
            (_, Direction::Neutral) | (None, _) => 0.0,
            (Some(favored), candidate) => {
                let agreement = if favored == candidate { 1.0 } else { -1.0 };
                agreement * candidate.sign() * regime.confidence.clamp(0.0, 100.0)
            }
        }
    }

    /// Edge of the indicators agreeing with the candidate, signed by it.
    fn historical_accuracy(input: &ConfluenceInput, candidate: Direction) -> f64 {
        let rates: Vec<f64> = input
            .snapshot
            .agreeing_with(candidate)
            .into_iter()
            .filter_map(|kind| input.weights.success_rate(kind))
            .collect();
        if rates.is_empty() {
            return 0.0;
        }
        let edge = rates.iter().map(|r| (r - 0.5) * 200.0).sum::<f64>() / rates.len() as f64;
        edge * candidate.sign()
    }

    pub fn analyze(&self, input: &ConfluenceInput) -> ConfluenceResult {
        let consensus = Self::indicator_consensus(input);
        let pattern = Self::pattern_strength(input.patterns);
        let (volume, expanding) = Self::volume_confirmation(input);

        let candidate = Direction::from_sign(
            consensus * INDICATOR_CONSENSUS_WEIGHT
                + pattern * PATTERN_STRENGTH_WEIGHT
                + volume * VOLUME_CONFIRMATION_WEIGHT,
        );
        let regime = Self::regime_alignment(input.regime, candidate);
        let historical = Self::historical_accuracy(input, candidate);

        let breakdown = ComponentBreakdown {
            indicator_consensus: consensus,
            pattern_strength: pattern,
            volume_confirmation: volume,
            regime_alignment: regime,
            historical_accuracy: historical,
        };

        let raw = consensus * INDICATOR_CONSENSUS_WEIGHT
            + pattern * PATTERN_STRENGTH_WEIGHT
            + volume * VOLUME_CONFIRMATION_WEIGHT
            + regime * REGIME_ALIGNMENT_WEIGHT
            + historical * HISTORICAL_ACCURACY_WEIGHT;
        let raw_score = if raw.is_finite() {
            raw.clamp(-100.0, 100.0)
        } else {
            0.0
        };

        let threshold = self.config.direction_threshold;
        let direction = if raw_score > threshold {
            Direction::Long
        } else if raw_score < -threshold {
            Direction::Short
        } else {
            Direction::Neutral
        };
        let confidence = Self::confidence(raw_score);

        let reasoning = self.reasoning(input, &breakdown, candidate, expanding, raw_score, direction);

        ConfluenceResult {
            direction,
            raw_score,
            confidence,
            breakdown,
            reasoning,
        }
    }

    /// Confidence from score magnitude, bounded to [25, 95].
    ///
    /// Uses `50 + |raw|` rather than `50 + raw`, so a SHORT scored -60 is as
    /// confident as a LONG scored +60. With the signed form every SHORT would
    /// sit near the 25 floor.
    pub fn confidence(raw_score: f64) -> f64 {
        (50.0 + raw_score.abs()).clamp(CONFIDENCE_FLOOR, CONFIDENCE_CEILING)
    }

    fn reasoning(
        &self,
        input: &ConfluenceInput,
        breakdown: &ComponentBreakdown,
        candidate: Direction,
        expanding: bool,
        raw_score: f64,
        direction: Direction,
    ) -> Vec<String> {
        let material = |score: f64, weight: f64| (score * weight).abs() >= MATERIAL_CONTRIBUTION;
        let mut lines = Vec::new();

        if material(breakdown.indicator_consensus, INDICATOR_CONSENSUS_WEIGHT) {
            let side = Direction::from_sign(breakdown.indicator_consensus);
            let agreeing: Vec<&str> = input
                .snapshot
                .agreeing_with(side)
                .into_iter()
                .map(|k| k.name())
                .collect();
            lines.push(format!(
                "Indicator consensus {} ({:+.1}): {} agree",
                bias_word(breakdown.indicator_consensus),
                breakdown.indicator_consensus,
                agreeing.join(", ")
            ));
        }

        if material(breakdown.pattern_strength, PATTERN_STRENGTH_WEIGHT) {
            let names: Vec<&str> = input.patterns.iter().map(|p| p.pattern_type.as_str()).collect();
            lines.push(format!(
                "Chart patterns {} ({:+.1}): {}",
                bias_word(breakdown.pattern_strength),
                breakdown.pattern_strength,
                names.join(", ")
            ));
        }

        if material(breakdown.volume_confirmation, VOLUME_CONFIRMATION_WEIGHT) {
            let side = if breakdown.volume_confirmation > 0.0 { "above" } else { "below" };
            let volume = if expanding { "expanding" } else { "thin" };
            lines.push(format!(
                "Price {} VWAP on {} volume ({:+.1})",
                side, volume, breakdown.volume_confirmation
            ));
        }

        if material(breakdown.regime_alignment, REGIME_ALIGNMENT_WEIGHT) {
            let verb = if breakdown.regime_alignment * candidate.sign() > 0.0 {
                "supports"
            } else {
                "opposes"
            };
            lines.push(format!(
                "{} regime ({:.0}% confidence) {} {} bias",
                capitalize(input.regime.regime_type.label()),
                input.regime.confidence,
                verb,
                candidate.label()
            ));
        }

        if material(breakdown.historical_accuracy, HISTORICAL_ACCURACY_WEIGHT) {
            let verb = if breakdown.historical_accuracy * candidate.sign() > 0.0 {
                "reinforces"
            } else {
                "undercuts"
            };
            lines.push(format!(
                "Historical accuracy of agreeing indicators {} {} ({:+.1})",
                verb,
                candidate.label(),
                breakdown.historical_accuracy
            ));
        }

        if lines.is_empty() {
            lines.push("No factor moved the score materially".to_string());
        }

        lines.push(format!(
            "Score {:+.1} vs threshold {:.1}: {}",
            raw_score,
            self.config.direction_threshold,
            direction.label()
        ));
        lines
    }

    /// Stop and target for `direction`. None for NEUTRAL or a bad entry.
    pub fn trade_levels(
        &self,
        entry: f64,
        direction: Direction,
        change_24h: f64,
        timeframe: Timeframe,
    ) -> Option<TradeLevels> {
        if !entry.is_finite() || entry <= 0.0 {
            return None;
        }
        let cfg = &self.config;
        let change = if change_24h.is_finite() { change_24h.abs() } else { 0.0 };
        let stop_pct = (cfg.stop_floor_pct.max(change * cfg.risk_factor)
            * timeframe.volatility_multiplier())
        .min(cfg.max_stop_pct);
        let target_pct = stop_pct * cfg.risk_reward_ratio;

        match direction {
            Direction::Long => Some(TradeLevels {
                stop_loss: entry * (1.0 - stop_pct / 100.0),
                take_profit: entry * (1.0 + target_pct / 100.0),
                stop_pct,
                target_pct,
            }),
            Direction::Short => {
                let target_pct = target_pct.min(MAX_SHORT_TARGET_PCT);
                Some(TradeLevels {
                    stop_loss: entry * (1.0 + stop_pct / 100.0),
                    take_profit: entry * (1.0 - target_pct / 100.0),
                    stop_pct,
                    target_pct,
                })
            }
            Direction::Neutral => None,
        }
    }
}

fn bias_word(score: f64) -> &'static str {
    if score > 0.0 {
        "bullish"
    } else if score < 0.0 {
        "bearish"
    } else {
        "flat"
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
