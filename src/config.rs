use std::env;
use std::time::Duration;

use crate::types::Timeframe;

/// How price history is sourced for indicator windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryPolicy {
    /// Only genuine recorded buckets are used. A pair becomes eligible once
    /// `min_points` buckets have accumulated.
    Genuine { min_points: usize },
    /// Short history is replaced by a deterministic window synthesized from
    /// the current price and 24h change. This is an approximation.
    Synthetic { window: usize },
}

impl HistoryPolicy {
    /// Parse from the `HISTORY_POLICY` value.
    pub fn from_str(s: &str, points: usize) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "genuine" => Some(Self::Genuine { min_points: points }),
            "synthetic" => Some(Self::Synthetic { window: points }),
            _ => None,
        }
    }
}

/// Price history store configuration.
#[derive(Debug, Clone)]
pub struct HistoryConfig {
    pub policy: HistoryPolicy,
    /// Maximum buckets retained per (symbol, timeframe).
    pub max_points: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            policy: HistoryPolicy::Genuine { min_points: 30 },
            max_points: 200,
        }
    }
}

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Symbols tracked every tick.
    pub symbols: Vec<String>,
    /// Timeframes tracked for every symbol.
    pub timeframes: Vec<Timeframe>,
    /// Fixed interval between calculation passes.
    pub interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            symbols: vec!["BTC".to_string(), "ETH".to_string(), "SOL".to_string()],
            timeframes: vec![Timeframe::OneHour, Timeframe::FourHours, Timeframe::OneDay],
            interval: Duration::from_secs(240),
        }
    }
}

/// Market regime detector configuration.
#[derive(Debug, Clone)]
pub struct RegimeConfig {
    /// Regime refresh cadence, independent of the signal cadence.
    pub ttl: Duration,
    /// Symbol whose regime drives adaptive weight updates.
    pub reference_symbol: String,
    /// Normalized volatility (ATR % of price) above which the market is HIGH_VOLATILITY.
    pub high_volatility_pct: f64,
    /// Normalized volatility below which the market is LOW_VOLATILITY.
    pub low_volatility_pct: f64,
    /// Minimum fraction of periods agreeing with the dominant sign for a trend.
    pub trend_consistency: f64,
    /// Minimum absolute mean return (percent) for a trend.
    pub trend_magnitude_pct: f64,
    /// ATR period used for the volatility estimate.
    pub atr_period: usize,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(900),
            reference_symbol: "BTC".to_string(),
            high_volatility_pct: 5.0,
            low_volatility_pct: 0.3,
            trend_consistency: 0.75,
            trend_magnitude_pct: 1.0,
            atr_period: 14,
        }
    }
}

/// Adaptive weight manager configuration.
#[derive(Debug, Clone)]
pub struct WeightConfig {
    pub min_weight: f64,
    pub max_weight: f64,
    /// Step applied per unit of (success rate - 0.5).
    pub learning_rate: f64,
    /// Resolved records retained before the oldest are discarded.
    pub lookback: usize,
    /// Resolved samples an indicator needs before its weight moves.
    pub min_samples: usize,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            min_weight: 0.05,
            max_weight: 0.40,
            learning_rate: 0.10,
            lookback: 100,
            min_samples: 5,
        }
    }
}

/// Confluence engine configuration.
#[derive(Debug, Clone)]
pub struct ConfluenceConfig {
    /// |rawScore| above which a direction is taken.
    pub direction_threshold: f64,
    /// Minimum stop distance in percent.
    pub stop_floor_pct: f64,
    /// Fraction of |24h change| used as stop distance.
    pub risk_factor: f64,
    pub risk_reward_ratio: f64,
    /// Upper bound on stop distance in percent.
    pub max_stop_pct: f64,
}

impl Default for ConfluenceConfig {
    fn default() -> Self {
        Self {
            direction_threshold: 15.0,
            stop_floor_pct: 1.0,
            risk_factor: 0.5,
            risk_reward_ratio: 2.0,
            max_stop_pct: 25.0,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub scheduler: SchedulerConfig,
    pub history: HistoryConfig,
    pub regime: RegimeConfig,
    pub weights: WeightConfig,
    pub confluence: ConfluenceConfig,
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl Config {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let symbols = env::var("TRACKED_SYMBOLS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|sym| sym.trim().to_uppercase())
                    .filter(|sym| !sym.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.scheduler.symbols);

        let timeframes = env::var("TRACKED_TIMEFRAMES")
            .ok()
            .map(|s| s.split(',').filter_map(Timeframe::from_str).collect::<Vec<_>>())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.scheduler.timeframes);

        let history_points = parse_env("HISTORY_MIN_POINTS").unwrap_or(30);
        let policy = env::var("HISTORY_POLICY")
            .ok()
            .and_then(|p| HistoryPolicy::from_str(&p, history_points))
            .unwrap_or(HistoryPolicy::Genuine {
                min_points: history_points,
            });

        Self {
            scheduler: SchedulerConfig {
                symbols,
                timeframes,
                interval: parse_env("SIGNAL_INTERVAL_SECS")
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.scheduler.interval),
            },
            history: HistoryConfig {
                policy,
                max_points: parse_env("HISTORY_MAX_POINTS").unwrap_or(defaults.history.max_points),
            },
            regime: RegimeConfig {
                ttl: parse_env("REGIME_TTL_SECS")
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.regime.ttl),
                reference_symbol: env::var("REGIME_REFERENCE_SYMBOL")
                    .map(|s| s.trim().to_uppercase())
                    .unwrap_or(defaults.regime.reference_symbol),
                ..defaults.regime
            },
            weights: WeightConfig {
                min_weight: parse_env("WEIGHT_MIN").unwrap_or(defaults.weights.min_weight),
                max_weight: parse_env("WEIGHT_MAX").unwrap_or(defaults.weights.max_weight),
                learning_rate: parse_env("WEIGHT_LEARNING_RATE")
                    .unwrap_or(defaults.weights.learning_rate),
                lookback: parse_env("WEIGHT_LOOKBACK").unwrap_or(defaults.weights.lookback),
                min_samples: parse_env("WEIGHT_MIN_SAMPLES")
                    .unwrap_or(defaults.weights.min_samples),
            },
            confluence: ConfluenceConfig {
                direction_threshold: parse_env("DIRECTION_THRESHOLD")
                    .unwrap_or(defaults.confluence.direction_threshold),
                risk_reward_ratio: parse_env("RISK_REWARD_RATIO")
                    .unwrap_or(defaults.confluence.risk_reward_ratio),
                ..defaults.confluence
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_policy_from_str() {
        assert_eq!(
            HistoryPolicy::from_str("genuine", 40),
            Some(HistoryPolicy::Genuine { min_points: 40 })
        );
        assert_eq!(
            HistoryPolicy::from_str("Synthetic", 50),
            Some(HistoryPolicy::Synthetic { window: 50 })
        );
        assert_eq!(HistoryPolicy::from_str("random", 50), None);
    }

    #[test]
    fn test_default_history_policy_is_genuine() {
        let config = Config::default();
        assert!(matches!(
            config.history.policy,
            HistoryPolicy::Genuine { .. }
        ));
    }

    #[test]
    fn test_weight_bounds_are_feasible() {
        let config = WeightConfig::default();
        let n = crate::types::IndicatorKind::ALL.len() as f64;
        assert!(config.min_weight * n <= 1.0);
        assert!(config.max_weight * n >= 1.0);
    }

    #[test]
    fn test_weight_config_from_env() {
        env::set_var("WEIGHT_MIN", "0.02");
        env::set_var("WEIGHT_LOOKBACK", "250");
        env::set_var("WEIGHT_MIN_SAMPLES", "not-a-number");
        let config = Config::from_env();
        env::remove_var("WEIGHT_MIN");
        env::remove_var("WEIGHT_LOOKBACK");
        env::remove_var("WEIGHT_MIN_SAMPLES");

        let defaults = WeightConfig::default();
        assert_eq!(config.weights.min_weight, 0.02);
        assert_eq!(config.weights.lookback, 250);
        assert_eq!(config.weights.min_samples, defaults.min_samples);
        assert_eq!(config.weights.max_weight, defaults.max_weight);
    }

    #[test]
    fn test_confluence_defaults() {
        let config = ConfluenceConfig::default();
        assert_eq!(config.risk_reward_ratio, 2.0);
        assert!(config.direction_threshold > 0.0);
        assert!(config.stop_floor_pct > 0.0);
    }

    #[test]
    fn test_scheduler_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.interval, Duration::from_secs(240));
        assert!(!config.symbols.is_empty());
        assert!(!config.timeframes.is_empty());
    }
}
