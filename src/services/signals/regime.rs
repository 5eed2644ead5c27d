//! Market regime detection.
//!
//! Classifies the current market state from multi-period returns and a
//! normalized volatility estimate. Regimes are cached per symbol and
//! refreshed on their own TTL, independent of the signal cadence.

use super::indicators::atr::atr_percent;
use crate::config::RegimeConfig;
use crate::error::{Result, SignalError};
use crate::services::Cache;
use crate::types::{MarketRegime, PricePoint, RegimeType};
use tracing::{debug, warn};

/// Return lookbacks in bars. On the 1h series these are 1h, 4h, 24h and 7d.
pub const RETURN_LOOKBACKS: [usize; 4] = [1, 4, 24, 168];

/// Inputs to regime classification.
#[derive(Debug, Clone, PartialEq)]
pub struct RegimeInputs {
    /// Returns in percent, one per lookback period.
    pub returns: Vec<f64>,
    /// ATR as a percent of price.
    pub volatility: f64,
}

impl RegimeInputs {
    /// Derive inputs from an oldest-first window.
    ///
    /// Lookbacks longer than the window are clipped to the full window, so
    /// short windows still produce every period.
    pub fn from_window(window: &[PricePoint], atr_period: usize) -> Result<Self> {
        let need = atr_period + 1;
        if window.len() < need.max(2) {
            return Err(SignalError::InsufficientHistory {
                key: "regime".to_string(),
                have: window.len(),
                need: need.max(2),
            });
        }

        let last = window[window.len() - 1].close;
        let max_back = window.len() - 1;
        let returns = RETURN_LOOKBACKS
            .iter()
            .map(|&lb| {
                let base = window[window.len() - 1 - lb.min(max_back)].close;
                if base > 0.0 {
                    (last / base - 1.0) * 100.0
                } else {
                    0.0
                }
            })
            .collect();

        let volatility = atr_percent(window, atr_period).ok_or_else(|| {
            SignalError::calculation("regime", "volatility estimate unavailable")
        })?;

        Ok(Self {
            returns,
            volatility,
        })
    }
}

/// Stateless regime classifier.
#[derive(Debug, Clone)]
pub struct RegimeDetector {
    config: RegimeConfig,
}

impl RegimeDetector {
    pub fn new(config: RegimeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RegimeConfig {
        &self.config
    }

    /// Fraction of returns agreeing with the dominant sign.
    fn trend_consistency(returns: &[f64]) -> f64 {
        if returns.is_empty() {
            return 0.0;
        }
        let dominant = returns.iter().sum::<f64>().signum();
        let agreeing = returns
            .iter()
            .filter(|r| **r != 0.0 && r.signum() == dominant)
            .count();
        agreeing as f64 / returns.len() as f64
    }

    /// Classify inputs. Volatility extremes take precedence over trend.
    pub fn classify(&self, inputs: &RegimeInputs, now_ms: i64) -> Result<MarketRegime> {
        if !inputs.volatility.is_finite() || inputs.returns.iter().any(|r| !r.is_finite()) {
            return Err(SignalError::calculation("regime", "non-finite inputs"));
        }

        let cfg = &self.config;
        let consistency = Self::trend_consistency(&inputs.returns);
        let magnitude = if inputs.returns.is_empty() {
            0.0
        } else {
            inputs.returns.iter().sum::<f64>() / inputs.returns.len() as f64
        };
        let vol = inputs.volatility;

        let (regime_type, confidence) = if vol > cfg.high_volatility_pct {
            let excess = vol / cfg.high_volatility_pct - 1.0;
            (RegimeType::HighVolatility, 50.0 + excess * 100.0)
        } else if vol < cfg.low_volatility_pct {
            let shortfall = 1.0 - vol / cfg.low_volatility_pct;
            (RegimeType::LowVolatility, 50.0 + shortfall * 50.0)
        } else if consistency >= cfg.trend_consistency
            && magnitude.abs() >= cfg.trend_magnitude_pct
        {
            let regime_type = if magnitude > 0.0 {
                RegimeType::BullTrend
            } else {
                RegimeType::BearTrend
            };
            let boost = (magnitude.abs() / cfg.trend_magnitude_pct).min(4.0) * 10.0;
            (regime_type, consistency * 60.0 + boost)
        } else {
            let calm = 1.0 - (magnitude.abs() / cfg.trend_magnitude_pct).min(1.0);
            (RegimeType::Sideways, 40.0 + calm * 40.0)
        };

        Ok(MarketRegime {
            regime_type,
            confidence: confidence.clamp(0.0, 100.0),
            trend_strength: magnitude,
            trend_consistency: consistency,
            volatility_level: vol,
            regime_multipliers: regime_type.multipliers(),
            detected_at: now_ms,
        })
    }

    pub fn detect(&self, window: &[PricePoint], now_ms: i64) -> Result<MarketRegime> {
        let inputs = RegimeInputs::from_window(window, self.config.atr_period)?;
        self.classify(&inputs, now_ms)
    }
}

/// Per-symbol regime cache with TTL refresh and stale fallback.
pub struct RegimeService {
    detector: RegimeDetector,
    cache: Cache<MarketRegime>,
}

impl RegimeService {
    pub fn new(config: RegimeConfig, max_symbols: usize) -> Self {
        let ttl = config.ttl;
        Self {
            detector: RegimeDetector::new(config),
            cache: Cache::new(ttl, max_symbols),
        }
    }

    pub fn detector(&self) -> &RegimeDetector {
        &self.detector
    }

    /// Latest known regime for a symbol, fresh or stale.
    pub fn get(&self, symbol: &str) -> Option<MarketRegime> {
        self.cache
            .get_stale(&symbol.to_uppercase())
            .map(|cached| cached.value)
    }

    /// Cached regime if fresh, otherwise recompute from `window`.
    ///
    /// A failed recomputation keeps serving the previous regime past its
    /// TTL. With no previous value the unknown (sideways, zero-confidence)
    /// regime is returned and nothing is cached.
    pub fn resolve(&self, symbol: &str, window: &[PricePoint], now_ms: i64) -> MarketRegime {
        let key = symbol.to_uppercase();
        let previous = self.cache.get_stale(&key);
        if let Some(cached) = &previous {
            if cached.fresh {
                return cached.value.clone();
            }
        }

        match self.detector.detect(window, now_ms) {
            Ok(regime) => {
                debug!(
                    "Regime for {}: {} ({:.0}% confidence, vol {:.2}%)",
                    key,
                    regime.regime_type.label(),
                    regime.confidence,
                    regime.volatility_level
                );
                self.cache.set(key, regime.clone());
                regime
            }
            Err(e) => {
                let stale = SignalError::RegimeStale {
                    symbol: key.clone(),
                    reason: e.to_string(),
                };
                match previous {
                    Some(cached) => {
                        warn!("{} (serving regime aged {:?})", stale, cached.age);
                        cached.value
                    }
                    None => {
                        warn!("{} (no previous regime)", stale);
                        MarketRegime::unknown()
                    }
                }
            }
        }
    }

    /// Drop the cached regime for a symbol.
    pub fn invalidate(&self, symbol: &str) {
        self.cache.remove(&symbol.to_uppercase());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IndicatorCategory;
    use std::time::Duration;

    fn series(closes: &[f64]) -> Vec<PricePoint> {
        closes
            .iter()
            .enumerate()
            .map(|(i, c)| PricePoint::flat(i as i64 * 3_600, *c, 1.0))
            .collect()
    }

    fn detector() -> RegimeDetector {
        RegimeDetector::new(RegimeConfig::default())
    }

    #[test]
    fn test_high_volatility_takes_precedence() {
        let inputs = RegimeInputs {
            returns: vec![2.0, 3.0, 5.0, 8.0],
            volatility: 9.0,
        };
        let regime = detector().classify(&inputs, 0).unwrap();
        assert_eq!(regime.regime_type, RegimeType::HighVolatility);
    }

    #[test]
    fn test_low_volatility() {
        let inputs = RegimeInputs {
            returns: vec![0.01, -0.02, 0.0, 0.01],
            volatility: 0.1,
        };
        let regime = detector().classify(&inputs, 0).unwrap();
        assert_eq!(regime.regime_type, RegimeType::LowVolatility);
    }

    #[test]
    fn test_bull_and_bear_trend() {
        let bull = RegimeInputs {
            returns: vec![0.5, 1.5, 3.0, 6.0],
            volatility: 1.0,
        };
        let regime = detector().classify(&bull, 0).unwrap();
        assert_eq!(regime.regime_type, RegimeType::BullTrend);
        assert!(regime.trend_strength > 0.0);
        assert_eq!(regime.trend_consistency, 1.0);
        assert!(regime.regime_multipliers.get(IndicatorCategory::Trend) > 1.0);

        let bear = RegimeInputs {
            returns: vec![-0.5, -1.5, -3.0, 1.0],
            volatility: 1.0,
        };
        let regime = detector().classify(&bear, 0).unwrap();
        assert_eq!(regime.regime_type, RegimeType::BearTrend);
    }

    #[test]
    fn test_mixed_returns_sideways() {
        let inputs = RegimeInputs {
            returns: vec![0.5, -1.5, 2.0, -0.5],
            volatility: 1.0,
        };
        let regime = detector().classify(&inputs, 0).unwrap();
        assert_eq!(regime.regime_type, RegimeType::Sideways);
        assert!(regime.regime_multipliers.get(IndicatorCategory::Momentum) > 1.0);
        assert!(regime.confidence >= 0.0 && regime.confidence <= 100.0);
    }

    #[test]
    fn test_rejects_non_finite_inputs() {
        let inputs = RegimeInputs {
            returns: vec![f64::NAN],
            volatility: 1.0,
        };
        assert!(detector().classify(&inputs, 0).is_err());
    }

    #[test]
    fn test_inputs_from_rising_window() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let inputs = RegimeInputs::from_window(&series(&closes), 14).unwrap();
        assert_eq!(inputs.returns.len(), RETURN_LOOKBACKS.len());
        assert!(inputs.returns.iter().all(|r| *r > 0.0));
        let short = RegimeInputs::from_window(&series(&closes[..20]), 14).unwrap();
        // Clipped lookbacks share the full-window return.
        assert_eq!(short.returns[2], short.returns[3]);

        let regime = detector().detect(&series(&closes), 0).unwrap();
        assert_eq!(regime.regime_type, RegimeType::BullTrend);
    }

    #[test]
    fn test_inputs_require_history() {
        let err = RegimeInputs::from_window(&series(&[1.0, 2.0]), 14).unwrap_err();
        assert!(matches!(err, SignalError::InsufficientHistory { .. }));
    }

    #[test]
    fn test_service_serves_stale_on_failure() {
        let config = RegimeConfig {
            ttl: Duration::from_millis(5),
            ..RegimeConfig::default()
        };
        let service = RegimeService::new(config, 8);
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();

        let first = service.resolve("btc", &series(&closes), 1);
        assert_eq!(first.regime_type, RegimeType::BullTrend);

        std::thread::sleep(Duration::from_millis(15));
        // Expired, and the new window is too short to recompute.
        let second = service.resolve("BTC", &series(&[1.0]), 2);
        assert_eq!(second, first);
        assert_eq!(service.get("BTC"), Some(first));
    }

    #[test]
    fn test_service_uses_cache_within_ttl() {
        let service = RegimeService::new(RegimeConfig::default(), 8);
        let rising: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let falling: Vec<f64> = (0..30).map(|i| 200.0 - i as f64).collect();

        let first = service.resolve("ETH", &series(&rising), 1);
        let second = service.resolve("ETH", &series(&falling), 2);
        assert_eq!(first, second);

        service.invalidate("ETH");
        let third = service.resolve("ETH", &series(&falling), 3);
        assert_eq!(third.regime_type, RegimeType::BearTrend);
    }

    #[test]
    fn test_service_unknown_without_history() {
        let service = RegimeService::new(RegimeConfig::default(), 8);
        let regime = service.resolve("SOL", &[], 0);
        assert_eq!(regime, MarketRegime::unknown());
        assert_eq!(service.get("SOL"), None);
    }
}
