//! Adaptive indicator weighting.
//!
//! Weights start from fixed priors and are nudged by realized signal
//! outcomes. Readers always get a whole snapshot: the current vector is an
//! `Arc` swapped in one write, never mutated in place.

use crate::config::WeightConfig;
use crate::error::SignalError;
use crate::types::{
    CategoryMultipliers, IndicatorKind, IndicatorWeightVector, SignalOutcome,
    SignalPerformanceRecord,
};
use chrono::Utc;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info, warn};

/// Prior weights. Trend indicators lead, volume trails.
pub const PRIOR_WEIGHTS: [(IndicatorKind, f64); 6] = [
    (IndicatorKind::Macd, 0.22),
    (IndicatorKind::Adx, 0.18),
    (IndicatorKind::Ema, 0.18),
    (IndicatorKind::Rsi, 0.16),
    (IndicatorKind::Bollinger, 0.14),
    (IndicatorKind::Vwap, 0.12),
];

const BISECTION_STEPS: usize = 200;

/// Immutable view of the weight state.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightSnapshot {
    pub weights: IndicatorWeightVector,
    /// Success rate (0-1) for indicators with enough resolved samples.
    pub success_rates: BTreeMap<IndicatorKind, f64>,
    /// Number of resolved records the rates were computed from.
    pub sample_size: usize,
    /// Incremented on every applied update.
    pub revision: u64,
    /// Unix timestamp (milliseconds) of the last update.
    pub updated_at: i64,
}

impl WeightSnapshot {
    pub fn success_rate(&self, kind: IndicatorKind) -> Option<f64> {
        self.success_rates.get(&kind).copied()
    }
}

/// Owns the current weight vector and the bounded outcome history.
pub struct AdaptiveWeightManager {
    config: WeightConfig,
    current: RwLock<Arc<WeightSnapshot>>,
    /// Resolved records, oldest first. Holding this lock serializes updates.
    history: Mutex<VecDeque<SignalPerformanceRecord>>,
}

impl AdaptiveWeightManager {
    pub fn new(config: WeightConfig) -> Self {
        let priors: BTreeMap<IndicatorKind, f64> = PRIOR_WEIGHTS.into_iter().collect();
        let (weights, _) = normalize_bounded(&priors, config.min_weight, config.max_weight);
        let snapshot = WeightSnapshot {
            weights: IndicatorWeightVector::from_map(weights),
            success_rates: BTreeMap::new(),
            sample_size: 0,
            revision: 0,
            updated_at: Utc::now().timestamp_millis(),
        };

        Self {
            current: RwLock::new(Arc::new(snapshot)),
            history: Mutex::new(VecDeque::with_capacity(config.lookback)),
            config,
        }
    }

    pub fn config(&self) -> &WeightConfig {
        &self.config
    }

    /// Current snapshot. Never blocks on the update computation.
    pub fn snapshot(&self) -> Arc<WeightSnapshot> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    pub fn current_weights(&self) -> IndicatorWeightVector {
        self.snapshot().weights.clone()
    }

    /// Fold resolved outcomes into the weights.
    ///
    /// Pending records are ignored. Only the most recent `lookback` resolved
    /// records are considered. `multipliers` applies the current regime's
    /// per-category bias before renormalization.
    pub fn update_from_performance(
        &self,
        records: &[SignalPerformanceRecord],
        multipliers: Option<&CategoryMultipliers>,
    ) -> Arc<WeightSnapshot> {
        let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());

        let resolved = records.iter().filter(|r| r.is_resolved());
        let mut accepted = 0;
        for record in resolved {
            history.push_back(record.clone());
            accepted += 1;
        }
        while history.len() > self.config.lookback {
            history.pop_front();
        }

        if accepted == 0 && multipliers.is_none() {
            debug!("No resolved performance records; weights unchanged");
            return self.snapshot();
        }

        let success_rates = self.success_rates(&history);
        let previous = self.snapshot();
        let neutral = CategoryMultipliers::neutral();
        let multipliers = multipliers.unwrap_or(&neutral);

        let raw: BTreeMap<IndicatorKind, f64> = previous
            .weights
            .iter()
            .map(|(kind, weight)| {
                let nudge = success_rates
                    .get(&kind)
                    .map(|rate| self.config.learning_rate * (rate - 0.5))
                    .unwrap_or(0.0);
                let adjusted = (weight + nudge) * multipliers.get(kind.category());
                (kind, adjusted)
            })
            .collect();

        let (weights, clamped) =
            normalize_bounded(&raw, self.config.min_weight, self.config.max_weight);
        for (kind, value) in clamped {
            let violation = SignalError::WeightBoundsViolation {
                indicator: kind.id().to_string(),
                value,
                min: self.config.min_weight,
                max: self.config.max_weight,
            };
            warn!("{}; clamped", violation);
        }

        let snapshot = Arc::new(WeightSnapshot {
            weights: IndicatorWeightVector::from_map(weights),
            success_rates,
            sample_size: history.len(),
            revision: previous.revision + 1,
            updated_at: Utc::now().timestamp_millis(),
        });

        *self.current.write().unwrap_or_else(|e| e.into_inner()) = Arc::clone(&snapshot);
        info!(
            "Updated indicator weights from {} resolved records (revision {})",
            snapshot.sample_size, snapshot.revision
        );
        snapshot
    }

    fn success_rates(
        &self,
        history: &VecDeque<SignalPerformanceRecord>,
    ) -> BTreeMap<IndicatorKind, f64> {
        let mut tally: BTreeMap<IndicatorKind, (usize, usize)> = BTreeMap::new();
        for record in history {
            for kind in &record.indicator_context {
                let entry = tally.entry(*kind).or_insert((0, 0));
                entry.1 += 1;
                if record.outcome == SignalOutcome::Success {
                    entry.0 += 1;
                }
            }
        }

        tally
            .into_iter()
            .filter(|(_, (_, total))| *total >= self.config.min_samples.max(1))
            .map(|(kind, (wins, total))| (kind, wins as f64 / total as f64))
            .collect()
    }

    /// Number of resolved records currently retained.
    pub fn history_len(&self) -> usize {
        self.history.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Default for AdaptiveWeightManager {
    fn default() -> Self {
        Self::new(WeightConfig::default())
    }
}

/// Scale `raw` to sum to 1 with every weight in `[min, max]`.
///
/// Finds `scale` such that `sum(clamp(raw * scale, min, max)) == 1` by
/// bisection; the sum is monotone in `scale`. Returns the weights and the
/// pre-clamp values of any that hit a bound. Infeasible bounds fall back
/// to equal weights.
pub fn normalize_bounded(
    raw: &BTreeMap<IndicatorKind, f64>,
    min: f64,
    max: f64,
) -> (BTreeMap<IndicatorKind, f64>, Vec<(IndicatorKind, f64)>) {
    let n = raw.len();
    if n == 0 {
        return (BTreeMap::new(), Vec::new());
    }
    if n as f64 * min > 1.0 || (n as f64) * max < 1.0 || min > max {
        warn!(
            "Weight bounds [{}, {}] infeasible for {} indicators; using equal weights",
            min, max, n
        );
        let equal = 1.0 / n as f64;
        return (raw.keys().map(|k| (*k, equal)).collect(), Vec::new());
    }

    let positive: BTreeMap<IndicatorKind, f64> = raw
        .iter()
        .map(|(k, v)| {
            let v = if v.is_finite() { *v } else { 0.0 };
            (*k, v.max(f64::EPSILON))
        })
        .collect();
    let smallest = positive.values().cloned().fold(f64::INFINITY, f64::min);

    let total_at = |scale: f64| -> f64 {
        positive
            .values()
            .map(|v| (v * scale).clamp(min, max))
            .sum()
    };

    let mut lo = 0.0;
    let mut hi = max / smallest;
    for _ in 0..BISECTION_STEPS {
        let mid = (lo + hi) / 2.0;
        if total_at(mid) < 1.0 {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    let scale = (lo + hi) / 2.0;

    let mut clamped = Vec::new();
    let mut weights: BTreeMap<IndicatorKind, f64> = positive
        .iter()
        .map(|(k, v)| {
            let scaled = v * scale;
            let bounded = scaled.clamp(min, max);
            if (scaled - bounded).abs() > 1e-12 {
                clamped.push((*k, scaled));
            }
            (*k, bounded)
        })
        .collect();

    // Absorb residual rounding into an unclamped weight.
    let residual = 1.0 - weights.values().sum::<f64>();
    if residual != 0.0 {
        if let Some((_, w)) = weights
            .iter_mut()
            .filter(|(_, w)| **w > min && **w < max)
            .filter(|(_, w)| (**w + residual) >= min && (**w + residual) <= max)
            .max_by(|a, b| a.1.total_cmp(b.1))
        {
            *w += residual;
        }
    }

    (weights, clamped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RegimeType;
    use uuid::Uuid;

    fn record(kinds: &[IndicatorKind], outcome: SignalOutcome) -> SignalPerformanceRecord {
        SignalPerformanceRecord::pending(Uuid::new_v4(), "BTC", kinds.to_vec(), 0)
            .resolve(outcome, 0.0)
    }

    fn assert_normalized(weights: &IndicatorWeightVector, config: &WeightConfig) {
        assert!((weights.sum() - 1.0).abs() < 1e-6, "sum {}", weights.sum());
        for (kind, w) in weights.iter() {
            assert!(
                w >= config.min_weight - 1e-9 && w <= config.max_weight + 1e-9,
                "{} = {}",
                kind,
                w
            );
        }
    }

    #[test]
    fn test_priors_are_normalized() {
        let manager = AdaptiveWeightManager::default();
        let weights = manager.current_weights();
        assert_eq!(weights.len(), IndicatorKind::ALL.len());
        assert_normalized(&weights, manager.config());
        assert!(weights.get(IndicatorKind::Macd) > weights.get(IndicatorKind::Vwap));
    }

    #[test]
    fn test_pending_records_ignored() {
        let manager = AdaptiveWeightManager::default();
        let before = manager.snapshot();
        let pending =
            SignalPerformanceRecord::pending(Uuid::new_v4(), "BTC", vec![IndicatorKind::Rsi], 0);
        let after = manager.update_from_performance(&[pending], None);
        assert_eq!(before, after);
        assert_eq!(manager.history_len(), 0);
    }

    #[test]
    fn test_success_shifts_weight() {
        let manager = AdaptiveWeightManager::default();
        let before = manager.current_weights();

        let mut records = Vec::new();
        for i in 0..50 {
            let rsi = if i < 40 { SignalOutcome::Success } else { SignalOutcome::Failure };
            let vwap = if i < 10 { SignalOutcome::Success } else { SignalOutcome::Failure };
            records.push(record(&[IndicatorKind::Rsi], rsi));
            records.push(record(&[IndicatorKind::Vwap], vwap));
        }

        let snapshot = manager.update_from_performance(&records, None);
        assert!(snapshot.weights.get(IndicatorKind::Rsi) > before.get(IndicatorKind::Rsi));
        assert!(snapshot.weights.get(IndicatorKind::Vwap) < before.get(IndicatorKind::Vwap));
        assert_eq!(snapshot.success_rate(IndicatorKind::Rsi), Some(0.8));
        assert_eq!(snapshot.success_rate(IndicatorKind::Vwap), Some(0.2));
        assert_eq!(snapshot.revision, 1);
        assert_normalized(&snapshot.weights, manager.config());
    }

    #[test]
    fn test_min_samples_required() {
        let manager = AdaptiveWeightManager::default();
        let records: Vec<_> = (0..4)
            .map(|_| record(&[IndicatorKind::Adx], SignalOutcome::Success))
            .collect();
        let snapshot = manager.update_from_performance(&records, None);
        assert_eq!(snapshot.success_rate(IndicatorKind::Adx), None);
    }

    #[test]
    fn test_lookback_discards_old_records() {
        let config = WeightConfig {
            lookback: 10,
            ..WeightConfig::default()
        };
        let manager = AdaptiveWeightManager::new(config);
        let old: Vec<_> = (0..10)
            .map(|_| record(&[IndicatorKind::Ema], SignalOutcome::Failure))
            .collect();
        let new: Vec<_> = (0..10)
            .map(|_| record(&[IndicatorKind::Ema], SignalOutcome::Success))
            .collect();
        manager.update_from_performance(&old, None);
        let snapshot = manager.update_from_performance(&new, None);
        assert_eq!(manager.history_len(), 10);
        assert_eq!(snapshot.success_rate(IndicatorKind::Ema), Some(1.0));
    }

    #[test]
    fn test_regime_multipliers_applied() {
        let manager = AdaptiveWeightManager::default();
        let before = manager.current_weights();
        let multipliers = RegimeType::Sideways.multipliers();
        let snapshot = manager.update_from_performance(&[], Some(&multipliers));
        assert!(snapshot.weights.get(IndicatorKind::Rsi) > before.get(IndicatorKind::Rsi));
        assert!(snapshot.weights.get(IndicatorKind::Macd) < before.get(IndicatorKind::Macd));
        assert_normalized(&snapshot.weights, manager.config());
    }

    #[test]
    fn test_normalize_clamps_outliers() {
        let raw: BTreeMap<IndicatorKind, f64> = [
            (IndicatorKind::Rsi, 10.0),
            (IndicatorKind::Ema, 0.001),
            (IndicatorKind::Macd, 1.0),
            (IndicatorKind::Adx, 1.0),
            (IndicatorKind::Bollinger, 1.0),
            (IndicatorKind::Vwap, 1.0),
        ]
        .into_iter()
        .collect();
        let (weights, clamped) = normalize_bounded(&raw, 0.05, 0.40);
        let vector = IndicatorWeightVector::from_map(weights);
        assert_normalized(&vector, &WeightConfig::default());
        assert_eq!(vector.get(IndicatorKind::Rsi), 0.40);
        assert_eq!(vector.get(IndicatorKind::Ema), 0.05);
        let kinds: Vec<_> = clamped.iter().map(|(k, _)| *k).collect();
        assert!(kinds.contains(&IndicatorKind::Rsi));
        assert!(kinds.contains(&IndicatorKind::Ema));
    }

    #[test]
    fn test_normalize_infeasible_bounds() {
        let raw: BTreeMap<IndicatorKind, f64> =
            [(IndicatorKind::Rsi, 1.0), (IndicatorKind::Ema, 3.0)].into_iter().collect();
        let (weights, _) = normalize_bounded(&raw, 0.05, 0.40);
        assert_eq!(weights[&IndicatorKind::Rsi], 0.5);
        assert_eq!(weights[&IndicatorKind::Ema], 0.5);
    }

    #[test]
    fn test_repeated_updates_stay_bounded() {
        let manager = AdaptiveWeightManager::default();
        let records: Vec<_> = (0..20)
            .map(|_| record(&[IndicatorKind::Bollinger], SignalOutcome::Success))
            .collect();
        for _ in 0..50 {
            manager.update_from_performance(&records, None);
        }
        let weights = manager.current_weights();
        assert_normalized(&weights, manager.config());
        assert!((weights.get(IndicatorKind::Bollinger) - 0.40).abs() < 1e-6);
    }
}
