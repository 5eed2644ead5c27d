use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::IndicatorKind;

/// Outcome of an issued signal, resolved by the outcome tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalOutcome {
    Success,
    Failure,
    Pending,
}

/// Realized performance of one issued signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalPerformanceRecord {
    pub signal_id: Uuid,
    pub symbol: String,
    /// Indicators that voted with the signal's direction when it was issued.
    pub indicator_context: Vec<IndicatorKind>,
    pub outcome: SignalOutcome,
    /// Realized return in percent, once resolved.
    pub realized_return: f64,
    /// Unix timestamp (milliseconds) when the signal was issued.
    pub issued_at: i64,
}

impl SignalPerformanceRecord {
    /// A freshly issued, unresolved record.
    pub fn pending(
        signal_id: Uuid,
        symbol: impl Into<String>,
        indicator_context: Vec<IndicatorKind>,
        issued_at: i64,
    ) -> Self {
        Self {
            signal_id,
            symbol: symbol.into(),
            indicator_context,
            outcome: SignalOutcome::Pending,
            realized_return: 0.0,
            issued_at,
        }
    }

    /// Resolve this record with an outcome and realized return.
    pub fn resolve(mut self, outcome: SignalOutcome, realized_return: f64) -> Self {
        self.outcome = outcome;
        self.realized_return = realized_return;
        self
    }

    pub fn is_resolved(&self) -> bool {
        self.outcome != SignalOutcome::Pending
    }
}

/// Normalized per-indicator weights. Sums to 1 within 1e-6.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorWeightVector {
    weights: BTreeMap<IndicatorKind, f64>,
}

impl IndicatorWeightVector {
    pub fn from_map(weights: BTreeMap<IndicatorKind, f64>) -> Self {
        Self { weights }
    }

    pub fn get(&self, kind: IndicatorKind) -> f64 {
        self.weights.get(&kind).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (IndicatorKind, f64)> + '_ {
        self.weights.iter().map(|(k, w)| (*k, *w))
    }

    pub fn sum(&self) -> f64 {
        self.weights.values().sum()
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn as_map(&self) -> &BTreeMap<IndicatorKind, f64> {
        &self.weights
    }
}
