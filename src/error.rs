use thiserror::Error;

/// Signal engine error types.
///
/// Every variant is scoped to a single symbol, key or update. None of them
/// is fatal to the process.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignalError {
    #[error("Data unavailable for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    #[error("Insufficient history for {key}: have {have}, need {need}")]
    InsufficientHistory {
        key: String,
        have: usize,
        need: usize,
    },

    #[error("Calculation failed for {key}: {reason}")]
    CalculationFailure { key: String, reason: String },

    #[error("Regime for {symbol} is stale: {reason}")]
    RegimeStale { symbol: String, reason: String },

    #[error("Weight for {indicator} out of bounds: {value:.4} not in [{min}, {max}]")]
    WeightBoundsViolation {
        indicator: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Provider error: {0}")]
    Provider(String),
}

impl SignalError {
    pub fn data_unavailable(symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DataUnavailable {
            symbol: symbol.into(),
            reason: reason.into(),
        }
    }

    pub fn calculation(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CalculationFailure {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SignalError>;
