use serde::{Deserialize, Serialize};

/// Signal timeframe. Each timeframe owns its own OHLC bucket series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "1d")]
    OneDay,
}

impl Timeframe {
    pub const ALL: [Timeframe; 4] = [
        Timeframe::FifteenMinutes,
        Timeframe::OneHour,
        Timeframe::FourHours,
        Timeframe::OneDay,
    ];

    /// Parse from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "15m" => Some(Self::FifteenMinutes),
            "1h" => Some(Self::OneHour),
            "4h" => Some(Self::FourHours),
            "1d" | "24h" => Some(Self::OneDay),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FifteenMinutes => "15m",
            Self::OneHour => "1h",
            Self::FourHours => "4h",
            Self::OneDay => "1d",
        }
    }

    /// Bucket size in seconds.
    pub fn seconds(&self) -> i64 {
        match self {
            Self::FifteenMinutes => 900,
            Self::OneHour => 3_600,
            Self::FourHours => 14_400,
            Self::OneDay => 86_400,
        }
    }

    /// Scales the stop distance. Longer timeframes need wider stops.
    pub fn volatility_multiplier(&self) -> f64 {
        match self {
            Self::FifteenMinutes => 0.5,
            Self::OneHour => 0.75,
            Self::FourHours => 1.0,
            Self::OneDay => 1.5,
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// OHLCV data point. Series are ordered oldest-first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Unix timestamp (seconds).
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PricePoint {
    /// A flat point where open, high, low and close are all `price`.
    pub fn flat(timestamp: i64, price: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open: price,
            high: price,
            low: price,
            close: price,
            volume,
        }
    }
}

/// Current market snapshot for one symbol, as returned by a batch price fetch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub price: f64,
    /// 24h change in percent.
    pub change_24h: f64,
    pub market_cap: Option<f64>,
    /// 24h traded volume, when the provider reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_24h: Option<f64>,
}

impl PriceQuote {
    pub fn new(price: f64, change_24h: f64) -> Self {
        Self {
            price,
            change_24h,
            market_cap: None,
            volume_24h: None,
        }
    }

    /// A quote is usable when its price is a positive finite number.
    pub fn is_valid(&self) -> bool {
        self.price.is_finite() && self.price > 0.0 && self.change_24h.is_finite()
    }
}
