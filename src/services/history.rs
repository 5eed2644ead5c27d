//! Per-symbol price history, bucketed per timeframe.

use crate::types::{PricePoint, PriceQuote, Timeframe};
use dashmap::DashMap;
use std::collections::{HashMap, VecDeque};
use std::f64::consts::PI;
use std::sync::Arc;
use tracing::debug;

/// OHLC bucket for one timeframe period.
///
/// Volume is the mean of the samples recorded into the bucket, so a bucket
/// still filling compares like-for-like with completed ones.
#[derive(Debug, Clone)]
struct OhlcBucket {
    time: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume_sum: f64,
    samples: u32,
}

impl OhlcBucket {
    fn new(time: i64, price: f64, volume: f64) -> Self {
        Self {
            time,
            open: price,
            high: price,
            low: price,
            close: price,
            volume_sum: volume,
            samples: 1,
        }
    }

    fn update(&mut self, price: f64, volume: f64) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
        self.volume_sum += volume;
        self.samples += 1;
    }

    fn volume(&self) -> f64 {
        self.volume_sum / self.samples.max(1) as f64
    }

    fn to_point(&self) -> PricePoint {
        PricePoint {
            timestamp: self.time,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume(),
        }
    }
}

/// Bounded bucket series for a single timeframe.
#[derive(Debug)]
struct TimeSeries {
    timeframe: Timeframe,
    buckets: VecDeque<OhlcBucket>,
    max_buckets: usize,
}

impl TimeSeries {
    fn new(timeframe: Timeframe, max_buckets: usize) -> Self {
        Self {
            timeframe,
            buckets: VecDeque::with_capacity(max_buckets.min(512)),
            max_buckets,
        }
    }

    fn add_price(&mut self, price: f64, volume: f64, timestamp: i64) {
        let bucket_time = timestamp / self.timeframe.seconds() * self.timeframe.seconds();

        if let Some(last) = self.buckets.back_mut() {
            if last.time == bucket_time {
                last.update(price, volume);
                return;
            }
            // Out-of-order ticks are dropped.
            if last.time > bucket_time {
                return;
            }
        }

        self.buckets.push_back(OhlcBucket::new(bucket_time, price, volume));
        self.trim();
    }

    fn push_point(&mut self, point: &PricePoint) {
        if let Some(last) = self.buckets.back() {
            if last.time >= point.timestamp {
                return;
            }
        }
        self.buckets.push_back(OhlcBucket {
            time: point.timestamp,
            open: point.open,
            high: point.high,
            low: point.low,
            close: point.close,
            volume_sum: point.volume,
            samples: 1,
        });
        self.trim();
    }

    fn trim(&mut self) {
        while self.buckets.len() > self.max_buckets {
            self.buckets.pop_front();
        }
    }

    fn points(&self) -> Vec<PricePoint> {
        self.buckets.iter().map(OhlcBucket::to_point).collect()
    }
}

/// Chart series for one symbol across all timeframes.
#[derive(Debug)]
struct SymbolHistory {
    series: HashMap<Timeframe, TimeSeries>,
}

impl SymbolHistory {
    fn new(max_buckets: usize) -> Self {
        Self {
            series: Timeframe::ALL
                .into_iter()
                .map(|tf| (tf, TimeSeries::new(tf, max_buckets)))
                .collect(),
        }
    }
}

/// Price history store fed by each tick's batch quotes.
pub struct PriceHistoryStore {
    data: DashMap<String, SymbolHistory>,
    max_buckets: usize,
}

impl PriceHistoryStore {
    pub fn new(max_buckets: usize) -> Arc<Self> {
        Arc::new(Self {
            data: DashMap::new(),
            max_buckets: max_buckets.max(1),
        })
    }

    /// Record a quote at `timestamp` (unix seconds) into every timeframe.
    ///
    /// Each recorded tick samples the quote's 24h volume when reported,
    /// otherwise a unit volume so VWAP degrades to an equal-weight mean.
    /// A bucket's volume is the average of its samples, not their sum.
    pub fn record(&self, symbol: &str, quote: &PriceQuote, timestamp: i64) {
        let volume = quote.volume_24h.filter(|v| v.is_finite() && *v > 0.0).unwrap_or(1.0);
        let mut entry = self
            .data
            .entry(symbol.to_uppercase())
            .or_insert_with(|| SymbolHistory::new(self.max_buckets));
        for series in entry.series.values_mut() {
            series.add_price(quote.price, volume, timestamp);
        }
    }

    /// Load genuine historical candles for one timeframe, oldest-first.
    /// Candles not newer than the last stored bucket are ignored.
    pub fn seed(&self, symbol: &str, timeframe: Timeframe, points: &[PricePoint]) {
        let mut entry = self
            .data
            .entry(symbol.to_uppercase())
            .or_insert_with(|| SymbolHistory::new(self.max_buckets));
        if let Some(series) = entry.series.get_mut(&timeframe) {
            for point in points {
                series.push_point(point);
            }
            debug!(
                "Seeded {} {} with {} candles ({} stored)",
                symbol,
                timeframe,
                points.len(),
                series.buckets.len()
            );
        }
    }

    /// Window for a symbol and timeframe, oldest-first.
    pub fn window(&self, symbol: &str, timeframe: Timeframe) -> Vec<PricePoint> {
        self.data
            .get(&symbol.to_uppercase())
            .and_then(|entry| entry.series.get(&timeframe).map(TimeSeries::points))
            .unwrap_or_default()
    }

    /// Number of stored buckets for a symbol and timeframe.
    pub fn len(&self, symbol: &str, timeframe: Timeframe) -> usize {
        self.data
            .get(&symbol.to_uppercase())
            .and_then(|entry| entry.series.get(&timeframe).map(|s| s.buckets.len()))
            .unwrap_or(0)
    }

    /// Drop all history for a symbol.
    pub fn clear(&self, symbol: &str) {
        self.data.remove(&symbol.to_uppercase());
    }
}

/// Synthesize a deterministic window ending at the quote's current price.
///
/// The path applies the 24h change as a geometric drift scaled to the
/// timeframe, plus a fixed sine wiggle that vanishes at both ends. It is an
/// approximation of price history and contains no randomness.
pub fn synthesize_window(
    quote: &PriceQuote,
    timeframe: Timeframe,
    len: usize,
    now: i64,
) -> Vec<PricePoint> {
    if len == 0 || !quote.is_valid() {
        return Vec::new();
    }

    let step = timeframe.seconds();
    let last_bucket = now / step * step;
    let drift = (quote.change_24h / 100.0) * (step as f64 / 86_400.0);
    let growth = (1.0 + drift).max(0.01);
    let amplitude = quote.price * quote.change_24h.abs().max(1.0) / 100.0 * 0.05;
    let volume = quote.volume_24h.filter(|v| v.is_finite() && *v > 0.0).unwrap_or(1.0);
    let span = (len.saturating_sub(1)).max(1) as f64;

    let closes: Vec<f64> = (0..len)
        .map(|i| {
            let bars_back = (len - 1 - i) as i32;
            let trend = quote.price / growth.powi(bars_back);
            let wiggle = amplitude * (3.0 * PI * i as f64 / span).sin();
            (trend + wiggle).max(f64::EPSILON)
        })
        .collect();

    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            let pad = (amplitude * 0.2).max(close * 0.0005);
            PricePoint {
                timestamp: last_bucket - (len - 1 - i) as i64 * step,
                open,
                high: open.max(close) + pad,
                low: (open.min(close) - pad).max(f64::EPSILON),
                close,
                volume,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_buckets_per_timeframe() {
        let store = PriceHistoryStore::new(100);
        let quote = PriceQuote::new(100.0, 1.0);
        // Three ticks inside the same hour, the last one crossing into the next 15m bucket.
        store.record("btc", &quote, 3_600);
        store.record("BTC", &PriceQuote::new(101.0, 1.0), 3_700);
        store.record("BTC", &PriceQuote::new(99.0, 1.0), 3_600 + 900);

        assert_eq!(store.len("BTC", Timeframe::OneHour), 1);
        assert_eq!(store.len("BTC", Timeframe::FifteenMinutes), 2);

        let hourly = store.window("BTC", Timeframe::OneHour);
        assert_eq!(hourly[0].open, 100.0);
        assert_eq!(hourly[0].high, 101.0);
        assert_eq!(hourly[0].low, 99.0);
        assert_eq!(hourly[0].close, 99.0);
        assert_eq!(hourly[0].volume, 1.0);
    }

    #[test]
    fn test_bucket_volume_is_sample_mean() {
        let store = PriceHistoryStore::new(100);
        let quote = |volume| PriceQuote {
            volume_24h: Some(volume),
            ..PriceQuote::new(100.0, 0.0)
        };
        // Fifteen ticks in one hour, then a single tick in the next.
        for i in 0..15 {
            store.record("BTC", &quote(1_000.0), i * 240);
        }
        store.record("BTC", &quote(1_000.0), 3_600);

        let hourly = store.window("BTC", Timeframe::OneHour);
        assert_eq!(hourly.len(), 2);
        assert_eq!(hourly[0].volume, 1_000.0);
        assert_eq!(hourly[1].volume, 1_000.0);

        store.record("BTC", &quote(3_000.0), 3_700);
        let hourly = store.window("BTC", Timeframe::OneHour);
        assert_eq!(hourly[1].volume, 2_000.0);
    }

    #[test]
    fn test_retention_is_bounded() {
        let store = PriceHistoryStore::new(5);
        for i in 0..20 {
            store.record("ETH", &PriceQuote::new(10.0 + i as f64, 0.0), i * 3_600);
        }
        let window = store.window("ETH", Timeframe::OneHour);
        assert_eq!(window.len(), 5);
        assert_eq!(window.last().unwrap().close, 29.0);
    }

    #[test]
    fn test_out_of_order_tick_dropped() {
        let store = PriceHistoryStore::new(10);
        store.record("SOL", &PriceQuote::new(10.0, 0.0), 7_200);
        store.record("SOL", &PriceQuote::new(50.0, 0.0), 100);
        let window = store.window("SOL", Timeframe::OneHour);
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].close, 10.0);
    }

    #[test]
    fn test_seed_appends_only_newer_points() {
        let store = PriceHistoryStore::new(10);
        let points: Vec<PricePoint> = (0..4)
            .map(|i| PricePoint::flat(i * 3_600, 100.0 + i as f64, 1.0))
            .collect();
        store.seed("BTC", Timeframe::OneHour, &points);
        store.seed("BTC", Timeframe::OneHour, &points[..2]);
        assert_eq!(store.len("BTC", Timeframe::OneHour), 4);
        assert_eq!(store.len("BTC", Timeframe::OneDay), 0);
    }

    #[test]
    fn test_unknown_symbol_is_empty() {
        let store = PriceHistoryStore::new(10);
        assert!(store.window("NOPE", Timeframe::OneHour).is_empty());
        assert_eq!(store.len("NOPE", Timeframe::OneHour), 0);
    }

    #[test]
    fn test_synthetic_window_ends_at_current_price() {
        let quote = PriceQuote::new(250.0, 4.0);
        let window = synthesize_window(&quote, Timeframe::OneHour, 40, 1_000_000);
        assert_eq!(window.len(), 40);
        let last = window.last().unwrap();
        assert!((last.close - 250.0).abs() < 1e-9);
        assert!(window.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert!(window.iter().all(|p| p.low <= p.close && p.close <= p.high));
    }

    #[test]
    fn test_synthetic_window_is_deterministic() {
        let quote = PriceQuote::new(42.0, -3.0);
        let a = synthesize_window(&quote, Timeframe::FourHours, 30, 500_000);
        let b = synthesize_window(&quote, Timeframe::FourHours, 30, 500_000);
        assert_eq!(a, b);
    }

    #[test]
    fn test_synthetic_window_follows_change_sign() {
        let up = synthesize_window(&PriceQuote::new(100.0, 10.0), Timeframe::OneDay, 10, 0);
        let down = synthesize_window(&PriceQuote::new(100.0, -10.0), Timeframe::OneDay, 10, 0);
        assert!(up[0].close < 100.0);
        assert!(down[0].close > 100.0);
    }

    #[test]
    fn test_synthetic_window_rejects_invalid_quote() {
        let quote = PriceQuote::new(f64::NAN, 0.0);
        assert!(synthesize_window(&quote, Timeframe::OneHour, 10, 0).is_empty());
    }
}
