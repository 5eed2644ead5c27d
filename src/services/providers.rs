//! External collaborators consumed by the signal pipeline.

use crate::error::{Result, SignalError};
use crate::types::{PatternSignal, PriceQuote, Timeframe};
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Batch source of current market quotes.
///
/// Implementations may return a partial map: symbols missing from the
/// result are treated as unavailable for this tick.
pub trait PriceDataProvider: Send + Sync {
    fn get_batch_prices<'a>(
        &'a self,
        symbols: &'a [String],
    ) -> BoxFuture<'a, Result<HashMap<String, PriceQuote>>>;
}

/// Source of chart pattern signals.
pub trait PatternRecognition: Send + Sync {
    fn get_patterns<'a>(
        &'a self,
        symbol: &'a str,
        timeframe: Timeframe,
    ) -> BoxFuture<'a, Result<Vec<PatternSignal>>>;
}

/// In-memory price provider with settable quotes.
#[derive(Default)]
pub struct StaticPriceProvider {
    quotes: RwLock<HashMap<String, PriceQuote>>,
    failing: RwLock<HashSet<String>>,
}

impl StaticPriceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_quote(&self, symbol: &str, quote: PriceQuote) {
        if let Ok(mut quotes) = self.quotes.write() {
            quotes.insert(symbol.to_uppercase(), quote);
        }
    }

    /// Omit a symbol from batch results until `recover` is called.
    pub fn fail_symbol(&self, symbol: &str) {
        if let Ok(mut failing) = self.failing.write() {
            failing.insert(symbol.to_uppercase());
        }
    }

    pub fn recover(&self, symbol: &str) {
        if let Ok(mut failing) = self.failing.write() {
            failing.remove(&symbol.to_uppercase());
        }
    }
}

impl PriceDataProvider for StaticPriceProvider {
    fn get_batch_prices<'a>(
        &'a self,
        symbols: &'a [String],
    ) -> BoxFuture<'a, Result<HashMap<String, PriceQuote>>> {
        Box::pin(async move {
            let quotes = self
                .quotes
                .read()
                .map_err(|_| SignalError::Provider("quote table poisoned".to_string()))?;
            let failing = self
                .failing
                .read()
                .map_err(|_| SignalError::Provider("failure table poisoned".to_string()))?;

            Ok(symbols
                .iter()
                .map(|s| s.to_uppercase())
                .filter(|s| !failing.contains(s))
                .filter_map(|s| quotes.get(&s).map(|q| (s, *q)))
                .collect())
        })
    }
}

/// Pattern source that never reports patterns.
pub struct NoPatterns;

impl PatternRecognition for NoPatterns {
    fn get_patterns<'a>(
        &'a self,
        _symbol: &'a str,
        _timeframe: Timeframe,
    ) -> BoxFuture<'a, Result<Vec<PatternSignal>>> {
        Box::pin(async { Ok(Vec::new()) })
    }
}

/// In-memory pattern source keyed by (symbol, timeframe).
#[derive(Default)]
pub struct StaticPatterns {
    patterns: DashMap<String, Vec<PatternSignal>>,
}

impl StaticPatterns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, symbol: &str, timeframe: Timeframe, patterns: Vec<PatternSignal>) {
        self.patterns
            .insert(format!("{}:{}", symbol.to_uppercase(), timeframe), patterns);
    }
}

impl PatternRecognition for StaticPatterns {
    fn get_patterns<'a>(
        &'a self,
        symbol: &'a str,
        timeframe: Timeframe,
    ) -> BoxFuture<'a, Result<Vec<PatternSignal>>> {
        let key = format!("{}:{}", symbol.to_uppercase(), timeframe);
        Box::pin(async move {
            Ok(self
                .patterns
                .get(&key)
                .map(|p| p.value().clone())
                .unwrap_or_default())
        })
    }
}
