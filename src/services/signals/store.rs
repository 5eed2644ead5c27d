//! Signal cache.
//!
//! One entry per "{SYMBOL}:{timeframe}". Writers replace the whole `Arc`
//! for a key, so readers see either the previous or the new signal.

use crate::types::{Signal, Timeframe};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Default number of (symbol, timeframe) keys retained.
pub const DEFAULT_SIGNAL_CAPACITY: usize = 1_024;

/// Bounded store of the latest signal per key.
pub struct SignalStore {
    /// Cache key format: "{SYMBOL}:{timeframe}"
    signals: DashMap<String, Arc<Signal>>,
    capacity: usize,
}

impl Default for SignalStore {
    fn default() -> Self {
        Self {
            signals: DashMap::new(),
            capacity: DEFAULT_SIGNAL_CAPACITY,
        }
    }
}

impl SignalStore {
    /// Create a new signal store.
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            signals: DashMap::new(),
            capacity: capacity.max(1),
        })
    }

    /// Replace the signal for its key. Returns the previous one.
    pub fn put(&self, signal: Signal) -> Option<Arc<Signal>> {
        let key = signal.key();
        if !self.signals.contains_key(&key) && self.signals.len() >= self.capacity {
            self.evict_oldest();
        }
        debug!(
            "Cached {} {} ({:.0}% confidence)",
            key,
            signal.direction.label(),
            signal.confidence
        );
        self.signals.insert(key, Arc::new(signal))
    }

    pub fn get(&self, symbol: &str, timeframe: Timeframe) -> Option<Arc<Signal>> {
        self.signals
            .get(&Signal::cache_key(symbol, timeframe))
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Signals for a symbol, one timeframe or all of them ordered by timeframe.
    pub fn get_signals(&self, symbol: &str, timeframe: Option<Timeframe>) -> Vec<Arc<Signal>> {
        match timeframe {
            Some(tf) => self.get(symbol, tf).into_iter().collect(),
            None => Timeframe::ALL
                .iter()
                .filter_map(|tf| self.get(symbol, *tf))
                .collect(),
        }
    }

    /// Drop every timeframe's signal for a symbol. Returns how many were removed.
    pub fn invalidate(&self, symbol: &str) -> usize {
        Timeframe::ALL
            .iter()
            .filter(|tf| {
                self.signals
                    .remove(&Signal::cache_key(symbol, **tf))
                    .is_some()
            })
            .count()
    }

    pub fn invalidate_all(&self) {
        self.signals.clear();
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    fn evict_oldest(&self) {
        let oldest = self
            .signals
            .iter()
            .min_by_key(|entry| entry.value().timestamp)
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            warn!("Signal cache full ({}); evicting {}", self.capacity, key);
            self.signals.remove(&key);
        }
    }
}
