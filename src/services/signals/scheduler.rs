//! Fixed-interval signal calculation.
//!
//! One pass at a time: a tick that fires while the previous pass is still
//! running is dropped, not queued. Each pass fetches a batch of quotes and
//! recomputes every tracked (symbol, timeframe) pair, isolating failures to
//! the pair that produced them.

use super::confluence::{ConfluenceEngine, ConfluenceInput};
use super::indicators::IndicatorSet;
use super::regime::RegimeService;
use super::store::{SignalStore, DEFAULT_SIGNAL_CAPACITY};
use super::weights::{AdaptiveWeightManager, WeightSnapshot};
use crate::config::{Config, HistoryPolicy};
use crate::error::{Result, SignalError};
use crate::services::history::{synthesize_window, PriceHistoryStore};
use crate::services::providers::{PatternRecognition, PriceDataProvider};
use crate::types::{
    Direction, IndicatorWeightVector, MarketRegime, PricePoint, PriceQuote, Signal,
    SignalPerformanceRecord, Timeframe,
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Timeframe whose window feeds regime detection.
const REGIME_TIMEFRAME: Timeframe = Timeframe::OneHour;

const RECORD_CHANNEL_CAPACITY: usize = 1024;

/// Calculation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Calculating,
}

/// Summary of a completed pass.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// Keys whose signal was replaced.
    pub updated: Vec<String>,
    /// Keys left untouched for lack of data or history.
    pub skipped: Vec<String>,
    /// Keys left untouched because their calculation failed.
    pub failed: Vec<String>,
    /// Pending records for every LONG/SHORT signal issued this pass.
    pub records: Vec<SignalPerformanceRecord>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub enum TickOutcome {
    Completed(TickReport),
    /// The previous pass was still calculating.
    Skipped,
}

impl TickOutcome {
    pub fn report(&self) -> Option<&TickReport> {
        match self {
            TickOutcome::Completed(report) => Some(report),
            TickOutcome::Skipped => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, TickOutcome::Skipped)
    }
}

/// Resets the calculating flag when a pass ends, however it ends.
struct CalculationGuard<'a>(&'a AtomicBool);

impl Drop for CalculationGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A window plus whether it was synthesized.
struct PriceWindow {
    points: Vec<PricePoint>,
    synthetic: bool,
}

/// Drives the calculation pass and owns every piece of signal state.
pub struct SignalScheduler {
    config: Config,
    provider: Arc<dyn PriceDataProvider>,
    patterns: Arc<dyn PatternRecognition>,
    history: Arc<PriceHistoryStore>,
    indicators: IndicatorSet,
    regimes: RegimeService,
    weights: AdaptiveWeightManager,
    engine: ConfluenceEngine,
    store: Arc<SignalStore>,
    calculating: AtomicBool,
    records_tx: broadcast::Sender<SignalPerformanceRecord>,
}

impl SignalScheduler {
    pub fn new(
        config: Config,
        provider: Arc<dyn PriceDataProvider>,
        patterns: Arc<dyn PatternRecognition>,
    ) -> Arc<Self> {
        let (records_tx, _) = broadcast::channel(RECORD_CHANNEL_CAPACITY);
        let max_symbols = config.scheduler.symbols.len().max(1) * 4;
        Arc::new(Self {
            history: PriceHistoryStore::new(config.history.max_points),
            indicators: IndicatorSet::default(),
            regimes: RegimeService::new(config.regime.clone(), max_symbols),
            weights: AdaptiveWeightManager::new(config.weights.clone()),
            engine: ConfluenceEngine::new(config.confluence.clone()),
            store: SignalStore::new(DEFAULT_SIGNAL_CAPACITY),
            calculating: AtomicBool::new(false),
            records_tx,
            config,
            provider,
            patterns,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn history(&self) -> &Arc<PriceHistoryStore> {
        &self.history
    }

    pub fn store(&self) -> &Arc<SignalStore> {
        &self.store
    }

    pub fn state(&self) -> SchedulerState {
        if self.calculating.load(Ordering::Acquire) {
            SchedulerState::Calculating
        } else {
            SchedulerState::Idle
        }
    }

    /// Pending performance records as they are issued.
    pub fn subscribe_records(&self) -> broadcast::Receiver<SignalPerformanceRecord> {
        self.records_tx.subscribe()
    }

    /// Cached signals for a symbol; all timeframes when `timeframe` is None.
    pub fn get_signals(&self, symbol: &str, timeframe: Option<Timeframe>) -> Vec<Arc<Signal>> {
        self.store.get_signals(symbol, timeframe)
    }

    pub fn get_current_weights(&self) -> IndicatorWeightVector {
        self.weights.current_weights()
    }

    pub fn weight_snapshot(&self) -> Arc<WeightSnapshot> {
        self.weights.snapshot()
    }

    /// Last detected regime, or the unknown regime before any detection.
    pub fn get_market_regime(&self, symbol: &str) -> MarketRegime {
        self.regimes
            .get(symbol)
            .unwrap_or_else(MarketRegime::unknown)
    }

    /// Apply resolved outcomes, biased by the reference symbol's regime.
    pub fn update_weights_from_performance(
        &self,
        records: &[SignalPerformanceRecord],
    ) -> Arc<WeightSnapshot> {
        let regime = self.regimes.get(&self.config.regime.reference_symbol);
        let multipliers = regime.as_ref().map(|r| &r.regime_multipliers);
        self.weights.update_from_performance(records, multipliers)
    }

    /// Drop cached signals for a symbol.
    pub fn invalidate(&self, symbol: &str) -> usize {
        self.store.invalidate(symbol)
    }

    pub fn invalidate_all(&self) {
        self.store.invalidate_all();
    }

    /// Run one calculation pass unless one is already in progress.
    pub async fn tick(&self) -> TickOutcome {
        if self
            .calculating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Signal calculation still in progress; skipping tick");
            return TickOutcome::Skipped;
        }
        let _guard = CalculationGuard(&self.calculating);

        let started = Instant::now();
        let now = Utc::now();
        let report = self.calculate(now.timestamp(), now.timestamp_millis()).await;
        let report = TickReport {
            elapsed: started.elapsed(),
            ..report
        };

        info!(
            "Signal pass complete: {} updated, {} skipped, {} failed, {} issued in {:?}",
            report.updated.len(),
            report.skipped.len(),
            report.failed.len(),
            report.records.len(),
            report.elapsed
        );
        TickOutcome::Completed(report)
    }

    async fn calculate(&self, now_secs: i64, now_ms: i64) -> TickReport {
        let mut report = TickReport::default();
        let symbols = &self.config.scheduler.symbols;

        let quotes = match self.provider.get_batch_prices(symbols).await {
            Ok(quotes) => quotes,
            Err(e) => {
                error!("Batch price fetch failed: {}", e);
                HashMap::new()
            }
        };

        for symbol in symbols {
            let symbol = symbol.to_uppercase();
            let quote = match quotes.get(&symbol) {
                Some(q) if q.is_valid() => *q,
                Some(_) => {
                    self.skip_symbol(&symbol, "invalid quote", &mut report);
                    continue;
                }
                None => {
                    self.skip_symbol(&symbol, "missing from batch", &mut report);
                    continue;
                }
            };
            self.history.record(&symbol, &quote, now_secs);

            for &timeframe in &self.config.scheduler.timeframes {
                let key = Signal::cache_key(&symbol, timeframe);
                match self
                    .process_pair(&symbol, timeframe, &quote, now_secs, now_ms)
                    .await
                {
                    Ok(record) => {
                        report.updated.push(key);
                        if let Some(record) = record {
                            let _ = self.records_tx.send(record.clone());
                            report.records.push(record);
                        }
                    }
                    Err(e @ SignalError::InsufficientHistory { .. }) => {
                        debug!("Skipping {}: {}", key, e);
                        report.skipped.push(key);
                    }
                    Err(e) => {
                        warn!("Keeping previous signal for {}: {}", key, e);
                        report.failed.push(key);
                    }
                }
            }
        }

        report
    }

    fn skip_symbol(&self, symbol: &str, reason: &str, report: &mut TickReport) {
        warn!("{}", SignalError::data_unavailable(symbol, reason));
        for &timeframe in &self.config.scheduler.timeframes {
            report.skipped.push(Signal::cache_key(symbol, timeframe));
        }
    }

    /// Window for a pair according to the history policy.
    fn window_for(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        quote: &PriceQuote,
        now_secs: i64,
    ) -> Result<PriceWindow> {
        let points = self.history.window(symbol, timeframe);
        match self.config.history.policy {
            HistoryPolicy::Genuine { min_points } => {
                if points.len() < min_points {
                    return Err(SignalError::InsufficientHistory {
                        key: Signal::cache_key(symbol, timeframe),
                        have: points.len(),
                        need: min_points,
                    });
                }
                Ok(PriceWindow {
                    points,
                    synthetic: false,
                })
            }
            HistoryPolicy::Synthetic { window } => {
                if points.len() >= window {
                    return Ok(PriceWindow {
                        points,
                        synthetic: false,
                    });
                }
                Ok(PriceWindow {
                    points: synthesize_window(quote, timeframe, window, now_secs),
                    synthetic: true,
                })
            }
        }
    }

    fn regime_for(
        &self,
        symbol: &str,
        quote: &PriceQuote,
        now_secs: i64,
        now_ms: i64,
    ) -> MarketRegime {
        // An ineligible window still goes to the service, which falls back
        // to its last regime.
        let points = self
            .window_for(symbol, REGIME_TIMEFRAME, quote, now_secs)
            .map(|w| w.points)
            .unwrap_or_else(|_| self.history.window(symbol, REGIME_TIMEFRAME));
        self.regimes.resolve(symbol, &points, now_ms)
    }

    async fn process_pair(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        quote: &PriceQuote,
        now_secs: i64,
        now_ms: i64,
    ) -> Result<Option<SignalPerformanceRecord>> {
        let window = self.window_for(symbol, timeframe, quote, now_secs)?;
        let snapshot = self.indicators.evaluate(&window.points);
        let regime = self.regime_for(symbol, quote, now_secs, now_ms);

        let patterns = match self.patterns.get_patterns(symbol, timeframe).await {
            Ok(patterns) => patterns,
            Err(e) => {
                warn!("Patterns unavailable for {} {}: {}", symbol, timeframe, e);
                Vec::new()
            }
        };

        let weights = self.weights.snapshot();
        let result = self.engine.analyze(&ConfluenceInput {
            window: &window.points,
            snapshot: &snapshot,
            weights: &weights,
            regime: &regime,
            patterns: &patterns,
        });

        let key = Signal::cache_key(symbol, timeframe);
        if !result.confidence.is_finite() {
            return Err(SignalError::calculation(&key, "non-finite confidence"));
        }

        let levels =
            self.engine
                .trade_levels(quote.price, result.direction, quote.change_24h, timeframe);
        if result.direction != Direction::Neutral && levels.is_none() {
            return Err(SignalError::calculation(&key, "no trade levels for entry"));
        }

        let mut reasoning = result.reasoning;
        if window.synthetic {
            reasoning.insert(
                0,
                format!(
                    "History is synthetic ({} points derived from price and 24h change)",
                    window.points.len()
                ),
            );
        }

        let id = Uuid::new_v4();
        let record = (result.direction != Direction::Neutral).then(|| {
            SignalPerformanceRecord::pending(
                id,
                symbol,
                snapshot.agreeing_with(result.direction),
                now_ms,
            )
        });

        debug!(
            "{} -> {} score {:+.1} confidence {:.0}%",
            key,
            result.direction.label(),
            result.raw_score,
            result.confidence
        );

        self.store.put(Signal {
            id,
            symbol: symbol.to_string(),
            timeframe,
            direction: result.direction,
            confidence: result.confidence,
            raw_score: result.raw_score,
            entry_price: quote.price,
            stop_loss: levels.map(|l| l.stop_loss),
            take_profit: levels.map(|l| l.take_profit),
            timestamp: now_ms,
            indicator_snapshot: snapshot,
            breakdown: result.breakdown,
            reasoning,
        });

        Ok(record)
    }

    /// Tick on the configured interval until `shutdown` fires.
    ///
    /// Each tick runs on its own task so a slow pass never delays the timer;
    /// ticks that land during a pass are dropped by `tick`.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let period = self.config.scheduler.interval;
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "Signal scheduler started: {} symbols x {} timeframes every {:?}",
            self.config.scheduler.symbols.len(),
            self.config.scheduler.timeframes.len(),
            period
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let scheduler = Arc::clone(&self);
                    tokio::spawn(async move {
                        scheduler.tick().await;
                    });
                }
                _ = shutdown.recv() => {
                    info!("Signal scheduler stopping");
                    break;
                }
            }
        }
    }
}

/// Feed issued records to `handle` until the sender side closes.
///
/// A lagging receiver skips the records it missed and keeps going. Returns
/// the number of records skipped.
pub async fn consume_records<F>(
    mut records: broadcast::Receiver<SignalPerformanceRecord>,
    mut handle: F,
) -> u64
where
    F: FnMut(SignalPerformanceRecord),
{
    let mut missed_total = 0;
    loop {
        match records.recv().await {
            Ok(record) => handle(record),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!("Record subscriber lagged, {} records dropped", missed);
                missed_total += missed;
            }
            Err(broadcast::error::RecvError::Closed) => return missed_total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::{NoPatterns, StaticPriceProvider};

    fn scheduler(policy: HistoryPolicy) -> (Arc<SignalScheduler>, Arc<StaticPriceProvider>) {
        let mut config = Config::default();
        config.scheduler.symbols = vec!["BTC".to_string(), "ETH".to_string()];
        config.scheduler.timeframes = vec![Timeframe::OneHour, Timeframe::OneDay];
        config.history.policy = policy;

        let provider = Arc::new(StaticPriceProvider::new());
        provider.set_quote("BTC", PriceQuote::new(50_000.0, 4.0));
        provider.set_quote("ETH", PriceQuote::new(3_000.0, -6.0));
        let scheduler = SignalScheduler::new(config, provider.clone(), Arc::new(NoPatterns));
        (scheduler, provider)
    }

    #[tokio::test]
    async fn test_genuine_policy_skips_short_history() {
        let (scheduler, _) = scheduler(HistoryPolicy::Genuine { min_points: 30 });
        let outcome = scheduler.tick().await;
        let report = outcome.report().unwrap();
        assert!(report.updated.is_empty());
        assert_eq!(report.skipped.len(), 4);
        assert!(scheduler.get_signals("BTC", None).is_empty());
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test]
    async fn test_synthetic_policy_marks_reasoning() {
        let (scheduler, _) = scheduler(HistoryPolicy::Synthetic { window: 40 });
        let outcome = scheduler.tick().await;
        assert_eq!(outcome.report().unwrap().updated.len(), 4);

        let signals = scheduler.get_signals("ETH", None);
        assert_eq!(signals.len(), 2);
        for signal in signals {
            assert!(signal.reasoning[0].starts_with("History is synthetic"));
            assert!(signal.confidence >= 25.0 && signal.confidence <= 95.0);
        }
    }

    #[tokio::test]
    async fn test_missing_quote_skips_symbol() {
        let (scheduler, provider) = scheduler(HistoryPolicy::Synthetic { window: 40 });
        provider.fail_symbol("ETH");
        let outcome = scheduler.tick().await;
        let report = outcome.report().unwrap();
        assert_eq!(report.updated, vec!["BTC:1h".to_string(), "BTC:1d".to_string()]);
        assert_eq!(report.skipped, vec!["ETH:1h".to_string(), "ETH:1d".to_string()]);
    }

    #[tokio::test]
    async fn test_issued_records_are_broadcast() {
        let (scheduler, _) = scheduler(HistoryPolicy::Synthetic { window: 40 });
        let mut rx = scheduler.subscribe_records();
        let outcome = scheduler.tick().await;
        let report = outcome.report().unwrap();

        for record in &report.records {
            assert_eq!(&rx.recv().await.unwrap(), record);
            assert!(!record.is_resolved());
        }
        for key in &report.updated {
            let (symbol, tf) = key.split_once(':').unwrap();
            let signal = scheduler
                .store()
                .get(symbol, Timeframe::from_str(tf).unwrap())
                .unwrap();
            let issued = report.records.iter().any(|r| r.signal_id == signal.id);
            assert_eq!(issued, signal.direction != Direction::Neutral);
        }
    }

    #[tokio::test]
    async fn test_guard_resets_after_pass() {
        let (scheduler, _) = scheduler(HistoryPolicy::Synthetic { window: 40 });
        assert!(!scheduler.tick().await.is_skipped());
        assert!(!scheduler.tick().await.is_skipped());
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }
}
