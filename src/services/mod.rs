pub mod cache;
pub mod history;
pub mod providers;
pub mod signals;

pub use cache::{Cache, Cached};
pub use history::{synthesize_window, PriceHistoryStore};
pub use providers::{
    BoxFuture, NoPatterns, PatternRecognition, PriceDataProvider, StaticPatterns,
    StaticPriceProvider,
};
pub use signals::{
    consume_records, AdaptiveWeightManager, ConfluenceEngine, IndicatorSet, RegimeService, SchedulerState,
    SignalScheduler, SignalStore, TickOutcome, TickReport, WeightSnapshot,
};
