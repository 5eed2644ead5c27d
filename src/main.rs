use spectre::services::{consume_records, NoPatterns, SignalScheduler, StaticPriceProvider};
use spectre::{Config, HistoryPolicy, PriceQuote};
use std::f64::consts::PI;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Seconds between demo quote updates.
const DEMO_FEED_PERIOD: Duration = Duration::from_secs(15);

/// Base prices for the demo feed.
fn demo_base_price(symbol: &str) -> f64 {
    match symbol {
        "BTC" => 64_000.0,
        "ETH" => 3_200.0,
        "SOL" => 145.0,
        _ => 100.0,
    }
}

/// Deterministic quote for `symbol` at feed step `step`.
fn demo_quote(symbol: &str, index: usize, step: u64) -> PriceQuote {
    let phase = step as f64 / 40.0 * 2.0 * PI + index as f64;
    let change_24h = 3.0 * phase.sin();
    let price = demo_base_price(symbol) * (1.0 + change_24h / 100.0);
    PriceQuote {
        volume_24h: Some(1_000.0 + 250.0 * (phase * 3.0).cos().abs()),
        ..PriceQuote::new(price, change_24h)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spectre=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();
    info!(
        "Starting Spectre for {:?} on {:?} every {:?}",
        config.scheduler.symbols,
        config
            .scheduler
            .timeframes
            .iter()
            .map(|tf| tf.as_str())
            .collect::<Vec<_>>(),
        config.scheduler.interval
    );
    if let HistoryPolicy::Genuine { min_points } = config.history.policy {
        info!(
            "Genuine history policy: pairs become eligible after {} recorded buckets",
            min_points
        );
    }

    // Demo price feed
    let provider = Arc::new(StaticPriceProvider::new());
    let symbols = config.scheduler.symbols.clone();
    for (i, symbol) in symbols.iter().enumerate() {
        provider.set_quote(symbol, demo_quote(symbol, i, 0));
    }

    let feed = provider.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(DEMO_FEED_PERIOD);
        let mut step = 0u64;
        loop {
            interval.tick().await;
            step += 1;
            for (i, symbol) in symbols.iter().enumerate() {
                feed.set_quote(symbol, demo_quote(symbol, i, step));
            }
        }
    });

    let scheduler = SignalScheduler::new(config, provider, Arc::new(NoPatterns));

    // Issued signals would go to an outcome tracker; log them here.
    let records = scheduler.subscribe_records();
    tokio::spawn(consume_records(records, |record| {
        debug!(
            "Issued signal {} for {} ({} agreeing indicators)",
            record.signal_id,
            record.symbol,
            record.indicator_context.len()
        );
    }));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let runner = tokio::spawn(scheduler.clone().run(shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    let _ = shutdown_tx.send(());
    runner.await?;

    Ok(())
}
