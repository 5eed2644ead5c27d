//! Unit tests for types module

use spectre::types::*;
use uuid::Uuid;

#[test]
fn test_timeframe_from_str() {
    assert_eq!(Timeframe::from_str("15m"), Some(Timeframe::FifteenMinutes));
    assert_eq!(Timeframe::from_str("1h"), Some(Timeframe::OneHour));
    assert_eq!(Timeframe::from_str(" 4H "), Some(Timeframe::FourHours));
    assert_eq!(Timeframe::from_str("1d"), Some(Timeframe::OneDay));
    assert_eq!(Timeframe::from_str("24h"), Some(Timeframe::OneDay));
    assert_eq!(Timeframe::from_str("invalid"), None);
}

#[test]
fn test_timeframe_seconds_and_multiplier() {
    assert_eq!(Timeframe::FifteenMinutes.seconds(), 900);
    assert_eq!(Timeframe::OneHour.seconds(), 3600);
    assert_eq!(Timeframe::FourHours.seconds(), 14400);
    assert_eq!(Timeframe::OneDay.seconds(), 86400);

    let multipliers: Vec<f64> = Timeframe::ALL
        .iter()
        .map(|tf| tf.volatility_multiplier())
        .collect();
    assert!(multipliers.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_timeframe_serialization() {
    let json = serde_json::to_string(&Timeframe::FourHours).unwrap();
    assert_eq!(json, "\"4h\"");

    let parsed: Timeframe = serde_json::from_str("\"15m\"").unwrap();
    assert_eq!(parsed, Timeframe::FifteenMinutes);
    assert_eq!(format!("{}", Timeframe::OneDay), "1d");
}

#[test]
fn test_indicator_kind_registry() {
    assert_eq!(IndicatorKind::ALL.len(), 6);
    assert_eq!(IndicatorKind::from_str("MACD"), Some(IndicatorKind::Macd));
    assert_eq!(IndicatorKind::from_str("stochastic"), None);
    assert_eq!(IndicatorKind::Bollinger.category(), IndicatorCategory::Volatility);
    assert_eq!(IndicatorKind::Vwap.category(), IndicatorCategory::Volume);
    assert_eq!(IndicatorKind::Rsi.category(), IndicatorCategory::Momentum);
    for kind in [IndicatorKind::Ema, IndicatorKind::Macd, IndicatorKind::Adx] {
        assert_eq!(kind.category(), IndicatorCategory::Trend);
    }
}

#[test]
fn test_indicator_signal_bias() {
    assert_eq!(IndicatorSignal::Buy.bias(), 1.0);
    assert_eq!(IndicatorSignal::Oversold.bias(), 1.0);
    assert_eq!(IndicatorSignal::Sell.bias(), -1.0);
    assert_eq!(IndicatorSignal::Overbought.bias(), -1.0);
    assert_eq!(IndicatorSignal::Neutral.bias(), 0.0);

    let reading = IndicatorReading::new(
        IndicatorKind::Rsi,
        82.0,
        IndicatorSignal::Overbought,
        SignalStrength::Strong,
    );
    assert_eq!(reading.vote(), -1.0);
}

#[test]
fn test_snapshot_agreeing_with() {
    let mut snapshot = IndicatorSnapshot::new();
    snapshot.insert(IndicatorReading::new(
        IndicatorKind::Ema,
        100.0,
        IndicatorSignal::Buy,
        SignalStrength::Moderate,
    ));
    snapshot.insert(IndicatorReading::new(
        IndicatorKind::Rsi,
        25.0,
        IndicatorSignal::Oversold,
        SignalStrength::Weak,
    ));
    snapshot.insert(IndicatorReading::neutral(IndicatorKind::Adx, 10.0));

    assert_eq!(
        snapshot.agreeing_with(Direction::Long),
        vec![IndicatorKind::Rsi, IndicatorKind::Ema]
    );
    assert!(snapshot.agreeing_with(Direction::Short).is_empty());
    assert!(snapshot.agreeing_with(Direction::Neutral).is_empty());
}

#[test]
fn test_direction_serialization() {
    assert_eq!(serde_json::to_string(&Direction::Long).unwrap(), "\"LONG\"");
    assert_eq!(Direction::from_sign(-3.0), Direction::Short);
    assert_eq!(Direction::from_sign(0.0), Direction::Neutral);
}

#[test]
fn test_signal_cache_key() {
    assert_eq!(Signal::cache_key("btc", Timeframe::OneHour), "BTC:1h");

    let signal = Signal {
        id: Uuid::new_v4(),
        symbol: "eth".to_string(),
        timeframe: Timeframe::OneDay,
        direction: Direction::Neutral,
        confidence: 50.0,
        raw_score: 0.0,
        entry_price: 3_000.0,
        stop_loss: None,
        take_profit: None,
        timestamp: 0,
        indicator_snapshot: IndicatorSnapshot::new(),
        breakdown: ComponentBreakdown::default(),
        reasoning: vec![],
    };
    assert_eq!(signal.key(), "ETH:1d");

    let json = serde_json::to_value(&signal).unwrap();
    assert!(json.get("stopLoss").is_none());
    assert_eq!(json["entryPrice"], 3_000.0);
}

#[test]
fn test_regime_multipliers() {
    let trend = RegimeType::BullTrend.multipliers();
    assert!(trend.get(IndicatorCategory::Trend) > trend.get(IndicatorCategory::Momentum));

    let sideways = RegimeType::Sideways.multipliers();
    assert!(sideways.get(IndicatorCategory::Momentum) > sideways.get(IndicatorCategory::Trend));

    assert_eq!(RegimeType::BullTrend.favored_direction(), Some(Direction::Long));
    assert_eq!(RegimeType::BearTrend.favored_direction(), Some(Direction::Short));
    assert_eq!(RegimeType::HighVolatility.favored_direction(), None);

    let unknown = MarketRegime::unknown();
    assert_eq!(unknown.confidence, 0.0);
    assert_eq!(
        unknown.regime_multipliers.get(IndicatorCategory::Volume),
        1.0
    );
}

#[test]
fn test_performance_record_lifecycle() {
    let id = Uuid::new_v4();
    let record = SignalPerformanceRecord::pending(id, "SOL", vec![IndicatorKind::Macd], 1_000);
    assert!(!record.is_resolved());
    assert_eq!(record.outcome, SignalOutcome::Pending);

    let resolved = record.resolve(SignalOutcome::Success, 4.2);
    assert!(resolved.is_resolved());
    assert_eq!(resolved.signal_id, id);
    assert_eq!(resolved.realized_return, 4.2);
}

#[test]
fn test_price_quote_validity() {
    assert!(PriceQuote::new(1.0, 0.0).is_valid());
    assert!(!PriceQuote::new(0.0, 0.0).is_valid());
    assert!(!PriceQuote::new(-5.0, 1.0).is_valid());
    assert!(!PriceQuote::new(f64::INFINITY, 1.0).is_valid());
    assert!(!PriceQuote::new(10.0, f64::NAN).is_valid());
}
