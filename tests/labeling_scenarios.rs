use chrono::{TimeZone, Utc};
use tradepulse::config::{EarlyExitThreshold, ExitPolicy, LabelingConfig};
use tradepulse::data::{BarSeries, InMemorySource, SeriesQuality};
use tradepulse::labeling::{BarrierSimulator, LabelGenerator, NoopObserver};
use tradepulse::types::{Bar, Direction, ExitType, Timeframe};

/// The policy used by the worked scenarios: 2% stop, trailing armed at 1.5%
/// with 0.5% distance, 10-bar holding period, one 1%-within-4-bars early tier
fn scenario_policy() -> ExitPolicy {
    ExitPolicy {
        stop_loss_pct: 0.02,
        trailing_activation_pct: 0.015,
        trailing_distance_pct: 0.005,
        max_holding_bars: 10,
        early_exit_thresholds: vec![EarlyExitThreshold {
            max_bars: 4,
            adverse_excursion_pct: 0.01,
            label: "immediate".to_string(),
        }],
    }
}

fn flat_bars(prices: &[f64]) -> Vec<Bar> {
    prices
        .iter()
        .enumerate()
        .map(|(i, &p)| Bar {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                + chrono::Duration::hours(i as i64),
            open: p,
            high: p,
            low: p,
            close: p,
            volume: 1000.0,
        })
        .collect()
}

fn series(prices: &[f64]) -> BarSeries {
    let quality = SeriesQuality {
        min_len: 2,
        max_gap_bars: 3,
    };
    BarSeries::validated("BTCUSDT", Timeframe::H1, flat_bars(prices), &quality).unwrap()
}

fn padded(prices: &[f64], to_len: usize) -> Vec<f64> {
    let mut out = prices.to_vec();
    let last = *prices.last().unwrap();
    while out.len() < to_len {
        out.push(last);
    }
    out
}

#[test]
fn scenario_early_exit_within_four_bars() {
    // Long entry at 100; path 99.3, 98.9: 1.1% adverse at bar 2 trips the
    // 1%-within-4-bars tier
    let policy = scenario_policy();
    let series = series(&padded(&[100.0, 99.3, 98.9], 12));
    let sim = BarrierSimulator::new(&policy);

    let outcome = sim.simulate(&series, 0, Direction::Long).unwrap();
    assert_eq!(
        outcome.exit_type,
        ExitType::EarlyExit("immediate".to_string())
    );
    assert_eq!(outcome.exit_type.as_label(), "early_exit_immediate");
    assert_eq!(outcome.bars_held, 2);
    assert!((outcome.realized_return - (-0.011)).abs() < 1e-9);
}

#[test]
fn scenario_trailing_stop_locks_in_gain() {
    // 101.6 arms the trail (1.6% favorable); level = 101.6 * 0.995 = 101.092;
    // 101.0 crosses it on the next bar
    let policy = scenario_policy();
    let series = series(&padded(&[100.0, 101.6, 101.0], 12));
    let sim = BarrierSimulator::new(&policy);

    let outcome = sim.simulate(&series, 0, Direction::Long).unwrap();
    assert_eq!(outcome.exit_type, ExitType::TrailingStop);
    assert_eq!(outcome.bars_held, 2);
    assert!((outcome.realized_return - 0.01).abs() < 1e-9);
}

#[test]
fn scenario_flat_path_times_out() {
    let policy = scenario_policy();
    let series = series(&padded(&[100.0, 100.05], 12));
    let sim = BarrierSimulator::new(&policy);

    let outcome = sim.simulate(&series, 0, Direction::Long).unwrap();
    assert_eq!(outcome.exit_type, ExitType::TimeExit);
    assert_eq!(outcome.bars_held, 10);
}

#[test]
fn property_stop_loss_dominates_trailing_on_same_bar() {
    // Bar 2 simultaneously crosses the armed trailing level and the 2% stop;
    // loss control must win the taxonomy
    let policy = scenario_policy();
    let series = series(&padded(&[100.0, 101.6, 97.9], 12));
    let sim = BarrierSimulator::new(&policy);

    let outcome = sim.simulate(&series, 0, Direction::Long).unwrap();
    assert_eq!(outcome.exit_type, ExitType::StopLoss);
}

#[test]
fn property_exactly_one_resolution_within_holding_period() {
    let policy = scenario_policy();
    let prices = padded(
        &[100.0, 100.3, 99.9, 100.8, 100.1, 99.8, 100.5, 100.2],
        40,
    );
    let series = series(&prices);
    let sim = BarrierSimulator::new(&policy);

    for entry in 0..(series.len() - policy.max_holding_bars) {
        for direction in Direction::all() {
            let outcome = sim.simulate(&series, entry, direction).unwrap();
            assert_ne!(
                outcome.exit_type,
                ExitType::Incomplete,
                "entry {} should resolve",
                entry
            );
            assert!(outcome.bars_held <= policy.max_holding_bars);
            assert!(outcome.mfe >= outcome.realized_return.max(0.0));
            assert!(outcome.mae <= outcome.realized_return.min(0.0));
        }
    }
}

#[test]
fn property_generator_output_is_reproducible() {
    let mut source = InMemorySource::new();
    for (offset, symbol) in ["BTCUSDT", "ETHUSDT", "SOLUSDT"].iter().enumerate() {
        let prices: Vec<f64> = (0..60)
            .map(|i| 100.0 + ((i + offset) % 9) as f64 * 0.12)
            .collect();
        source.insert(*symbol, Timeframe::H1, flat_bars(&prices));
    }
    let symbols: Vec<String> = ["BTCUSDT", "ETHUSDT", "SOLUSDT"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let labeling = LabelingConfig {
        min_series_len: 20,
        max_gap_bars: 3,
        workers: 3,
        ..LabelingConfig::default()
    };
    let generator = LabelGenerator::new(scenario_policy(), &labeling).unwrap();

    let first = generator
        .generate(&source, &symbols, Timeframe::H1, &NoopObserver)
        .unwrap();
    let second = generator
        .generate(&source, &symbols, Timeframe::H1, &NoopObserver)
        .unwrap();

    assert!(!first.records.is_empty());
    assert_eq!(first.records, second.records);

    // Byte-identical, not just structurally equal
    let a = serde_json::to_vec(&first.records).unwrap();
    let b = serde_json::to_vec(&second.records).unwrap();
    assert_eq!(a, b);
}

#[test]
fn property_score_equals_realized_return() {
    let mut source = InMemorySource::new();
    let prices: Vec<f64> = (0..40).map(|i| 100.0 + (i % 6) as f64 * 0.1).collect();
    source.insert("BTCUSDT", Timeframe::H1, flat_bars(&prices));

    let labeling = LabelingConfig {
        min_series_len: 20,
        max_gap_bars: 3,
        workers: 1,
        ..LabelingConfig::default()
    };
    let generator = LabelGenerator::new(scenario_policy(), &labeling).unwrap();
    let output = generator
        .generate(
            &source,
            &["BTCUSDT".to_string()],
            Timeframe::H1,
            &NoopObserver,
        )
        .unwrap();

    for record in &output.records {
        assert_eq!(record.score, record.realized_return);
        assert_ne!(record.exit_type, ExitType::Incomplete);
    }
}
