use super::simulator::BarrierSimulator;
use crate::config::traits::ConfigSection;
use crate::config::{ExitPolicy, LabelingConfig};
use crate::data::{MarketDataSource, SeriesQuality};
use crate::error::{Result, TradepulseError};
use crate::types::{Direction, ExitType, LabelRecord, Timeframe};
use log::{info, warn};
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Receives per-symbol completion events and can request cooperative
/// cancellation. Called from worker threads.
pub trait GenerationObserver: Sync {
    fn on_symbol_complete(&self, completed: usize, total: usize) {
        let _ = (completed, total);
    }

    fn should_cancel(&self) -> bool {
        false
    }
}

pub struct NoopObserver;

impl GenerationObserver for NoopObserver {}

/// A symbol excluded from the run for data-quality reasons
#[derive(Debug, Clone)]
pub struct SymbolSkip {
    pub symbol: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct GenerationOutput {
    pub records: Vec<LabelRecord>,
    pub skipped: Vec<SymbolSkip>,
}

enum SymbolOutcome {
    Labeled(Vec<LabelRecord>),
    Skipped(SymbolSkip),
}

/// Drives the barrier simulator over every eligible entry candle of every
/// symbol, both directions. Symbols are independent and processed by a
/// bounded worker pool; per-symbol outputs are concatenated in input order so
/// reruns on identical data are byte-identical.
pub struct LabelGenerator {
    policy: ExitPolicy,
    quality: SeriesQuality,
    workers: usize,
}

impl LabelGenerator {
    pub fn new(policy: ExitPolicy, labeling: &LabelingConfig) -> Result<Self> {
        policy.validate()?;
        Ok(Self {
            policy,
            quality: SeriesQuality {
                min_len: labeling.min_series_len,
                max_gap_bars: labeling.max_gap_bars,
            },
            workers: labeling.workers,
        })
    }

    pub fn generate(
        &self,
        source: &dyn MarketDataSource,
        symbols: &[String],
        timeframe: Timeframe,
        observer: &dyn GenerationObserver,
    ) -> Result<GenerationOutput> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
            .map_err(|e| TradepulseError::JobExecution(format!("worker pool: {}", e)))?;

        let completed = AtomicUsize::new(0);
        let total = symbols.len();

        let outcomes: Vec<Result<SymbolOutcome>> = pool.install(|| {
            symbols
                .par_iter()
                .map(|symbol| {
                    // Cancellation checkpoint: once per symbol, before any work
                    if observer.should_cancel() {
                        return Err(TradepulseError::Cancelled);
                    }

                    let outcome = self.label_symbol(source, symbol, timeframe);
                    let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    observer.on_symbol_complete(done, total);
                    outcome
                })
                .collect()
        });

        let mut output = GenerationOutput::default();
        for outcome in outcomes {
            match outcome? {
                SymbolOutcome::Labeled(records) => output.records.extend(records),
                SymbolOutcome::Skipped(skip) => {
                    warn!("skipping {}: {}", skip.symbol, skip.reason);
                    output.skipped.push(skip);
                }
            }
        }

        info!(
            "labeled {} entries across {} symbols ({} skipped) on {}",
            output.records.len(),
            total - output.skipped.len(),
            output.skipped.len(),
            timeframe
        );
        Ok(output)
    }

    fn label_symbol(
        &self,
        source: &dyn MarketDataSource,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<SymbolOutcome> {
        let series = match source.fetch(symbol, timeframe, &self.quality) {
            Ok(series) => series,
            // Bad data disqualifies the symbol, not the run
            Err(TradepulseError::DataQuality { symbol, reason }) => {
                return Ok(SymbolOutcome::Skipped(SymbolSkip { symbol, reason }));
            }
            Err(e) => return Err(e),
        };

        if series.len() <= self.policy.max_holding_bars {
            return Ok(SymbolOutcome::Skipped(SymbolSkip {
                symbol: symbol.to_string(),
                reason: format!(
                    "{} bars cannot cover a {}-bar holding period",
                    series.len(),
                    self.policy.max_holding_bars
                ),
            }));
        }

        let simulator = BarrierSimulator::new(&self.policy);
        let last_entry = series.len() - 1 - self.policy.max_holding_bars;
        let mut records = Vec::with_capacity((last_entry + 1) * 2);

        for entry_index in 0..=last_entry {
            for direction in Direction::all() {
                let outcome = simulator.simulate(&series, entry_index, direction)?;
                if outcome.exit_type == ExitType::Incomplete {
                    continue;
                }
                records.push(LabelRecord {
                    symbol: series.symbol().to_string(),
                    timeframe,
                    timestamp: series.timestamp(entry_index),
                    direction,
                    score: outcome.realized_return,
                    realized_return: outcome.realized_return,
                    mfe: outcome.mfe,
                    mae: outcome.mae,
                    bars_held: outcome.bars_held,
                    exit_type: outcome.exit_type,
                });
            }
        }

        Ok(SymbolOutcome::Labeled(records))
    }
}
