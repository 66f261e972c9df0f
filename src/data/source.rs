use super::csv::CsvConnector;
use super::series::{BarSeries, SeriesQuality};
use crate::error::{Result, TradepulseError};
use crate::types::{Bar, Timeframe};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;

/// Read boundary to the market-data store. Implementations must return bars
/// in strictly ascending timestamp order; the `BarSeries` constructor
/// re-checks this and converts violations into data-quality errors.
pub trait MarketDataSource: Send + Sync {
    /// Full history for one symbol/timeframe
    fn fetch(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        quality: &SeriesQuality,
    ) -> Result<BarSeries>;

    /// Range query by timestamp, inclusive start, exclusive end
    fn fetch_range(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        quality: &SeriesQuality,
    ) -> Result<BarSeries>;
}

/// Reads candle exports from a directory of `<symbol>_<timeframe>.csv` files
pub struct CsvDirectorySource {
    root: PathBuf,
}

impl CsvDirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, symbol: &str, timeframe: Timeframe) -> PathBuf {
        self.root
            .join(format!("{}_{}.csv", symbol, timeframe.as_str()))
    }
}

impl MarketDataSource for CsvDirectorySource {
    fn fetch(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        quality: &SeriesQuality,
    ) -> Result<BarSeries> {
        let path = self.path_for(symbol, timeframe);
        if !path.exists() {
            return Err(TradepulseError::DataQuality {
                symbol: symbol.to_string(),
                reason: format!("no export at {}", path.display()),
            });
        }
        CsvConnector::load_series(path, symbol, timeframe, quality)
    }

    fn fetch_range(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        quality: &SeriesQuality,
    ) -> Result<BarSeries> {
        let full = self.fetch(symbol, timeframe, quality)?;
        let bars: Vec<Bar> = full
            .bars()
            .iter()
            .filter(|b| b.timestamp >= start && b.timestamp < end)
            .copied()
            .collect();
        BarSeries::validated(symbol, timeframe, bars, quality)
    }
}

/// In-memory source used by tests and one-off backfills
#[derive(Default)]
pub struct InMemorySource {
    series: HashMap<(String, Timeframe), Vec<Bar>>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, symbol: impl Into<String>, timeframe: Timeframe, bars: Vec<Bar>) {
        self.series.insert((symbol.into(), timeframe), bars);
    }

    fn raw(&self, symbol: &str, timeframe: Timeframe) -> Result<&Vec<Bar>> {
        self.series
            .get(&(symbol.to_string(), timeframe))
            .ok_or_else(|| TradepulseError::DataQuality {
                symbol: symbol.to_string(),
                reason: format!("no data for timeframe {}", timeframe),
            })
    }
}

impl MarketDataSource for InMemorySource {
    fn fetch(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        quality: &SeriesQuality,
    ) -> Result<BarSeries> {
        let bars = self.raw(symbol, timeframe)?.clone();
        BarSeries::validated(symbol, timeframe, bars, quality)
    }

    fn fetch_range(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        quality: &SeriesQuality,
    ) -> Result<BarSeries> {
        let bars: Vec<Bar> = self
            .raw(symbol, timeframe)?
            .iter()
            .filter(|b| b.timestamp >= start && b.timestamp < end)
            .copied()
            .collect();
        BarSeries::validated(symbol, timeframe, bars, quality)
    }
}
