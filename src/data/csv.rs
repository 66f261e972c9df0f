use super::series::{BarSeries, SeriesQuality};
use crate::error::{Result, TradepulseError};
use crate::types::{Bar, Timeframe};
use chrono::{DateTime, TimeZone, Utc};
use polars::prelude::*;
use std::path::Path;

const REQUIRED_COLUMNS: [&str; 6] = ["timestamp", "open", "high", "low", "close", "volume"];

/// Loads candle CSV exports (one file per symbol/timeframe) into validated
/// bar series. Expected columns: timestamp (epoch milliseconds), open, high,
/// low, close, volume.
pub struct CsvConnector;

impl CsvConnector {
    /// Load CSV file into DataFrame
    pub fn load<P: AsRef<Path>>(path: P) -> Result<DataFrame> {
        let df = CsvReadOptions::default()
            .try_into_reader_with_file_path(Some(path.as_ref().to_path_buf()))?
            .finish()
            .map_err(|e| {
                TradepulseError::Validation(format!(
                    "Failed to read CSV {}: {}",
                    path.as_ref().display(),
                    e
                ))
            })?;

        Ok(df)
    }

    /// Load a CSV file and convert it into a quality-checked series
    pub fn load_series<P: AsRef<Path>>(
        path: P,
        symbol: &str,
        timeframe: Timeframe,
        quality: &SeriesQuality,
    ) -> Result<BarSeries> {
        let df = Self::load(path)?;
        Self::series_from_dataframe(&df, symbol, timeframe, quality)
    }

    pub fn series_from_dataframe(
        df: &DataFrame,
        symbol: &str,
        timeframe: Timeframe,
        quality: &SeriesQuality,
    ) -> Result<BarSeries> {
        for col in REQUIRED_COLUMNS {
            if df.column(col).is_err() {
                return Err(TradepulseError::DataQuality {
                    symbol: symbol.to_string(),
                    reason: format!("missing required column: {}", col),
                });
            }
        }

        let ts = df.column("timestamp")?.cast(&DataType::Int64)?;
        let ts = ts.i64()?;
        let open = df.column("open")?.cast(&DataType::Float64)?;
        let open = open.f64()?;
        let high = df.column("high")?.cast(&DataType::Float64)?;
        let high = high.f64()?;
        let low = df.column("low")?.cast(&DataType::Float64)?;
        let low = low.f64()?;
        let close = df.column("close")?.cast(&DataType::Float64)?;
        let close = close.f64()?;
        let volume = df.column("volume")?.cast(&DataType::Float64)?;
        let volume = volume.f64()?;

        let mut bars = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let row = (
                ts.get(i),
                open.get(i),
                high.get(i),
                low.get(i),
                close.get(i),
                volume.get(i),
            );
            let (Some(t), Some(o), Some(h), Some(l), Some(c), Some(v)) = row else {
                return Err(TradepulseError::DataQuality {
                    symbol: symbol.to_string(),
                    reason: format!("null value at row {}", i),
                });
            };
            bars.push(Bar {
                timestamp: epoch_ms_to_datetime(symbol, t)?,
                open: o,
                high: h,
                low: l,
                close: c,
                volume: v,
            });
        }

        BarSeries::validated(symbol, timeframe, bars, quality)
    }
}

fn epoch_ms_to_datetime(symbol: &str, ms: i64) -> Result<DateTime<Utc>> {
    match Utc.timestamp_millis_opt(ms) {
        chrono::LocalResult::Single(dt) => Ok(dt),
        _ => Err(TradepulseError::DataQuality {
            symbol: symbol.to_string(),
            reason: format!("timestamp {} is out of range", ms),
        }),
    }
}
