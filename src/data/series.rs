use crate::error::{Result, TradepulseError};
use crate::types::{Bar, Timeframe};
use chrono::{DateTime, Utc};

/// Data-quality limits a series must satisfy before it is eligible for
/// labeling. Derived from [`crate::config::LabelingConfig`].
#[derive(Debug, Clone, Copy)]
pub struct SeriesQuality {
    pub min_len: usize,
    pub max_gap_bars: usize,
}

impl Default for SeriesQuality {
    fn default() -> Self {
        Self {
            min_len: 100,
            max_gap_bars: 3,
        }
    }
}

/// Immutable, time-ordered OHLCV sequence for one (symbol, timeframe).
/// Construction validates ordering, gaps, and candle sanity; a series that
/// exists is safe to simulate over.
#[derive(Debug, Clone)]
pub struct BarSeries {
    symbol: String,
    timeframe: Timeframe,
    bars: Vec<Bar>,
}

impl BarSeries {
    pub fn validated(
        symbol: impl Into<String>,
        timeframe: Timeframe,
        bars: Vec<Bar>,
        quality: &SeriesQuality,
    ) -> Result<Self> {
        let symbol = symbol.into();

        if bars.len() < quality.min_len.max(2) {
            return Err(TradepulseError::DataQuality {
                symbol,
                reason: format!(
                    "insufficient data: {} bars, minimum {} required",
                    bars.len(),
                    quality.min_len.max(2)
                ),
            });
        }

        let max_gap = timeframe.step() * quality.max_gap_bars as i32;

        for (i, window) in bars.windows(2).enumerate() {
            let (prev, next) = (&window[0], &window[1]);

            if next.timestamp <= prev.timestamp {
                return Err(TradepulseError::DataQuality {
                    symbol,
                    reason: format!(
                        "non-monotonic timestamps at index {}: {} then {}",
                        i + 1,
                        prev.timestamp,
                        next.timestamp
                    ),
                });
            }

            let gap = next.timestamp - prev.timestamp;
            if gap > max_gap {
                return Err(TradepulseError::DataQuality {
                    symbol,
                    reason: format!(
                        "gap of {} at index {} exceeds tolerance of {} bars",
                        gap,
                        i + 1,
                        quality.max_gap_bars
                    ),
                });
            }
        }

        for (i, bar) in bars.iter().enumerate() {
            if !(bar.open.is_finite()
                && bar.high.is_finite()
                && bar.low.is_finite()
                && bar.close.is_finite())
            {
                return Err(TradepulseError::DataQuality {
                    symbol,
                    reason: format!("non-finite price at index {}", i),
                });
            }
            if bar.high < bar.low
                || bar.high < bar.open
                || bar.high < bar.close
                || bar.low > bar.open
                || bar.low > bar.close
            {
                return Err(TradepulseError::DataQuality {
                    symbol,
                    reason: format!(
                        "invalid candle at index {}: open {} high {} low {} close {}",
                        i, bar.open, bar.high, bar.low, bar.close
                    ),
                });
            }
        }

        Ok(Self {
            symbol,
            timeframe,
            bars,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bar(&self, index: usize) -> &Bar {
        &self.bars[index]
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn timestamp(&self, index: usize) -> DateTime<Utc> {
        self.bars[index].timestamp
    }
}
