use super::traits::ConfigSection;
use crate::error::TradepulseError;
use serde::{Deserialize, Serialize};

/// Settings for the parallel label-generation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelingConfig {
    /// Minimum bars a symbol needs before it is worth labeling at all
    pub min_series_len: usize,
    /// Largest tolerated gap between consecutive candles, as a multiple of
    /// the timeframe step. Wider gaps disqualify the symbol.
    pub max_gap_bars: usize,
    /// Worker pool size; 0 means one worker per available CPU core
    pub workers: usize,
    /// Universe of symbols labeled per job
    pub symbols: Vec<String>,
    /// Directory of candle CSV exports, one `<symbol>_<timeframe>.csv` each
    pub data_dir: String,
}

impl Default for LabelingConfig {
    fn default() -> Self {
        Self {
            min_series_len: 100,
            max_gap_bars: 3,
            workers: 0,
            symbols: Vec::new(),
            data_dir: "data".to_string(),
        }
    }
}

impl ConfigSection for LabelingConfig {
    fn section_name() -> &'static str {
        "labeling"
    }

    fn validate(&self) -> Result<(), TradepulseError> {
        if self.min_series_len < 2 {
            return Err(TradepulseError::Validation(
                "min_series_len must be >= 2".to_string(),
            ));
        }
        if self.max_gap_bars < 1 {
            return Err(TradepulseError::Validation(
                "max_gap_bars must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}
