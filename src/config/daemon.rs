use super::traits::ConfigSection;
use crate::error::TradepulseError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Training-job daemon settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Seconds between queue polls when idle
    pub poll_interval_secs: u64,
    /// Directory the model metadata artifact is written into on completion
    pub artifact_dir: String,
    /// SQLite database holding the job queue and label table
    pub db_path: String,
}

impl DaemonConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            artifact_dir: "artifacts".to_string(),
            db_path: "tradepulse.db".to_string(),
        }
    }
}

impl ConfigSection for DaemonConfig {
    fn section_name() -> &'static str {
        "daemon"
    }

    fn validate(&self) -> Result<(), TradepulseError> {
        if self.poll_interval_secs == 0 {
            return Err(TradepulseError::Validation(
                "poll_interval_secs must be >= 1".to_string(),
            ));
        }
        if self.artifact_dir.is_empty() {
            return Err(TradepulseError::Validation(
                "artifact_dir must not be empty".to_string(),
            ));
        }
        if self.db_path.is_empty() {
            return Err(TradepulseError::Validation(
                "db_path must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
