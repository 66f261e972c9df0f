use crate::error::TradepulseError;
use crate::types::Timeframe;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Per-job training parameters, validated at submission time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingParams {
    pub n_trials: usize,
    /// Fraction of labels used for training; the rest is held out, split
    /// temporally (never shuffled)
    pub train_ratio: f64,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            n_trials: 20,
            train_ratio: 0.8,
        }
    }
}

impl TrainingParams {
    pub fn validate(&self) -> Result<(), TradepulseError> {
        if self.n_trials == 0 {
            return Err(TradepulseError::Validation(
                "n_trials must be >= 1".to_string(),
            ));
        }
        if !(self.train_ratio > 0.0 && self.train_ratio < 1.0) {
            return Err(TradepulseError::Validation(format!(
                "train_ratio must be in (0, 1), got {}",
                self.train_ratio
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl FromStr for JobStatus {
    type Err = TradepulseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(JobStatus::Pending),
            "RUNNING" => Ok(JobStatus::Running),
            "COMPLETED" => Ok(JobStatus::Completed),
            "FAILED" => Ok(JobStatus::Failed),
            "CANCELLED" => Ok(JobStatus::Cancelled),
            other => Err(TradepulseError::Validation(format!(
                "Unknown job status: {}",
                other
            ))),
        }
    }
}

/// Persisted request/state for one asynchronous training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: i64,
    pub timeframe: Timeframe,
    pub params: TrainingParams,
    pub status: JobStatus,
    pub progress_pct: f64,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub cancel_requested: bool,
    /// Evaluation metrics written back by the training collaborator on
    /// completion; opaque to the queue itself
    pub metrics: Option<serde_json::Value>,
}
