use crate::error::Result;
use crate::jobs::record::TrainingParams;
use crate::types::{Direction, LabelRecord, Timeframe};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Progress/cancellation hooks for a training run. Trial granularity is the
/// natural checkpoint for the model-fitting side.
pub trait TrainingObserver: Sync {
    fn on_trial_complete(&self, completed: usize, total: usize) {
        let _ = (completed, total);
    }

    fn should_cancel(&self) -> bool {
        false
    }
}

pub struct NoopTrainingObserver;

impl TrainingObserver for NoopTrainingObserver {}

/// Boundary to the model-fitting collaborator. The production implementation
/// (gradient-boosted trees plus hyperparameter search) lives outside this
/// crate; anything implementing this trait can be plugged into the daemon.
pub trait ModelTrainer: Send + Sync {
    fn train(
        &self,
        records: &[LabelRecord],
        timeframe: Timeframe,
        params: &TrainingParams,
        observer: &dyn TrainingObserver,
    ) -> Result<TrainingReport>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalMetrics {
    pub rmse: f64,
    pub mean_abs_error: f64,
    /// Share of held-out outcomes whose sign the model got right
    pub hit_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionReport {
    pub direction: Direction,
    pub train_samples: usize,
    pub test_samples: usize,
    pub metrics: EvalMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub model_version: String,
    pub feature_names: Vec<String>,
    pub reports: Vec<DirectionReport>,
}

impl TrainingReport {
    /// Compact metrics document written back onto the job record
    pub fn metrics_json(&self) -> serde_json::Value {
        let mut doc = serde_json::Map::new();
        doc.insert(
            "model_version".to_string(),
            serde_json::Value::String(self.model_version.clone()),
        );
        for report in &self.reports {
            doc.insert(
                report.direction.as_str().to_string(),
                serde_json::json!({
                    "rmse": report.metrics.rmse,
                    "mean_abs_error": report.metrics.mean_abs_error,
                    "hit_rate": report.metrics.hit_rate,
                    "train_samples": report.train_samples,
                    "test_samples": report.test_samples,
                }),
            );
        }
        serde_json::Value::Object(doc)
    }
}

/// Metadata artifact the dashboard reads independently of the job queue.
/// The schema is an external contract; this crate populates it but does not
/// interpret it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_version: String,
    pub timeframe: Timeframe,
    pub features: Vec<String>,
    pub reports: Vec<DirectionReport>,
    pub trained_at: DateTime<Utc>,
}

impl ModelMetadata {
    pub fn from_report(timeframe: Timeframe, report: &TrainingReport) -> Self {
        Self {
            model_version: report.model_version.clone(),
            timeframe,
            features: report.feature_names.clone(),
            reports: report.reports.clone(),
            trained_at: Utc::now(),
        }
    }

    /// Writes `model_<timeframe>.json` into `dir`, returning the path
    pub fn write_to(&self, dir: &std::path::Path) -> Result<std::path::PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("model_{}.json", self.timeframe.as_str()));
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }
}
