use super::record::{JobRecord, TrainingParams};
use super::store::JobStore;
use crate::error::Result;
use crate::types::Timeframe;
use std::sync::Arc;

/// Submission/monitoring surface consumed by the dashboard. A thin,
/// string-friendly wrapper over the store so callers never construct typed
/// parameters themselves.
#[derive(Clone)]
pub struct JobsApi {
    store: Arc<dyn JobStore>,
}

impl JobsApi {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    pub fn submit_training_job(
        &self,
        timeframe: &str,
        n_trials: usize,
        train_ratio: f64,
    ) -> Result<i64> {
        let timeframe: Timeframe = timeframe.parse()?;
        self.store.submit(
            timeframe,
            TrainingParams {
                n_trials,
                train_ratio,
            },
        )
    }

    pub fn get_job_status(&self, job_id: i64) -> Result<JobRecord> {
        self.store.get(job_id)
    }

    pub fn cancel_job(&self, job_id: i64) -> Result<bool> {
        self.store.request_cancel(job_id)
    }

    pub fn get_active_job(&self, timeframe: Option<&str>) -> Result<Option<JobRecord>> {
        let timeframe = timeframe.map(|s| s.parse()).transpose()?;
        self.store.get_active(timeframe)
    }

    pub fn get_recent_jobs(&self, limit: usize) -> Result<Vec<JobRecord>> {
        self.store.get_recent(limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::store::SqliteJobStore;
    use crate::jobs::record::JobStatus;

    fn api() -> JobsApi {
        JobsApi::new(Arc::new(SqliteJobStore::in_memory().unwrap()))
    }

    #[test]
    fn test_submit_and_inspect() {
        let api = api();
        let id = api.submit_training_job("1h", 10, 0.8).unwrap();
        let record = api.get_job_status(id).unwrap();
        assert_eq!(record.status, JobStatus::Pending);
        assert_eq!(record.params.n_trials, 10);
    }

    #[test]
    fn test_unsupported_timeframe_rejected() {
        let api = api();
        assert!(api.submit_training_job("7h", 10, 0.8).is_err());
    }

    #[test]
    fn test_bad_ratio_rejected() {
        let api = api();
        assert!(api.submit_training_job("1h", 10, 0.0).is_err());
        assert!(api.submit_training_job("1h", 10, 1.0).is_err());
    }

    #[test]
    fn test_cancel_and_recent() {
        let api = api();
        let id = api.submit_training_job("1h", 10, 0.8).unwrap();
        assert!(api.cancel_job(id).unwrap());
        assert_eq!(
            api.get_job_status(id).unwrap().status,
            JobStatus::Cancelled
        );
        assert_eq!(api.get_recent_jobs(5).unwrap().len(), 1);
        assert!(api.get_active_job(None).unwrap().is_none());
    }
}
