use super::record::{JobRecord, JobStatus, TrainingParams};
use crate::error::{Result, TradepulseError};
use crate::types::Timeframe;
use chrono::{DateTime, Utc};
use log::info;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Row, TransactionBehavior};
use std::path::Path;
use std::str::FromStr;

/// Persistence boundary for the job queue.
///
/// Status advancement (claim, progress, terminal transitions) has a single
/// writer, the daemon; external actors only submit new PENDING records or
/// flip `cancel_requested`, which is an independent column and never races
/// the status writes.
pub trait JobStore: Send + Sync {
    /// Insert a PENDING record; `Validation` error for bad parameters
    fn submit(&self, timeframe: Timeframe, params: TrainingParams) -> Result<i64>;

    /// Atomically claim the oldest PENDING job: PENDING -> RUNNING with
    /// `started_at` set. Refuses while any job is RUNNING so at most one job
    /// runs system-wide, and stays correct under concurrent callers.
    fn claim_next(&self) -> Result<Option<JobRecord>>;

    /// Monotonically non-decreasing; decreasing updates are rejected
    fn report_progress(&self, job_id: i64, pct: f64) -> Result<()>;

    /// Allowed while PENDING or RUNNING. A PENDING job cancels immediately;
    /// a RUNNING one gets the flag set for the daemon to observe. Returns
    /// whether the request was accepted.
    fn request_cancel(&self, job_id: i64) -> Result<bool>;

    fn is_cancel_requested(&self, job_id: i64) -> Result<bool>;

    /// RUNNING -> COMPLETED with metrics written back
    fn complete(&self, job_id: i64, metrics: &serde_json::Value) -> Result<()>;

    /// RUNNING -> FAILED with a human-readable message
    fn fail(&self, job_id: i64, error: &str) -> Result<()>;

    /// RUNNING -> CANCELLED, after the daemon observed the cancel flag
    fn cancel(&self, job_id: i64) -> Result<()>;

    fn get(&self, job_id: i64) -> Result<JobRecord>;

    /// The PENDING or RUNNING job, optionally filtered by timeframe
    fn get_active(&self, timeframe: Option<Timeframe>) -> Result<Option<JobRecord>>;

    fn get_recent(&self, limit: usize) -> Result<Vec<JobRecord>>;

    /// Fail any job left RUNNING by a dead daemon. Called once at startup;
    /// returns how many jobs were orphaned.
    fn fail_orphaned(&self) -> Result<usize>;
}

pub struct SqliteJobStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteJobStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path.as_ref());
        let pool = Pool::builder().max_size(4).build(manager)?;
        let store = Self { pool };
        store.initialize_schema()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager)?;
        let store = Self { pool };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS training_jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timeframe TEXT NOT NULL,
                n_trials INTEGER NOT NULL,
                train_ratio REAL NOT NULL,
                status TEXT NOT NULL,
                progress_pct REAL NOT NULL DEFAULT 0.0,
                created_at TEXT NOT NULL,
                started_at TEXT,
                completed_at TEXT,
                error_message TEXT,
                cancel_requested INTEGER NOT NULL DEFAULT 0,
                metrics_json TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_training_jobs_status ON training_jobs(status);",
        )?;
        Ok(())
    }

    fn row_to_record(row: &Row<'_>) -> rusqlite::Result<JobRecord> {
        let timeframe: String = row.get("timeframe")?;
        let status: String = row.get("status")?;
        let metrics_json: Option<String> = row.get("metrics_json")?;

        Ok(JobRecord {
            id: row.get("id")?,
            timeframe: Timeframe::from_str(&timeframe).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())),
                )
            })?,
            params: TrainingParams {
                n_trials: row.get::<_, i64>("n_trials")? as usize,
                train_ratio: row.get("train_ratio")?,
            },
            status: JobStatus::from_str(&status).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())),
                )
            })?,
            progress_pct: row.get("progress_pct")?,
            created_at: row.get("created_at")?,
            started_at: row.get("started_at")?,
            completed_at: row.get("completed_at")?,
            error_message: row.get("error_message")?,
            cancel_requested: row.get::<_, i64>("cancel_requested")? != 0,
            metrics: metrics_json
                .map(|s| serde_json::from_str(&s))
                .transpose()
                .map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        0,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?,
        })
    }

    fn fetch(&self, conn: &rusqlite::Connection, job_id: i64) -> Result<JobRecord> {
        conn.query_row(
            "SELECT * FROM training_jobs WHERE id = ?1",
            params![job_id],
            Self::row_to_record,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                TradepulseError::JobState(format!("job {} not found", job_id))
            }
            other => other.into(),
        })
    }

    fn terminal_transition(
        &self,
        job_id: i64,
        to: JobStatus,
        error_message: Option<&str>,
        metrics: Option<&serde_json::Value>,
    ) -> Result<()> {
        let conn = self.pool.get()?;
        let now: DateTime<Utc> = Utc::now();
        let metrics_json = metrics.map(|m| m.to_string());

        let affected = conn.execute(
            "UPDATE training_jobs
             SET status = ?2, completed_at = ?3, error_message = ?4, metrics_json = ?5
             WHERE id = ?1 AND status = 'RUNNING'",
            params![job_id, to.as_str(), now, error_message, metrics_json],
        )?;

        if affected == 0 {
            let record = self.fetch(&conn, job_id)?;
            return Err(TradepulseError::JobState(format!(
                "cannot transition job {} from {} to {}",
                job_id,
                record.status.as_str(),
                to.as_str()
            )));
        }

        info!("job {} -> {}", job_id, to.as_str());
        Ok(())
    }
}

impl JobStore for SqliteJobStore {
    fn submit(&self, timeframe: Timeframe, params: TrainingParams) -> Result<i64> {
        params.validate()?;

        let conn = self.pool.get()?;
        let now: DateTime<Utc> = Utc::now();
        conn.execute(
            "INSERT INTO training_jobs (timeframe, n_trials, train_ratio, status, progress_pct, created_at)
             VALUES (?1, ?2, ?3, 'PENDING', 0.0, ?4)",
            params![
                timeframe.as_str(),
                params.n_trials as i64,
                params.train_ratio,
                now
            ],
        )?;
        let id = conn.last_insert_rowid();
        info!("job {} submitted for {}", id, timeframe);
        Ok(id)
    }

    fn claim_next(&self) -> Result<Option<JobRecord>> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let running: i64 = tx.query_row(
            "SELECT COUNT(*) FROM training_jobs WHERE status = 'RUNNING'",
            [],
            |row| row.get(0),
        )?;
        if running > 0 {
            return Ok(None);
        }

        let candidate: Option<i64> = tx
            .query_row(
                "SELECT id FROM training_jobs WHERE status = 'PENDING' ORDER BY id LIMIT 1",
                [],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;

        let Some(job_id) = candidate else {
            return Ok(None);
        };

        let now: DateTime<Utc> = Utc::now();
        let affected = tx.execute(
            "UPDATE training_jobs SET status = 'RUNNING', started_at = ?2
             WHERE id = ?1 AND status = 'PENDING'",
            params![job_id, now],
        )?;
        if affected == 0 {
            // Raced by another claimer inside the same poll window
            return Ok(None);
        }

        let record = tx.query_row(
            "SELECT * FROM training_jobs WHERE id = ?1",
            params![job_id],
            Self::row_to_record,
        )?;
        tx.commit()?;

        info!("job {} claimed", job_id);
        Ok(Some(record))
    }

    fn report_progress(&self, job_id: i64, pct: f64) -> Result<()> {
        if !(0.0..=100.0).contains(&pct) {
            return Err(TradepulseError::Validation(format!(
                "progress must be within [0, 100], got {}",
                pct
            )));
        }

        let conn = self.pool.get()?;
        let affected = conn.execute(
            "UPDATE training_jobs SET progress_pct = ?2
             WHERE id = ?1 AND status = 'RUNNING' AND progress_pct <= ?2",
            params![job_id, pct],
        )?;

        if affected == 0 {
            let record = self.fetch(&conn, job_id)?;
            return Err(TradepulseError::JobState(format!(
                "progress update {:.1}% rejected for job {} (status {}, progress {:.1}%)",
                pct,
                job_id,
                record.status.as_str(),
                record.progress_pct
            )));
        }
        Ok(())
    }

    fn request_cancel(&self, job_id: i64) -> Result<bool> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let record = tx.query_row(
            "SELECT * FROM training_jobs WHERE id = ?1",
            params![job_id],
            Self::row_to_record,
        );
        let record = match record {
            Ok(r) => r,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        match record.status {
            // Never claimed: cancel outright
            JobStatus::Pending => {
                let now: DateTime<Utc> = Utc::now();
                tx.execute(
                    "UPDATE training_jobs
                     SET status = 'CANCELLED', cancel_requested = 1, completed_at = ?2
                     WHERE id = ?1 AND status = 'PENDING'",
                    params![job_id, now],
                )?;
                tx.commit()?;
                info!("job {} cancelled before claim", job_id);
                Ok(true)
            }
            // In flight: flag it, the daemon observes at the next checkpoint
            JobStatus::Running => {
                tx.execute(
                    "UPDATE training_jobs SET cancel_requested = 1 WHERE id = ?1",
                    params![job_id],
                )?;
                tx.commit()?;
                info!("cancel requested for running job {}", job_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn is_cancel_requested(&self, job_id: i64) -> Result<bool> {
        let conn = self.pool.get()?;
        let flagged: i64 = conn.query_row(
            "SELECT cancel_requested FROM training_jobs WHERE id = ?1",
            params![job_id],
            |row| row.get(0),
        )?;
        Ok(flagged != 0)
    }

    fn complete(&self, job_id: i64, metrics: &serde_json::Value) -> Result<()> {
        self.terminal_transition(job_id, JobStatus::Completed, None, Some(metrics))
    }

    fn fail(&self, job_id: i64, error: &str) -> Result<()> {
        self.terminal_transition(job_id, JobStatus::Failed, Some(error), None)
    }

    fn cancel(&self, job_id: i64) -> Result<()> {
        self.terminal_transition(job_id, JobStatus::Cancelled, None, None)
    }

    fn get(&self, job_id: i64) -> Result<JobRecord> {
        let conn = self.pool.get()?;
        self.fetch(&conn, job_id)
    }

    fn get_active(&self, timeframe: Option<Timeframe>) -> Result<Option<JobRecord>> {
        let conn = self.pool.get()?;
        let result = match timeframe {
            Some(tf) => conn.query_row(
                "SELECT * FROM training_jobs
                 WHERE status IN ('PENDING', 'RUNNING') AND timeframe = ?1
                 ORDER BY id LIMIT 1",
                params![tf.as_str()],
                Self::row_to_record,
            ),
            None => conn.query_row(
                "SELECT * FROM training_jobs
                 WHERE status IN ('PENDING', 'RUNNING')
                 ORDER BY id LIMIT 1",
                [],
                Self::row_to_record,
            ),
        };
        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn get_recent(&self, limit: usize) -> Result<Vec<JobRecord>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM training_jobs ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], Self::row_to_record)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn fail_orphaned(&self) -> Result<usize> {
        let conn = self.pool.get()?;
        let now: DateTime<Utc> = Utc::now();
        let affected = conn.execute(
            "UPDATE training_jobs
             SET status = 'FAILED', error_message = 'orphaned on restart', completed_at = ?1
             WHERE status = 'RUNNING'",
            params![now],
        )?;
        if affected > 0 {
            info!("failed {} orphaned running job(s) at startup", affected);
        }
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> SqliteJobStore {
        SqliteJobStore::in_memory().unwrap()
    }

    #[test]
    fn test_submit_creates_pending() {
        let store = store();
        let id = store
            .submit(Timeframe::H1, TrainingParams::default())
            .unwrap();
        let record = store.get(id).unwrap();
        assert_eq!(record.status, JobStatus::Pending);
        assert_eq!(record.progress_pct, 0.0);
        assert!(record.started_at.is_none());
    }

    #[test]
    fn test_submit_rejects_bad_params() {
        let store = store();
        let params = TrainingParams {
            n_trials: 10,
            train_ratio: 1.5,
        };
        assert!(store.submit(Timeframe::H1, params).is_err());
    }

    #[test]
    fn test_claim_sets_running_and_started_at() {
        let store = store();
        let id = store
            .submit(Timeframe::H1, TrainingParams::default())
            .unwrap();
        let claimed = store.claim_next().unwrap().unwrap();
        assert_eq!(claimed.id, id);
        assert_eq!(claimed.status, JobStatus::Running);
        assert!(claimed.started_at.is_some());
    }

    #[test]
    fn test_claim_is_single_flight() {
        let store = store();
        store
            .submit(Timeframe::H1, TrainingParams::default())
            .unwrap();
        store
            .submit(Timeframe::H4, TrainingParams::default())
            .unwrap();

        assert!(store.claim_next().unwrap().is_some());
        // Second claim refused while the first is still RUNNING
        assert!(store.claim_next().unwrap().is_none());
    }

    #[test]
    fn test_claim_takes_oldest_first() {
        let store = store();
        let first = store
            .submit(Timeframe::H1, TrainingParams::default())
            .unwrap();
        store
            .submit(Timeframe::H4, TrainingParams::default())
            .unwrap();
        assert_eq!(store.claim_next().unwrap().unwrap().id, first);
    }

    #[test]
    fn test_progress_is_monotonic() {
        let store = store();
        let id = store
            .submit(Timeframe::H1, TrainingParams::default())
            .unwrap();
        store.claim_next().unwrap();

        store.report_progress(id, 10.0).unwrap();
        store.report_progress(id, 10.0).unwrap(); // equal is fine
        store.report_progress(id, 40.0).unwrap();
        assert!(store.report_progress(id, 30.0).is_err());
        assert_eq!(store.get(id).unwrap().progress_pct, 40.0);
    }

    #[test]
    fn test_cancel_pending_is_immediate() {
        let store = store();
        let id = store
            .submit(Timeframe::H1, TrainingParams::default())
            .unwrap();
        assert!(store.request_cancel(id).unwrap());
        assert_eq!(store.get(id).unwrap().status, JobStatus::Cancelled);
        // And it can no longer be claimed
        assert!(store.claim_next().unwrap().is_none());
    }

    #[test]
    fn test_cancel_running_sets_flag_only() {
        let store = store();
        let id = store
            .submit(Timeframe::H1, TrainingParams::default())
            .unwrap();
        store.claim_next().unwrap();

        assert!(store.request_cancel(id).unwrap());
        let record = store.get(id).unwrap();
        assert_eq!(record.status, JobStatus::Running);
        assert!(record.cancel_requested);
        assert!(store.is_cancel_requested(id).unwrap());
    }

    #[test]
    fn test_cancel_terminal_is_refused() {
        let store = store();
        let id = store
            .submit(Timeframe::H1, TrainingParams::default())
            .unwrap();
        store.claim_next().unwrap();
        store.complete(id, &json!({"accuracy": 0.6})).unwrap();
        assert!(!store.request_cancel(id).unwrap());
    }

    #[test]
    fn test_complete_writes_metrics_back() {
        let store = store();
        let id = store
            .submit(Timeframe::H1, TrainingParams::default())
            .unwrap();
        store.claim_next().unwrap();
        store.complete(id, &json!({"long_rmse": 0.012})).unwrap();

        let record = store.get(id).unwrap();
        assert_eq!(record.status, JobStatus::Completed);
        assert!(record.completed_at.is_some());
        assert_eq!(record.metrics.unwrap()["long_rmse"], 0.012);
    }

    #[test]
    fn test_terminal_transition_on_terminal_job_is_error() {
        let store = store();
        let id = store
            .submit(Timeframe::H1, TrainingParams::default())
            .unwrap();
        store.claim_next().unwrap();
        store.fail(id, "boom").unwrap();
        assert!(store.complete(id, &json!({})).is_err());
        assert!(store.fail(id, "again").is_err());
    }

    #[test]
    fn test_fail_records_message() {
        let store = store();
        let id = store
            .submit(Timeframe::H1, TrainingParams::default())
            .unwrap();
        store.claim_next().unwrap();
        store.fail(id, "data store unreachable").unwrap();

        let record = store.get(id).unwrap();
        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(
            record.error_message.as_deref(),
            Some("data store unreachable")
        );
    }

    #[test]
    fn test_get_active_and_recent() {
        let store = store();
        let a = store
            .submit(Timeframe::H1, TrainingParams::default())
            .unwrap();
        let b = store
            .submit(Timeframe::H4, TrainingParams::default())
            .unwrap();

        assert_eq!(store.get_active(None).unwrap().unwrap().id, a);
        assert_eq!(
            store.get_active(Some(Timeframe::H4)).unwrap().unwrap().id,
            b
        );
        assert!(store.get_active(Some(Timeframe::D1)).unwrap().is_none());

        let recent = store.get_recent(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, b); // newest first
    }

    #[test]
    fn test_orphaned_running_job_fails_on_startup() {
        let store = store();
        let id = store
            .submit(Timeframe::H1, TrainingParams::default())
            .unwrap();
        store.claim_next().unwrap();

        assert_eq!(store.fail_orphaned().unwrap(), 1);
        let record = store.get(id).unwrap();
        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.error_message.as_deref(), Some("orphaned on restart"));
        // Queue is free again
        assert_eq!(store.fail_orphaned().unwrap(), 0);
    }
}
