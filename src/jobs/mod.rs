pub mod api;
pub mod daemon;
pub mod record;
pub mod store;

pub use api::JobsApi;
pub use daemon::{JobDaemon, ShutdownFlag};
pub use record::{JobRecord, JobStatus, TrainingParams};
pub use store::{JobStore, SqliteJobStore};
