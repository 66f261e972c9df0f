use thiserror::Error;

#[derive(Error, Debug)]
pub enum TradepulseError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Data quality error for {symbol}: {reason}")]
    DataQuality { symbol: String, reason: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Job state error: {0}")]
    JobState(String),

    #[error("Job execution error: {0}")]
    JobExecution(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Cancellation requested")]
    Cancelled,

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<r2d2::Error> for TradepulseError {
    fn from(e: r2d2::Error) -> Self {
        TradepulseError::Database(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TradepulseError>;
