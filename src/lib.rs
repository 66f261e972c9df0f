//! Label-generation and training-job orchestration core of the trading
//! pipeline: simulates exit outcomes for every candle to produce supervised
//! learning targets, and runs the single-flight queue that schedules model
//! (re)training over them.

pub mod config;
pub mod data;
pub mod error;
pub mod jobs;
pub mod labeling;
pub mod training;
pub mod types;

pub use error::{Result, TradepulseError};
