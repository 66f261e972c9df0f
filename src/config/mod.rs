pub mod daemon;
pub mod exit_policy;
pub mod labeling;
pub mod manager;
pub mod traits;

pub use daemon::DaemonConfig;
pub use exit_policy::{EarlyExitThreshold, ExitPolicy};
pub use labeling::LabelingConfig;
pub use manager::{AppConfig, ConfigManager};
