use anyhow::Context;
use log::{info, warn};
use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;
use tradepulse::config::ConfigManager;
use tradepulse::data::{CsvDirectorySource, SqliteLabelStore};
use tradepulse::jobs::{JobDaemon, ShutdownFlag, SqliteJobStore};
use tradepulse::training::BaselineTrainer;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "tradepulse.toml".to_string());

    let manager = ConfigManager::new();
    if Path::new(&config_path).exists() {
        manager
            .load_from_file(&config_path)
            .with_context(|| format!("loading {}", config_path))?;
        info!("loaded config from {}", config_path);
    } else {
        warn!("{} not found, using defaults", config_path);
    }
    let config = manager.get();

    let store = Arc::new(
        SqliteJobStore::open(&config.daemon.db_path)
            .with_context(|| format!("opening job store at {}", config.daemon.db_path))?,
    );
    let labels = Arc::new(
        SqliteLabelStore::open(&config.daemon.db_path)
            .with_context(|| format!("opening label store at {}", config.daemon.db_path))?,
    );
    let source = Arc::new(CsvDirectorySource::new(config.labeling.data_dir.clone()));
    let trainer = Arc::new(BaselineTrainer::default());

    let symbols = config.labeling.symbols.clone();
    let daemon = JobDaemon::new(store, source, labels, trainer, symbols, config)
        .context("constructing daemon")?;

    // Graceful drain: closing stdin (or an explicit "stop" line) triggers
    // shutdown; the in-flight job still runs to a terminal state.
    let shutdown = ShutdownFlag::new();
    let flag = shutdown.clone();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(l) if l.trim() == "stop" => break,
                Ok(_) => continue,
                Err(_) => break,
            }
        }
        info!("shutdown requested");
        flag.trigger();
    });

    daemon.run(&shutdown)?;
    Ok(())
}
