//! Tracing setup.
//!
//! The terminal UI owns stdout/stderr, so in UI mode logs go to a daily
//! rolling file. Headless commands log to stderr.

use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
  File,
  Stderr,
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop and must be kept
/// alive for the life of the process.
pub fn init(config: &LoggingConfig, target: LogTarget) -> Result<Option<WorkerGuard>> {
  // RUST_LOG wins over the configured level
  let filter = EnvFilter::try_from_default_env()
    .or_else(|_| EnvFilter::try_new(&config.level))
    .map_err(|e| eyre!("Invalid log filter {}: {}", config.level, e))?;

  match target {
    LogTarget::Stderr => {
      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;
      Ok(None)
    }
    LogTarget::File => {
      let dir = log_directory(config)?;
      std::fs::create_dir_all(&dir)
        .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

      let appender = tracing_appender::rolling::daily(&dir, "storysync.log");
      let (writer, guard) = tracing_appender::non_blocking(appender);
      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;
      Ok(Some(guard))
    }
  }
}

fn log_directory(config: &LoggingConfig) -> Result<PathBuf> {
  if let Some(dir) = &config.directory {
    return Ok(dir.clone());
  }

  let base = dirs::state_dir()
    .or_else(dirs::data_dir)
    .ok_or_else(|| eyre!("Could not determine log directory"))?;
  Ok(base.join("storysync").join("logs"))
}
