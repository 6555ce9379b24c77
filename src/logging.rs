//! tracing subscriber setup.
//!
//! The terminal UI owns stdout/stderr, so interactive sessions log to a file in the cache
//! directory. Headless runs log to stderr, keeping stdout for the JSON result.

use crate::cache::{CacheManager, LOG_FILE};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a filter directive; overrides the configured level.
pub const LOG_ENV: &str = "SHEETPLOT_LOG";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    /// `sheetplot.log` in the cache directory
    CacheFile,
    Stderr,
}

/// Filter from `SHEETPLOT_LOG`, else `level` (forced to `debug` when `debug` is set).
pub fn env_filter(level: &str, debug: bool) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        let level = if debug { "debug" } else { level };
        EnvFilter::new(format!("sheetplot={}", level))
    })
}

/// Install the global subscriber. Returns the log file path when logging to a file.
pub fn init(
    target: LogTarget,
    level: &str,
    debug: bool,
    cache: &CacheManager,
) -> Result<Option<PathBuf>> {
    let filter = env_filter(level, debug);
    match target {
        LogTarget::Stderr => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init()
                .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;
            Ok(None)
        }
        LogTarget::CacheFile => {
            cache.ensure_cache_dir()?;
            let path = cache.cache_file(LOG_FILE);
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
                .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;
            Ok(Some(path))
        }
    }
}
