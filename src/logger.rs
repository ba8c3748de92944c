//! Process-wide logging setup.
//!
//! Library code only uses the `log` macros; the binary calls [`init`] once to
//! install a `fern` dispatcher writing to stderr and, optionally, a log file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use log::LevelFilter;

use crate::config::{Config, LoggingConfig};

/// Level filter of a logging configuration. Disabled logging is `Off`.
pub fn level_filter(config: &LoggingConfig) -> LevelFilter {
    if !config.enabled {
        return LevelFilter::Off;
    }
    config.level.parse().unwrap_or(LevelFilter::Info)
}

/// One formatted log line, without the trailing newline.
pub fn format_line(timestamp: &str, level: log::Level, target: &str, message: &std::fmt::Arguments<'_>) -> String {
    format!("[{timestamp} {level:<5} {target}] {message}")
}

/// Location of the log file.
pub fn log_file_path() -> Result<PathBuf> {
    Ok(Config::get_data_dir()?.join("tasksync.log"))
}

/// Install the global logger.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let level = level_filter(config);

    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string();
            out.finish(format_args!(
                "{}",
                format_line(&timestamp, record.level(), record.target(), message)
            ))
        })
        .level(level)
        .level_for("sqlx", LevelFilter::Warn)
        .level_for("sea_orm", LevelFilter::Warn)
        .level_for("hyper_util", LevelFilter::Warn)
        .chain(std::io::stderr());

    if config.enabled && config.file {
        let path = log_file_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
        }
        let file = fern::log_file(&path).with_context(|| format!("Failed to open log file: {}", path.display()))?;
        dispatch = dispatch.chain(file);
    }

    dispatch.apply().context("Logger already initialized")?;
    Ok(())
}
