// src/logging.rs

//! Logging setup for `seqrun` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log level:
//! 1. explicit level passed by the caller (e.g. `[runner].log_level`)
//! 2. `SEQRUN_LOG` environment variable (e.g. "info", "debug")
//! 3. default to `info`
//!
//! Logs are sent to STDERR so that stdout stays free for whatever the caller
//! renders.

use anyhow::Result;
use tracing_subscriber::fmt;

use crate::types::LogLevel;

/// Initialise the global logging subscriber.
///
/// Fails if a global subscriber has already been installed.
pub fn init_logging(level: Option<LogLevel>) -> Result<()> {
    let level = match level {
        Some(lvl) => level_from_log_level(lvl),
        None => std::env::var("SEQRUN_LOG")
            .ok()
            .and_then(|s| s.parse::<LogLevel>().ok())
            .map(level_from_log_level)
            .unwrap_or(tracing::Level::INFO),
    };

    fmt()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    Ok(())
}

fn level_from_log_level(lvl: LogLevel) -> tracing::Level {
    match lvl {
        LogLevel::Error => tracing::Level::ERROR,
        LogLevel::Warn => tracing::Level::WARN,
        LogLevel::Info => tracing::Level::INFO,
        LogLevel::Debug => tracing::Level::DEBUG,
        LogLevel::Trace => tracing::Level::TRACE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_every_log_level() {
        assert_eq!(level_from_log_level(LogLevel::Error), tracing::Level::ERROR);
        assert_eq!(level_from_log_level(LogLevel::Warn), tracing::Level::WARN);
        assert_eq!(level_from_log_level(LogLevel::Info), tracing::Level::INFO);
        assert_eq!(level_from_log_level(LogLevel::Debug), tracing::Level::DEBUG);
        assert_eq!(level_from_log_level(LogLevel::Trace), tracing::Level::TRACE);
    }

    #[test]
    fn second_init_fails() {
        init_logging(Some(LogLevel::Warn)).unwrap();
        assert!(init_logging(None).is_err());
    }
}
