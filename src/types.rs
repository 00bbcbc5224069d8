use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::errors::CmdError;

/// Exit code recorded for a command whose exit status is not known yet (never
/// started, still running, or killed by a signal).
pub const EXIT_UNKNOWN: i32 = -1;

/// A command to run: program name plus its arguments.
///
/// The program is executed directly, not through a shell.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CmdSpec {
    pub name: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CmdSpec {
    pub fn new<I, S>(name: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

/// Point-in-time status of one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmdStatus {
    /// Program name, copied from the [`CmdSpec`].
    pub cmd: String,
    /// OS process id; `0` until the process has been spawned.
    pub pid: u32,
    /// True once the process exited on its own. A process ended through
    /// `stop` is never complete.
    ///
    /// A `stop` that lands after the process exited but before its output
    /// was drained still counts, so such a process reports `false` too.
    pub complete: bool,
    /// Exit code, or [`EXIT_UNKNOWN`].
    pub exit: i32,
    /// Set on abnormal termination (spawn failure, killed by a signal).
    pub error: Option<CmdError>,
    pub runtime: Duration,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

impl CmdStatus {
    /// Status of a command that has not been started.
    pub fn not_started(cmd: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            pid: 0,
            complete: false,
            exit: EXIT_UNKNOWN,
            error: None,
            runtime: Duration::ZERO,
            stdout: Vec::new(),
            stderr: Vec::new(),
        }
    }

    /// True if this is still the untouched "not started" value.
    pub fn is_not_started(&self) -> bool {
        self.pid == 0 && !self.complete && self.exit == EXIT_UNKNOWN && self.error.is_none()
    }
}

/// Log level, as accepted in batch files and `SEQRUN_LOG`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!(
                "invalid log level: {other} (expected error, warn, info, debug or trace)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_started_uses_exit_sentinel() {
        let status = CmdStatus::not_started("echo");
        assert_eq!(status.cmd, "echo");
        assert_eq!(status.exit, EXIT_UNKNOWN);
        assert_eq!(status.pid, 0);
        assert!(!status.complete);
        assert!(status.stdout.is_empty());
        assert!(status.is_not_started());
    }

    #[test]
    fn log_level_parses_case_insensitively() {
        assert_eq!("DEBUG".parse::<LogLevel>(), Ok(LogLevel::Debug));
        assert_eq!(" warning ".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert!("loud".parse::<LogLevel>().is_err());
    }
}
