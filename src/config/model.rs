// src/config/model.rs

use serde::Deserialize;

use crate::runner::SequentialRunner;
use crate::types::{CmdSpec, LogLevel};

/// Batch file as read from TOML, before validation.
///
/// ```toml
/// [runner]
/// stop_on_error = true
/// log_level = "debug"
///
/// [[command]]
/// name = "echo"
/// args = ["hello"]
///
/// [[command]]
/// name = "false"
/// ```
///
/// `[runner]` is optional; commands run in file order.
#[derive(Debug, Clone, Deserialize)]
pub struct RawBatchFile {
    #[serde(default)]
    pub runner: RunnerSection,

    /// All `[[command]]` entries, in file order.
    #[serde(default)]
    pub command: Vec<CmdSpec>,
}

/// `[runner]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerSection {
    /// Abort the batch on the first non-zero exit. Defaults to `true`.
    #[serde(default = "default_stop_on_error")]
    pub stop_on_error: bool,

    /// Log level for [`init_logging`](crate::logging::init_logging); if
    /// `None`, `SEQRUN_LOG` or `info` is used. Read by the caller, not by
    /// the runner.
    #[serde(default)]
    pub log_level: Option<LogLevel>,
}

fn default_stop_on_error() -> bool {
    true
}

impl Default for RunnerSection {
    fn default() -> Self {
        Self {
            stop_on_error: default_stop_on_error(),
            log_level: None,
        }
    }
}

/// A validated batch file.
///
/// Only obtainable through `TryFrom<RawBatchFile>` (see `validate.rs`), so
/// holding one means every command has a program name.
#[derive(Debug, Clone)]
pub struct BatchFile {
    runner: RunnerSection,
    commands: Vec<CmdSpec>,
}

impl BatchFile {
    pub(crate) fn new_unchecked(runner: RunnerSection, commands: Vec<CmdSpec>) -> Self {
        Self { runner, commands }
    }

    pub fn runner_section(&self) -> &RunnerSection {
        &self.runner
    }

    pub fn commands(&self) -> &[CmdSpec] {
        &self.commands
    }

    /// Build a runner executing real processes with this file's options.
    pub fn runner(&self) -> SequentialRunner {
        SequentialRunner::new(self.runner.stop_on_error)
    }
}
