// src/lib.rs

//! Run an ordered list of external commands, one after another, while other
//! tasks watch their live status or stop the batch.
//!
//! The core is [`SequentialRunner`]; [`OsProcess`] is the process backend it
//! uses in production.

pub mod config;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod runner;
pub mod types;

use std::path::Path;

use tracing::info;

use crate::config::load_and_validate;
use crate::errors::{Result, RunError};

pub use crate::errors::{CmdError, SeqrunError};
pub use crate::exec::{OsProcess, OsSpawner, Process, Spawner};
pub use crate::runner::{Runner, SequentialRunner};
pub use crate::types::{CmdSpec, CmdStatus, EXIT_UNKNOWN, LogLevel};

/// Result of [`run_batch_file`].
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// How the run ended.
    pub outcome: std::result::Result<(), RunError>,
    /// One entry per command, in file order.
    pub statuses: Vec<CmdStatus>,
}

impl BatchReport {
    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Load a batch file, run it to completion, and report every command's
/// final status.
///
/// Loading and validation errors are returned as `Err`; how the batch itself
/// ended is part of the report, since the statuses are meaningful either way.
///
/// The file's `[runner] log_level` is not applied here. Logging is global and
/// must be set up before anything runs, so callers load the file first and
/// pass `runner_section().log_level` to [`init_logging`](crate::logging::init_logging).
pub async fn run_batch_file(path: impl AsRef<Path>) -> Result<BatchReport> {
    let path = path.as_ref();
    let batch = load_and_validate(path)?;
    info!(
        path = %path.display(),
        commands = batch.commands().len(),
        "running batch file"
    );

    let runner = batch.runner();
    let outcome = runner.run(batch.commands()).await;
    let (statuses, _) = runner.status();

    Ok(BatchReport { outcome, statuses })
}
