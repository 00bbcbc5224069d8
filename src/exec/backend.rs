// src/exec/backend.rs

//! Pluggable process backend abstraction.
//!
//! Runners talk to a [`Spawner`] and the [`Process`] handles it creates
//! instead of `tokio::process` directly. This makes it easy to swap in a fake
//! process in tests while keeping the production implementation in
//! [`os_process`](super::os_process).
//!
//! - [`OsSpawner`] is the default implementation used by `SequentialRunner::new`.
//! - Tests can provide their own `Spawner` whose processes finish when the
//!   test says so.

use tokio::sync::oneshot;

use crate::errors::CmdError;
use crate::types::{CmdSpec, CmdStatus};

use super::os_process::OsProcess;

/// Handle to one external process.
///
/// All three methods take `&self` and may be called concurrently from
/// different threads.
pub trait Process: Send + Sync + 'static {
    /// Start the process without blocking.
    ///
    /// The returned receiver yields the final status once the process has
    /// exited and its output has been drained.
    fn start(&self) -> oneshot::Receiver<CmdStatus>;

    /// Best-effort request to terminate the process.
    ///
    /// Must be safe to call before `start` and after the process exited.
    fn stop(&self) -> Result<(), CmdError>;

    /// Current status snapshot.
    fn status(&self) -> CmdStatus;
}

/// Creates an unstarted [`Process`] for a command.
pub trait Spawner: Send + Sync {
    type Process: Process;

    fn spawn(&self, spec: &CmdSpec) -> Self::Process;
}

/// Production spawner running real OS processes via `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsSpawner;

impl Spawner for OsSpawner {
    type Process = OsProcess;

    fn spawn(&self, spec: &CmdSpec) -> OsProcess {
        OsProcess::new(spec.clone())
    }
}
