// src/runner/sequential.rs

//! Run commands one after another, in the order given.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::{CmdError, RunError};
use crate::exec::{OsSpawner, Process, Spawner, lock};
use crate::types::{CmdSpec, CmdStatus};

use super::Runner;

/// The command currently executing.
struct Current<P> {
    index: usize,
    process: Arc<P>,
}

/// Everything `run`, `stop` and `status` share.
struct RunState<P> {
    running: bool,
    /// One slot per command of the current (or last) batch.
    statuses: Vec<CmdStatus>,
    /// `Some` only while a process handle is live.
    current: Option<Current<P>>,
    /// Fresh per run; cancelled by `stop`.
    cancel: CancellationToken,
}

impl<P> RunState<P> {
    fn idle() -> Self {
        Self {
            running: false,
            statuses: Vec::new(),
            current: None,
            cancel: CancellationToken::new(),
        }
    }
}

/// A [`Runner`] that runs commands synchronously in the order given.
///
/// No timeouts or retries. At most one process is alive at any time, and
/// `run` only suspends while waiting for that process to exit, so `stop` and
/// `status` can be called from other tasks or threads while a batch runs.
///
/// - With `stop_on_error = true`, the first non-zero exit ends the batch with
///   [`RunError::NonZeroExit`].
/// - With `stop_on_error = false`, every command runs regardless of its exit
///   code; only [`stop`](Self::stop) ends the batch early.
///
/// A runner can be reused for any number of batches, one at a time.
pub struct SequentialRunner<S: Spawner = OsSpawner> {
    stop_on_error: bool,
    spawner: S,
    state: Mutex<RunState<S::Process>>,
}

impl SequentialRunner<OsSpawner> {
    /// Runner executing real OS processes.
    pub fn new(stop_on_error: bool) -> Self {
        Self::with_spawner(stop_on_error, OsSpawner)
    }
}

impl<S: Spawner> SequentialRunner<S> {
    pub fn with_spawner(stop_on_error: bool, spawner: S) -> Self {
        Self {
            stop_on_error,
            spawner,
            state: Mutex::new(RunState::idle()),
        }
    }

    pub fn stop_on_error(&self) -> bool {
        self.stop_on_error
    }

    pub fn spawner(&self) -> &S {
        &self.spawner
    }

    pub fn is_running(&self) -> bool {
        lock(&self.state).running
    }

    /// Run `cmds` in order and wait for them to complete.
    ///
    /// Returns:
    /// - `Ok(())` once every command ran,
    /// - [`RunError::AlreadyRunning`] if another batch is active on this
    ///   runner (nothing is started),
    /// - [`RunError::Stopped`] if [`stop`](Self::stop) was called,
    /// - [`RunError::NonZeroExit`] if `stop_on_error` is set and a command
    ///   exited non-zero.
    ///
    /// Whatever the result, [`status`](Self::status) afterwards holds one
    /// entry per command: the final status of every command that ran, and the
    /// "not started" value for the rest.
    pub async fn run(&self, cmds: &[CmdSpec]) -> Result<(), RunError> {
        let cancel = {
            let mut state = lock(&self.state);
            if state.running {
                debug!("run called while a batch is active; rejecting");
                return Err(RunError::AlreadyRunning);
            }

            state.statuses = cmds
                .iter()
                .map(|c| CmdStatus::not_started(c.name.clone()))
                .collect();
            state.current = None;
            state.cancel = CancellationToken::new();
            state.running = true;
            state.cancel.clone()
        };
        let _idle = IdleOnDrop { state: &self.state };

        info!(
            commands = cmds.len(),
            stop_on_error = self.stop_on_error,
            "batch started"
        );

        for (index, spec) in cmds.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(index, "batch stopped before launching next command");
                return Err(RunError::Stopped);
            }

            let process = Arc::new(self.spawner.spawn(spec));
            {
                let mut state = lock(&self.state);
                state.current = Some(Current {
                    index,
                    process: Arc::clone(&process),
                });
            }

            debug!(index, cmd = %spec.name, args = ?spec.args, "launching command");
            let done = process.start();

            // A stop that landed between publishing the handle and starting
            // the process found nothing to terminate.
            if cancel.is_cancelled() {
                if let Err(err) = process.stop() {
                    warn!(index, error = %err, "failed to stop freshly started command");
                }
            }

            let final_status = match done.await {
                Ok(status) => status,
                Err(_) => {
                    warn!(index, "completion signal dropped; using last known status");
                    process.status()
                }
            };
            let exit = final_status.exit;

            {
                let mut state = lock(&self.state);
                state.statuses[index] = final_status;
                state.current = None;
            }

            debug!(index, exit, "command finished");

            // A stopped batch reports `Stopped`, even when the killed command
            // exited non-zero.
            if cancel.is_cancelled() {
                info!(index, "batch stopped");
                return Err(RunError::Stopped);
            }

            if self.stop_on_error && exit != 0 {
                info!(index, exit, "command exited non-zero; stopping batch");
                return Err(RunError::NonZeroExit { index, exit });
            }
        }

        info!(commands = cmds.len(), "batch finished");
        Ok(())
    }

    /// Stop the active batch.
    ///
    /// No further command is launched after this call. If a command is
    /// running it is asked to terminate and the result of that request is
    /// returned. Does not wait for `run` to return.
    ///
    /// Calling `stop` while idle, or repeatedly, is a no-op returning `Ok`.
    pub fn stop(&self) -> Result<(), CmdError> {
        let state = lock(&self.state);
        if !state.running {
            return Ok(());
        }

        if !state.cancel.is_cancelled() {
            info!("stop requested; no further commands will be launched");
            state.cancel.cancel();
        }

        let Some(current) = &state.current else {
            return Ok(());
        };

        debug!(index = current.index, "terminating running command");
        let result = current.process.stop();
        if let Err(err) = &result {
            warn!(index = current.index, error = %err, "failed to terminate running command");
        }
        result
    }

    /// Status of every command in the current (or last) batch and the index
    /// of the command running right now, if any.
    ///
    /// The running command's entry is refreshed from its process first, so
    /// it shows live output. Before the first run this is `(vec![], None)`.
    pub fn status(&self) -> (Vec<CmdStatus>, Option<usize>) {
        let mut state = lock(&self.state);

        let refreshed = state
            .current
            .as_ref()
            .map(|c| (c.index, c.process.status()));

        match refreshed {
            Some((index, snapshot)) => {
                state.statuses[index] = snapshot;
                (state.statuses.clone(), Some(index))
            }
            None => (state.statuses.clone(), None),
        }
    }
}

impl<S: Spawner> Runner for SequentialRunner<S> {
    fn run<'a>(
        &'a self,
        cmds: &'a [CmdSpec],
    ) -> Pin<Box<dyn Future<Output = Result<(), RunError>> + Send + 'a>> {
        Box::pin(SequentialRunner::run(self, cmds))
    }

    fn stop(&self) -> Result<(), CmdError> {
        SequentialRunner::stop(self)
    }

    fn status(&self) -> (Vec<CmdStatus>, Option<usize>) {
        SequentialRunner::status(self)
    }
}

/// Returns the runner to idle when `run` exits, on every path.
///
/// If the `run` future is dropped mid-command, the in-flight process is
/// stopped as well.
struct IdleOnDrop<'a, P: Process> {
    state: &'a Mutex<RunState<P>>,
}

impl<P: Process> Drop for IdleOnDrop<'_, P> {
    fn drop(&mut self) {
        let mut state = lock(self.state);
        if let Some(current) = state.current.take() {
            warn!(index = current.index, "run abandoned mid-command; stopping process");
            if let Err(err) = current.process.stop() {
                warn!(index = current.index, error = %err, "failed to stop abandoned command");
            }
        }
        state.running = false;
        debug!("runner idle");
    }
}
