// src/exec/os_process.rs

//! Real OS process handle.

use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::errors::CmdError;
use crate::types::{CmdSpec, CmdStatus, EXIT_UNKNOWN};

use super::backend::Process;
use super::lock;

#[derive(Debug, Clone, Copy)]
enum Phase {
    NotStarted,
    /// `start` was called and the spawn is in progress.
    Starting,
    Running { started_at: Instant },
    Finished,
}

#[derive(Debug)]
struct Shared {
    status: CmdStatus,
    phase: Phase,
    /// Set by `stop`; a stopped process is never reported complete.
    stopped: bool,
    /// Completion signals handed out by `start`.
    waiters: Vec<oneshot::Sender<CmdStatus>>,
    #[cfg(not(unix))]
    kill_tx: Option<oneshot::Sender<()>>,
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// An external process run through `tokio::process`.
///
/// - The program is executed directly (no shell), with stdin closed.
/// - stdout/stderr are captured line by line as they arrive, so
///   [`Process::status`] shows partial output while the process runs.
/// - On Unix the process gets its own process group and [`Process::stop`]
///   sends `SIGTERM` to the whole group.
///
/// `start` must be called from within a Tokio runtime.
#[derive(Debug)]
pub struct OsProcess {
    spec: CmdSpec,
    shared: Arc<Mutex<Shared>>,
}

impl OsProcess {
    pub fn new(spec: CmdSpec) -> Self {
        let status = CmdStatus::not_started(spec.name.clone());
        Self {
            spec,
            shared: Arc::new(Mutex::new(Shared {
                status,
                phase: Phase::NotStarted,
                stopped: false,
                waiters: Vec::new(),
                #[cfg(not(unix))]
                kill_tx: None,
            })),
        }
    }

    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.spec.name);
        cmd.args(&self.spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        cmd.process_group(0);

        cmd
    }
}

impl Process for OsProcess {
    fn start(&self) -> oneshot::Receiver<CmdStatus> {
        let (tx, rx) = oneshot::channel();

        {
            let mut shared = lock(&self.shared);
            match shared.phase {
                Phase::NotStarted => {
                    shared.waiters.push(tx);
                    shared.phase = Phase::Starting;
                }
                Phase::Starting | Phase::Running { .. } => {
                    debug!(cmd = %self.spec.name, "process already started; waiting on existing run");
                    shared.waiters.push(tx);
                    return rx;
                }
                Phase::Finished => {
                    let _ = tx.send(shared.status.clone());
                    return rx;
                }
            }
        }

        let mut child = match self.build_command().spawn() {
            Ok(child) => child,
            Err(err) => {
                warn!(cmd = %self.spec.name, error = %err, "failed to spawn process");
                finish(&self.shared, Err(CmdError::Spawn(err.to_string())), None);
                return rx;
            }
        };

        let pid = child.id().unwrap_or_default();
        info!(cmd = %self.spec.name, args = ?self.spec.args, pid, "process started");

        #[cfg(not(unix))]
        let (kill_tx, kill_rx) = oneshot::channel();

        let stop_requested = {
            let mut shared = lock(&self.shared);
            #[cfg(not(unix))]
            {
                shared.kill_tx = Some(kill_tx);
            }
            shared.status.pid = pid;
            shared.phase = Phase::Running {
                started_at: Instant::now(),
            };
            shared.stopped
        };

        if stop_requested {
            debug!(cmd = %self.spec.name, pid, "stop requested while spawning; terminating");
            #[cfg(unix)]
            if let Err(err) = terminate_group(pid) {
                warn!(cmd = %self.spec.name, pid, error = %err, "failed to terminate process");
            }
            #[cfg(not(unix))]
            if let Err(err) = child.start_kill() {
                warn!(cmd = %self.spec.name, pid, error = %err, "failed to kill process");
            }
        }

        let readers = [
            child
                .stdout
                .take()
                .map(|out| tokio::spawn(capture_lines(out, Arc::clone(&self.shared), Stream::Stdout))),
            child
                .stderr
                .take()
                .map(|err| tokio::spawn(capture_lines(err, Arc::clone(&self.shared), Stream::Stderr))),
        ];

        let shared = Arc::clone(&self.shared);
        let name = self.spec.name.clone();
        tokio::spawn(async move {
            #[cfg(unix)]
            let exit = child.wait().await;
            #[cfg(not(unix))]
            let exit = wait_or_kill(&mut child, kill_rx).await;

            // Drain output before publishing the final status.
            for reader in readers.into_iter().flatten() {
                let _ = reader.await;
            }

            let exit = exit.map_err(|e| CmdError::Wait(e.to_string()));
            let status = finish(&shared, exit, Some(pid));
            info!(
                cmd = %name,
                pid,
                exit = status.exit,
                complete = status.complete,
                "process exited"
            );
        });

        rx
    }

    fn stop(&self) -> Result<(), CmdError> {
        let mut shared = lock(&self.shared);
        let pid = match shared.phase {
            Phase::NotStarted | Phase::Finished => return Ok(()),
            Phase::Starting => {
                // The spawning side sees the flag and terminates right after spawn.
                shared.stopped = true;
                return Ok(());
            }
            Phase::Running { .. } => shared.status.pid,
        };
        shared.stopped = true;
        #[cfg(not(unix))]
        if let Some(kill_tx) = shared.kill_tx.take() {
            let _ = kill_tx.send(());
        }
        drop(shared);

        debug!(pid, "requesting termination");
        terminate_group(pid)
    }

    fn status(&self) -> CmdStatus {
        let shared = lock(&self.shared);
        let mut status = shared.status.clone();
        if let Phase::Running { started_at } = shared.phase {
            status.runtime = started_at.elapsed();
        }
        status
    }
}

/// Record the final status and wake every waiter.
fn finish(
    shared: &Mutex<Shared>,
    exit: Result<ExitStatus, CmdError>,
    pid: Option<u32>,
) -> CmdStatus {
    let mut shared = lock(shared);

    if let Phase::Running { started_at } = shared.phase {
        shared.status.runtime = started_at.elapsed();
    }
    if let Some(pid) = pid {
        shared.status.pid = pid;
    }

    match exit {
        Ok(exit_status) => {
            match exit_status.code() {
                Some(code) => shared.status.exit = code,
                None => {
                    shared.status.exit = EXIT_UNKNOWN;
                    shared.status.error = Some(CmdError::Signaled(signal_name(&exit_status)));
                }
            }
            shared.status.complete = !shared.stopped;
        }
        Err(err) => {
            shared.status.exit = EXIT_UNKNOWN;
            shared.status.error = Some(err);
            shared.status.complete = false;
        }
    }
    shared.phase = Phase::Finished;

    let status = shared.status.clone();
    for waiter in shared.waiters.drain(..) {
        let _ = waiter.send(status.clone());
    }
    status
}

async fn capture_lines<R>(reader: R, shared: Arc<Mutex<Shared>>, stream: Stream)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let mut shared = lock(&shared);
                match stream {
                    Stream::Stdout => shared.status.stdout.push(line),
                    Stream::Stderr => shared.status.stderr.push(line),
                }
            }
            Ok(None) => break,
            Err(err) => {
                debug!(?stream, error = %err, "stopped reading process output");
                break;
            }
        }
    }
}

/// The monitor task kills the child once `kill_tx` fires.
#[cfg(not(unix))]
fn terminate_group(_pid: u32) -> Result<(), CmdError> {
    Ok(())
}

#[cfg(unix)]
fn terminate_group(pid: u32) -> Result<(), CmdError> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return Err(CmdError::Terminate(format!("pid {pid} out of range")));
    };

    match killpg(Pid::from_raw(raw), Signal::SIGTERM) {
        Ok(()) => Ok(()),
        // Already gone.
        Err(Errno::ESRCH) => Ok(()),
        Err(errno) => Err(CmdError::Terminate(errno.desc().to_string())),
    }
}

#[cfg(unix)]
fn signal_name(status: &ExitStatus) -> String {
    use std::os::unix::process::ExitStatusExt;

    match status.signal() {
        Some(sig) => nix::sys::signal::Signal::try_from(sig)
            .map(|s| s.as_str().to_string())
            .unwrap_or_else(|_| sig.to_string()),
        None => "unknown".to_string(),
    }
}

#[cfg(not(unix))]
fn signal_name(_status: &ExitStatus) -> String {
    "killed".to_string()
}

#[cfg(not(unix))]
async fn wait_or_kill(
    child: &mut tokio::process::Child,
    mut kill_rx: oneshot::Receiver<()>,
) -> std::io::Result<ExitStatus> {
    tokio::select! {
        status = child.wait() => status,
        Ok(()) = &mut kill_rx => {
            if let Err(err) = child.start_kill() {
                warn!(error = %err, "failed to kill child process");
            }
            child.wait().await
        }
    }
}
