use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use seqrun::errors::CmdError;
use seqrun::exec::{Process, Spawner};
use seqrun::types::{CmdSpec, CmdStatus, EXIT_UNKNOWN};

static NEXT_PID: AtomicU32 = AtomicU32::new(1000);

/// How a fake process behaves once started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeBehaviour {
    /// Exit immediately with this code; the args are echoed as stdout lines.
    Exit(i32),
    /// Keep running until the test calls [`FakeHandle::finish`] or the
    /// process is stopped. Stopping kills it with SIGTERM.
    Hang,
    /// Like `Hang`, but the process traps SIGTERM and exits 0.
    HangExitZeroOnStop,
    /// Like `Hang`, but every stop request fails and the process keeps
    /// running.
    HangStopFails,
}

#[derive(Debug)]
struct FakeState {
    behaviour: FakeBehaviour,
    status: CmdStatus,
    started_at: Option<Instant>,
    finished: bool,
    stop_calls: usize,
    waiters: Vec<oneshot::Sender<CmdStatus>>,
}

impl FakeState {
    fn finish(&mut self, exit: i32, error: Option<CmdError>, complete: bool) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.status.exit = exit;
        self.status.error = error;
        self.status.complete = complete;
        self.status.runtime = self
            .started_at
            .map(|t| t.elapsed())
            .unwrap_or(Duration::ZERO);
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(self.status.clone());
        }
    }
}

/// A process that never touches the OS.
pub struct FakeProcess {
    args: Vec<String>,
    state: Arc<Mutex<FakeState>>,
}

impl Process for FakeProcess {
    fn start(&self) -> oneshot::Receiver<CmdStatus> {
        let (tx, rx) = oneshot::channel();
        let mut state = self.state.lock().unwrap();

        if state.finished {
            let _ = tx.send(state.status.clone());
            return rx;
        }
        state.waiters.push(tx);
        if state.started_at.is_some() {
            return rx;
        }

        state.started_at = Some(Instant::now());
        state.status.pid = NEXT_PID.fetch_add(1, Ordering::Relaxed);

        let behaviour = state.behaviour.clone();
        if let FakeBehaviour::Exit(code) = behaviour {
            state.status.stdout = self.args.clone();
            state.finish(code, None, true);
        }
        rx
    }

    fn stop(&self) -> Result<(), CmdError> {
        let mut state = self.state.lock().unwrap();
        state.stop_calls += 1;
        if state.started_at.is_none() || state.finished {
            return Ok(());
        }

        let behaviour = state.behaviour.clone();
        match behaviour {
            FakeBehaviour::Exit(_) | FakeBehaviour::Hang => {
                state.finish(EXIT_UNKNOWN, Some(CmdError::Signaled("SIGTERM".to_string())), false);
                Ok(())
            }
            FakeBehaviour::HangExitZeroOnStop => {
                state.status.stderr.push("Terminated".to_string());
                state.finish(0, None, false);
                Ok(())
            }
            FakeBehaviour::HangStopFails => Err(CmdError::Terminate(
                "operation not permitted".to_string(),
            )),
        }
    }

    fn status(&self) -> CmdStatus {
        let state = self.state.lock().unwrap();
        let mut status = state.status.clone();
        if let (Some(started_at), false) = (state.started_at, state.finished) {
            status.runtime = started_at.elapsed();
        }
        status
    }
}

/// Test-side handle to a spawned [`FakeProcess`].
#[derive(Clone)]
pub struct FakeHandle {
    name: String,
    state: Arc<Mutex<FakeState>>,
}

impl FakeHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_started(&self) -> bool {
        self.state.lock().unwrap().started_at.is_some()
    }

    pub fn is_finished(&self) -> bool {
        self.state.lock().unwrap().finished
    }

    pub fn stop_calls(&self) -> usize {
        self.state.lock().unwrap().stop_calls
    }

    /// Append a stdout line, visible in live status snapshots.
    pub fn push_stdout(&self, line: &str) {
        self.state.lock().unwrap().status.stdout.push(line.to_string());
    }

    /// Let the process exit on its own with `exit`.
    pub fn finish(&self, exit: i32) {
        self.state.lock().unwrap().finish(exit, None, true);
    }
}

/// A spawner producing [`FakeProcess`]es.
///
/// Every command gets the default behaviour unless overridden by program
/// name with [`FakeSpawner::with`]. Clones share the list of spawned
/// processes, so a test can keep one clone while the runner owns another.
#[derive(Clone)]
pub struct FakeSpawner {
    default: FakeBehaviour,
    overrides: HashMap<String, FakeBehaviour>,
    spawned: Arc<Mutex<Vec<FakeHandle>>>,
}

impl FakeSpawner {
    pub fn new(default: FakeBehaviour) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
            spawned: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with(mut self, name: &str, behaviour: FakeBehaviour) -> Self {
        self.overrides.insert(name.to_string(), behaviour);
        self
    }

    /// Handles of every process spawned so far, in spawn order.
    pub fn spawned(&self) -> Vec<FakeHandle> {
        self.spawned.lock().unwrap().clone()
    }

    /// Program names of every process spawned so far, in spawn order.
    pub fn spawned_names(&self) -> Vec<String> {
        self.spawned()
            .iter()
            .map(|h| h.name().to_string())
            .collect()
    }

    /// Poll until the `index`-th spawned process has started.
    pub async fn wait_started(&self, index: usize) -> FakeHandle {
        for _ in 0..200 {
            if let Some(handle) = self.spawned().get(index) {
                if handle.is_started() {
                    return handle.clone();
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("process {index} did not start");
    }
}

impl Spawner for FakeSpawner {
    type Process = FakeProcess;

    fn spawn(&self, spec: &CmdSpec) -> FakeProcess {
        let behaviour = self
            .overrides
            .get(&spec.name)
            .cloned()
            .unwrap_or_else(|| self.default.clone());

        let state = Arc::new(Mutex::new(FakeState {
            behaviour,
            status: CmdStatus::not_started(spec.name.clone()),
            started_at: None,
            finished: false,
            stop_calls: 0,
            waiters: Vec::new(),
        }));

        self.spawned.lock().unwrap().push(FakeHandle {
            name: spec.name.clone(),
            state: Arc::clone(&state),
        });

        FakeProcess {
            args: spec.args.clone(),
            state,
        }
    }
}
