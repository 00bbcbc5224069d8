mod common;
use crate::common::builders::BatchBuilder;
use crate::common::init_tracing;

use std::error::Error;
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use seqrun::errors::{CmdError, RunError};
use seqrun::exec::Spawner;
use seqrun::runner::{Runner, SequentialRunner};
use seqrun::types::{CmdSpec, CmdStatus, EXIT_UNKNOWN};
use seqrun_test_utils::fake_process::{FakeBehaviour, FakeProcess, FakeSpawner};
use seqrun_test_utils::with_timeout;

type TestResult = Result<(), Box<dyn Error>>;

fn ok_fail_ok() -> Vec<CmdSpec> {
    BatchBuilder::new()
        .cmd("ok", &["a"])
        .cmd("fail", &["b"])
        .cmd("ok", &["c"])
        .build()
}

#[tokio::test]
async fn test_failures_ignored_without_stop_on_error() -> TestResult {
    init_tracing();

    let spawner = FakeSpawner::new(FakeBehaviour::Exit(0)).with("fail", FakeBehaviour::Exit(2));
    let runner = SequentialRunner::with_spawner(false, spawner.clone());

    runner.run(&ok_fail_ok()).await?;

    assert_eq!(spawner.spawned_names(), vec!["ok", "fail", "ok"]);

    let (statuses, current) = runner.status();
    assert_eq!(current, None);
    assert_eq!(statuses.len(), 3);
    assert!(statuses.iter().all(|s| s.complete));
    assert_eq!(
        statuses.iter().map(|s| s.exit).collect::<Vec<_>>(),
        vec![0, 2, 0]
    );
    assert_eq!(statuses[2].stdout, vec!["c".to_string()]);

    Ok(())
}

#[tokio::test]
async fn test_stop_on_error_leaves_rest_not_started() -> TestResult {
    init_tracing();

    let spawner = FakeSpawner::new(FakeBehaviour::Exit(0)).with("fail", FakeBehaviour::Exit(2));
    let runner = SequentialRunner::with_spawner(true, spawner.clone());

    let result = runner.run(&ok_fail_ok()).await;
    assert_eq!(result, Err(RunError::NonZeroExit { index: 1, exit: 2 }));
    assert_eq!(spawner.spawned_names(), vec!["ok", "fail"]);

    let (statuses, current) = runner.status();
    assert_eq!(current, None);
    assert_eq!(statuses.len(), 3);
    assert!(statuses[0].complete);
    assert_eq!(statuses[0].exit, 0);
    assert!(statuses[1].complete);
    assert_eq!(statuses[1].exit, 2);
    assert_eq!(statuses[2], CmdStatus::not_started("ok"));
    assert!(!runner.is_running());

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_second_run_rejected_while_running() -> TestResult {
    init_tracing();

    let spawner = FakeSpawner::new(FakeBehaviour::Hang);
    let runner = Arc::new(SequentialRunner::with_spawner(true, spawner.clone()));
    let cmds = BatchBuilder::new().cmd("a", &[]).cmd("b", &[]).build();

    let handle = {
        let runner = Arc::clone(&runner);
        let cmds = cmds.clone();
        tokio::spawn(async move { runner.run(&cmds).await })
    };

    let first = spawner.wait_started(0).await;
    assert!(runner.is_running());

    let other = BatchBuilder::new().cmd("x", &[]).build();
    assert_eq!(runner.run(&other).await, Err(RunError::AlreadyRunning));

    // The rejected call touched nothing.
    let (statuses, current) = runner.status();
    assert_eq!(statuses.len(), 2);
    assert_eq!(current, Some(0));
    assert_eq!(spawner.spawned_names(), vec!["a"]);

    first.finish(0);
    spawner.wait_started(1).await.finish(0);

    assert_eq!(with_timeout(handle).await?, Ok(()));

    let (statuses, current) = runner.status();
    assert_eq!(current, None);
    assert!(statuses.iter().all(|s| s.complete && s.exit == 0));

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_terminates_in_flight_command() -> TestResult {
    init_tracing();

    let spawner = FakeSpawner::new(FakeBehaviour::Hang);
    let runner = Arc::new(SequentialRunner::with_spawner(false, spawner.clone()));
    let cmds = BatchBuilder::new().cmd("a", &[]).cmd("b", &[]).cmd("c", &[]).build();

    // Before any run: no-op.
    runner.stop()?;
    assert!(spawner.spawned().is_empty());

    let handle = {
        let runner = Arc::clone(&runner);
        tokio::spawn(async move { runner.run(&cmds).await })
    };

    let first = spawner.wait_started(0).await;
    runner.stop()?;

    assert_eq!(with_timeout(handle).await?, Err(RunError::Stopped));
    let stop_calls = first.stop_calls();
    assert!(stop_calls >= 1);
    assert_eq!(spawner.spawned_names(), vec!["a"]);

    let (statuses, current) = runner.status();
    assert_eq!(current, None);
    assert_eq!(statuses.len(), 3);
    assert!(!statuses[0].complete);
    assert_eq!(statuses[0].exit, EXIT_UNKNOWN);
    assert_eq!(
        statuses[0].error,
        Some(CmdError::Signaled("SIGTERM".to_string()))
    );
    assert_eq!(statuses[1], CmdStatus::not_started("b"));
    assert_eq!(statuses[2], CmdStatus::not_started("c"));

    // Idle again: further stops do nothing.
    runner.stop()?;
    runner.stop()?;
    assert_eq!(first.stop_calls(), stop_calls);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_reports_terminate_error_and_still_ends_batch() -> TestResult {
    init_tracing();

    let spawner = FakeSpawner::new(FakeBehaviour::HangStopFails);
    let runner = Arc::new(SequentialRunner::with_spawner(false, spawner.clone()));
    let cmds = BatchBuilder::new().cmd("a", &[]).cmd("b", &[]).build();

    let handle = {
        let runner = Arc::clone(&runner);
        tokio::spawn(async move { runner.run(&cmds).await })
    };

    let first = spawner.wait_started(0).await;

    let expected = Err(CmdError::Terminate("operation not permitted".to_string()));
    assert_eq!(runner.stop(), expected);
    // Already cancelled, but the running process is asked again.
    assert_eq!(runner.stop(), expected);
    assert!(first.stop_calls() >= 2);

    // The command ends on its own; nothing else is launched.
    first.finish(0);
    assert_eq!(with_timeout(handle).await?, Err(RunError::Stopped));
    assert_eq!(spawner.spawned_names(), vec!["a"]);

    let (statuses, _) = runner.status();
    assert!(statuses[0].complete);
    assert_eq!(statuses[0].exit, 0);
    assert!(statuses[1].is_not_started());

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_after_zero_exit_on_sigterm_still_stops() -> TestResult {
    init_tracing();

    let spawner = FakeSpawner::new(FakeBehaviour::HangExitZeroOnStop);
    let runner = Arc::new(SequentialRunner::with_spawner(false, spawner.clone()));
    let cmds = BatchBuilder::new().cmd("a", &[]).cmd("b", &[]).build();

    let handle = {
        let runner = Arc::clone(&runner);
        tokio::spawn(async move { runner.run(&cmds).await })
    };

    spawner.wait_started(0).await;
    runner.stop()?;

    assert_eq!(with_timeout(handle).await?, Err(RunError::Stopped));

    let (statuses, _) = runner.status();
    assert!(!statuses[0].complete);
    assert_eq!(statuses[0].exit, 0);
    assert_eq!(statuses[0].error, None);
    assert_eq!(statuses[0].stderr, vec!["Terminated".to_string()]);
    assert_eq!(statuses[1], CmdStatus::not_started("b"));

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_status_shows_live_output_of_running_command() -> TestResult {
    init_tracing();

    let spawner = FakeSpawner::new(FakeBehaviour::Hang);
    let runner = Arc::new(SequentialRunner::with_spawner(true, spawner.clone()));
    let cmds = BatchBuilder::new().cmd("a", &[]).cmd("b", &[]).build();

    let handle = {
        let runner = Arc::clone(&runner);
        tokio::spawn(async move { runner.run(&cmds).await })
    };

    let first = spawner.wait_started(0).await;
    first.push_stdout("partial");

    let (statuses, current) = runner.status();
    assert_eq!(current, Some(0));
    assert_ne!(statuses[0].pid, 0);
    assert!(!statuses[0].complete);
    assert_eq!(statuses[0].exit, EXIT_UNKNOWN);
    assert_eq!(statuses[0].stdout, vec!["partial".to_string()]);
    assert_eq!(statuses[1], CmdStatus::not_started("b"));

    first.finish(0);
    let second = spawner.wait_started(1).await;

    let (statuses, current) = runner.status();
    assert_eq!(current, Some(1));
    assert!(statuses[0].complete);
    assert_eq!(statuses[0].stdout, vec!["partial".to_string()]);
    assert_ne!(statuses[1].pid, 0);
    assert_ne!(statuses[1].pid, statuses[0].pid);

    second.finish(0);
    assert_eq!(with_timeout(handle).await?, Ok(()));
    assert_eq!(runner.status().1, None);

    Ok(())
}

/// Calls `stop` on its runner while creating the first process, before the
/// runner has published it as the current command.
struct StopWhileSpawning {
    inner: FakeSpawner,
    runner: OnceLock<Weak<SequentialRunner<StopWhileSpawning>>>,
}

impl Spawner for StopWhileSpawning {
    type Process = FakeProcess;

    fn spawn(&self, spec: &CmdSpec) -> FakeProcess {
        if let Some(runner) = self.runner.get().and_then(Weak::upgrade) {
            assert_eq!(runner.stop(), Ok(()));
        }
        self.inner.spawn(spec)
    }
}

#[tokio::test]
async fn test_stop_before_process_is_published_still_terminates_it() -> TestResult {
    init_tracing();

    let fakes = FakeSpawner::new(FakeBehaviour::Hang);
    let runner = Arc::new(SequentialRunner::with_spawner(
        false,
        StopWhileSpawning {
            inner: fakes.clone(),
            runner: OnceLock::new(),
        },
    ));
    let _ = runner.spawner().runner.set(Arc::downgrade(&runner));

    let cmds = BatchBuilder::new().cmd("a", &[]).cmd("b", &[]).build();
    assert_eq!(with_timeout(runner.run(&cmds)).await, Err(RunError::Stopped));
    assert_eq!(fakes.spawned_names(), vec!["a"]);
    assert!(fakes.spawned()[0].stop_calls() >= 1);

    let (statuses, current) = runner.status();
    assert_eq!(current, None);
    assert!(!statuses[0].complete);
    assert_eq!(
        statuses[0].error,
        Some(CmdError::Signaled("SIGTERM".to_string()))
    );
    assert_eq!(statuses[1], CmdStatus::not_started("b"));
    assert!(!runner.is_running());

    Ok(())
}

#[tokio::test]
async fn test_abandoned_run_stops_process_and_goes_idle() -> TestResult {
    init_tracing();

    let spawner = FakeSpawner::new(FakeBehaviour::Hang);
    let runner = SequentialRunner::with_spawner(true, spawner.clone());
    let cmds = BatchBuilder::new().cmd("a", &[]).cmd("b", &[]).build();

    let timed_out = tokio::time::timeout(Duration::from_millis(50), runner.run(&cmds)).await;
    assert!(timed_out.is_err());

    assert!(!runner.is_running());
    let first = &spawner.spawned()[0];
    assert_eq!(first.stop_calls(), 1);
    assert!(first.is_finished());

    let (statuses, current) = runner.status();
    assert_eq!(current, None);
    assert_eq!(statuses.len(), 2);

    // Nothing left to stop.
    runner.stop()?;
    assert_eq!(first.stop_calls(), 1);

    Ok(())
}

#[tokio::test]
async fn test_runner_usable_as_trait_object() -> TestResult {
    init_tracing();

    let runner: Box<dyn Runner> = Box::new(SequentialRunner::with_spawner(
        true,
        FakeSpawner::new(FakeBehaviour::Exit(0)),
    ));
    let cmds = BatchBuilder::new().cmd("echo", &["hi"]).build();

    runner.run(&cmds).await?;
    runner.stop()?;

    let (statuses, current) = runner.status();
    assert_eq!(current, None);
    assert_eq!(statuses[0].stdout, vec!["hi".to_string()]);

    Ok(())
}
