//! End-to-end supervisor lifecycle tests against real child processes.

#![cfg(unix)]

use std::sync::Arc;
use std::time::Duration;

use svcwrap::config::WrapperConfig;
use svcwrap::logging::StreamKind;
use svcwrap::supervisor::{Supervisor, SupervisorError, SupervisorState};

use crate::support::{MemorySink, RecordingFatal};

const TEST_TIMEOUT: Duration = Duration::from_secs(10);

fn supervisor(config: WrapperConfig) -> (Supervisor, Arc<MemorySink>, Arc<RecordingFatal>) {
    let sink = MemorySink::new();
    let fatal = RecordingFatal::new();
    let sup = Supervisor::new(config, sink.clone()).with_fatal_handler(fatal.clone());
    (sup, sink, fatal)
}

async fn wait_for_state(sup: &Supervisor, wanted: SupervisorState) {
    let mut rx = sup.subscribe_state();
    tokio::time::timeout(TEST_TIMEOUT, rx.wait_for(|s| *s == wanted))
        .await
        .expect("timed out waiting for state")
        .unwrap();
}

#[tokio::test]
async fn echo_output_is_logged_and_exit_escalates() {
    let config = WrapperConfig::new("echo")
        .with_args(["hello"])
        .with_capture_stdout(true);
    let (mut sup, sink, fatal) = supervisor(config);

    sup.start().unwrap();
    wait_for_state(&sup, SupervisorState::FatalExit).await;
    tokio::time::timeout(TEST_TIMEOUT, sup.wait_for_exit())
        .await
        .unwrap();

    assert_eq!(sink.stream(StreamKind::Stdout), vec!["hello"]);
    assert!(sink.stream(StreamKind::Stderr).is_empty());
    // Exactly one escalation, for a clean exit.
    assert_eq!(fatal.exits(), vec![true]);
}

#[tokio::test]
async fn failing_child_escalates_with_error() {
    let config = WrapperConfig::new("sh").with_args(["-c", "exit 5"]);
    let (mut sup, _sink, fatal) = supervisor(config);

    sup.start().unwrap();
    wait_for_state(&sup, SupervisorState::FatalExit).await;

    assert_eq!(fatal.exits(), vec![false]);
}

#[tokio::test]
async fn stop_kills_long_running_child() {
    let config = WrapperConfig::new("sleep").with_args(["3600"]);
    let (mut sup, _sink, fatal) = supervisor(config);

    sup.start().unwrap();
    assert_eq!(sup.state(), SupervisorState::Running);

    tokio::time::timeout(TEST_TIMEOUT, sup.stop())
        .await
        .expect("stop did not complete")
        .unwrap();

    assert_eq!(sup.state(), SupervisorState::Stopped);
    assert!(fatal.exits().is_empty());

    tokio::time::timeout(TEST_TIMEOUT, sup.wait_for_exit())
        .await
        .unwrap();
}

#[tokio::test]
async fn stderr_and_partial_lines_are_flushed() {
    let script = "printf 'out one\\r\\nout two'; printf 'err line\\n' >&2; exec sleep 3600";
    let config = WrapperConfig::new("sh")
        .with_args(["-c", script])
        .with_capture_stdout(true)
        .with_capture_stderr(true);
    let (mut sup, sink, fatal) = supervisor(config);

    sup.start().unwrap();
    tokio::time::timeout(TEST_TIMEOUT, async {
        while sink.lines().len() < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("output never arrived");

    sup.stop().await.unwrap();
    sup.wait_for_exit().await;

    assert_eq!(sink.stream(StreamKind::Stdout), vec!["out one", "out two"]);
    assert_eq!(sink.stream(StreamKind::Stderr), vec!["err line"]);
    assert!(fatal.exits().is_empty());
}

#[tokio::test]
async fn working_directory_is_applied() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let temp_path = temp_dir.path().canonicalize().unwrap();

    let config = WrapperConfig::new("pwd")
        .with_cwd(&temp_path)
        .with_capture_stdout(true);
    let (mut sup, sink, _fatal) = supervisor(config);

    sup.start().unwrap();
    tokio::time::timeout(TEST_TIMEOUT, sup.wait_for_exit())
        .await
        .unwrap();

    assert_eq!(
        sink.stream(StreamKind::Stdout),
        vec![temp_path.to_str().unwrap().to_string()]
    );
}

#[tokio::test]
async fn spawn_failure_is_reported_from_start() {
    let config = WrapperConfig::new("/nonexistent/definitely-not-a-daemon");
    let (mut sup, _sink, fatal) = supervisor(config);

    assert!(matches!(sup.start(), Err(SupervisorError::Spawn(_))));
    assert_eq!(sup.state(), SupervisorState::Idle);
    assert!(matches!(sup.stop().await, Err(SupervisorError::NotStarted)));
    assert!(fatal.exits().is_empty());
}

#[tokio::test]
async fn concurrent_stops_fault_the_control_loop() {
    let config = WrapperConfig::new("sleep").with_args(["3600"]);
    let (mut sup, _sink, fatal) = supervisor(config);
    sup.start().unwrap();

    let (first, second) = tokio::time::timeout(TEST_TIMEOUT, async {
        tokio::join!(sup.stop(), sup.stop())
    })
    .await
    .expect("stops did not resolve");

    assert!(matches!(first, Err(SupervisorError::ControlLoopExited)));
    assert!(matches!(second, Err(SupervisorError::ControlLoopExited)));
    assert_eq!(sup.state(), SupervisorState::Faulted);
    assert!(fatal.exits().is_empty());

    // The first stop's kill still lands, so the watcher finishes.
    tokio::time::timeout(TEST_TIMEOUT, sup.wait_for_exit())
        .await
        .unwrap();
}

#[tokio::test]
async fn stop_twice_in_sequence_is_idempotent() {
    let config = WrapperConfig::new("sleep").with_args(["3600"]);
    let (mut sup, _sink, _fatal) = supervisor(config);
    sup.start().unwrap();

    sup.stop().await.unwrap();
    tokio::time::timeout(TEST_TIMEOUT, sup.stop())
        .await
        .expect("second stop hung")
        .unwrap();
    assert_eq!(sup.state(), SupervisorState::Stopped);
}
