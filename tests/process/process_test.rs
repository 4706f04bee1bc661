//! Tests for supervised process spawning and control.

use svcwrap::process::{ChildProcess, ChildProcessBuilder, ExitError, SpawnError};

#[test]
fn builder_collects_args_in_order() {
    let builder = ChildProcessBuilder::new("daemon")
        .args(["--port", "8080"])
        .args(["-v"]);

    assert_eq!(builder.program(), "daemon");
    assert_eq!(builder.get_args(), ["--port", "8080", "-v"]);
}

#[test]
fn builder_working_dir_not_set() {
    let builder = ChildProcessBuilder::new("daemon");
    assert!(builder.get_working_dir().is_none());
}

#[tokio::test]
async fn spawn_missing_binary_is_not_found() {
    let builder = ChildProcessBuilder::new("/nonexistent/definitely-not-a-daemon");
    let err = ChildProcess::spawn(&builder).unwrap_err();
    assert!(matches!(err, SpawnError::NotFound { .. }));
}

#[cfg(unix)]
#[tokio::test]
async fn spawn_echo_and_wait() {
    let builder = ChildProcessBuilder::new("echo").args(["hello"]);
    let mut process = ChildProcess::spawn(&builder).unwrap();

    assert!(process.id().is_some());
    assert!(process.wait().await.is_ok());
}

#[cfg(unix)]
#[tokio::test]
async fn uncaptured_streams_are_not_piped() {
    let builder = ChildProcessBuilder::new("echo").args(["hello"]);
    let mut process = ChildProcess::spawn(&builder).unwrap();

    assert!(process.take_stdout().is_none());
    assert!(process.take_stderr().is_none());
    process.wait().await.unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn take_stdout_once() {
    let builder = ChildProcessBuilder::new("echo")
        .args(["hello"])
        .capture_stdout(true);
    let mut process = ChildProcess::spawn(&builder).unwrap();

    assert!(process.take_stdout().is_some());
    assert!(process.take_stdout().is_none());

    process.wait().await.unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn nonzero_exit_is_an_error() {
    let builder = ChildProcessBuilder::new("sh").args(["-c", "exit 7"]);
    let mut process = ChildProcess::spawn(&builder).unwrap();

    match process.wait().await {
        Err(ExitError::Status(status)) => assert_eq!(status.code(), Some(7)),
        other => panic!("expected exit status 7, got {other:?}"),
    }
}

#[cfg(unix)]
#[tokio::test]
async fn try_wait_on_running_process() {
    let builder = ChildProcessBuilder::new("sleep").args(["10"]);
    let mut process = ChildProcess::spawn(&builder).unwrap();

    let result = process.try_wait();
    assert!(result.is_ok());
    assert!(result.unwrap().is_none());

    process.kill().await.unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn start_kill_then_wait_reports_signal() {
    let builder = ChildProcessBuilder::new("sleep").args(["10"]);
    let mut process = ChildProcess::spawn(&builder).unwrap();

    assert!(process.start_kill().is_ok());

    match process.wait().await {
        Err(ExitError::Status(status)) => assert!(!status.success()),
        other => panic!("expected a killed status, got {other:?}"),
    }
}

#[cfg(unix)]
#[tokio::test]
async fn spawn_with_working_dir() {
    use tokio::io::AsyncReadExt;

    let temp_dir = tempfile::TempDir::new().unwrap();
    let temp_path = temp_dir.path().canonicalize().unwrap();

    let builder = ChildProcessBuilder::new("pwd")
        .working_dir(&temp_path)
        .capture_stdout(true);
    let mut process = ChildProcess::spawn(&builder).unwrap();

    let mut stdout = process.take_stdout().unwrap();
    let mut output = String::new();
    stdout.read_to_string(&mut output).await.unwrap();
    process.wait().await.unwrap();

    assert_eq!(output.trim(), temp_path.to_str().unwrap());
}

#[cfg(unix)]
#[tokio::test]
async fn spawn_in_missing_working_dir_fails() {
    let builder = ChildProcessBuilder::new("true").working_dir("/nonexistent/working/dir");
    assert!(ChildProcess::spawn(&builder).is_err());
}
