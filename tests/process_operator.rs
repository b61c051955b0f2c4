// tests/process_operator.rs
mod common;
use crate::common::{init_tracing, with_timeout};

use std::sync::Arc;
use std::time::Duration;

use dagrun::dag::Task;
use dagrun::operator::{Interpreter, OperatorOutcome, OperatorSettings, ProcessOperator, ProcessState};
use dagrun::types::OperatorType;

fn bash(command: &str) -> ProcessOperator {
    bash_with(command, OperatorSettings::default())
}

fn bash_with(command: &str, settings: OperatorSettings) -> ProcessOperator {
    let task = Task::new(1, OperatorType::Bash, command);
    ProcessOperator::new(task, Arc::new(settings), Interpreter::Bash)
}

#[tokio::test]
async fn echo_succeeds_and_captures_output() {
    init_tracing();

    let op = bash("echo hello");
    assert_eq!(op.state(), ProcessState::NotStarted);
    assert!(!op.is_finished());
    assert!(!op.is_success());

    let outcome = with_timeout(op.process()).await;

    assert_eq!(outcome, OperatorOutcome::Success);
    assert!(op.is_finished());
    assert!(op.is_success());
    assert_eq!(op.exit_value(), Some(0));
    assert_eq!(op.output(), "hello\n");
    assert_eq!(op.pid(), None, "pid is only reported while running");
}

#[tokio::test]
async fn non_zero_exit_is_a_failure_not_an_error() {
    init_tracing();

    let op = bash("exit 7");
    let outcome = with_timeout(op.process()).await;

    assert_eq!(outcome, OperatorOutcome::Failed { exit_value: 7 });
    assert!(op.is_finished());
    assert!(!op.is_success());
    assert_eq!(op.exit_value(), Some(7));
}

#[tokio::test]
async fn spawn_failure_finishes_with_minus_one() {
    init_tracing();

    let settings = OperatorSettings {
        bash: "/definitely/not/a/shell".to_string(),
        ..OperatorSettings::default()
    };
    let op = bash_with("echo unreachable", settings);
    let outcome = with_timeout(op.process()).await;

    assert_eq!(outcome, OperatorOutcome::Failed { exit_value: -1 });
    assert_eq!(op.state(), ProcessState::Finished { exit_value: -1 });
    assert!(op.is_finished());
    assert!(!op.is_success());
    assert!(op.output().is_empty());
}

#[tokio::test]
async fn stderr_is_captured_with_stdout() {
    init_tracing();

    let op = bash("echo out; echo err >&2");
    with_timeout(op.process()).await;

    let output = op.output();
    assert!(output.contains("out\n"), "stdout missing from {output:?}");
    assert!(output.contains("err\n"), "stderr missing from {output:?}");
}

#[tokio::test]
async fn success_is_measured_against_expected_exit_value() {
    init_tracing();

    let op = bash_with("exit 3", OperatorSettings::default().with_expected_exit_value(3));
    let outcome = with_timeout(op.process()).await;
    assert_eq!(outcome, OperatorOutcome::Success);
    assert!(op.is_success());

    let op = bash_with("exit 0", OperatorSettings::default().with_expected_exit_value(3));
    let outcome = with_timeout(op.process()).await;
    assert_eq!(outcome, OperatorOutcome::Failed { exit_value: 0 });
    assert!(!op.is_success());
}

#[tokio::test]
async fn environment_is_inherited() {
    init_tracing();

    // PATH is always set for the test harness; the child must see the same value.
    let expected = std::env::var("PATH").unwrap_or_default();
    let op = bash("printf '%s' \"$PATH\"");
    with_timeout(op.process()).await;

    assert_eq!(op.output(), expected);
}

#[tokio::test]
async fn watchdog_kills_a_process_that_runs_too_long() {
    init_tracing();

    let settings = OperatorSettings::default().with_timeout(Some(Duration::from_millis(300)));
    let op = bash_with("sleep 30", settings);

    let started = std::time::Instant::now();
    let outcome = with_timeout(op.process()).await;

    assert_eq!(outcome, OperatorOutcome::Killed);
    assert!(matches!(op.state(), ProcessState::Killed { .. }));
    assert!(op.is_finished());
    assert!(!op.is_success());
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn explicit_kill_ends_the_run_as_killed() {
    init_tracing();

    let op = Arc::new(bash("echo started; sleep 30"));

    let runner = {
        let op = Arc::clone(&op);
        tokio::spawn(async move { op.process().await })
    };

    // Wait until the process is up and has produced output.
    with_timeout(async {
        while !op.output().contains("started") {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(op.pid().is_some());

    op.kill().await;
    let outcome = with_timeout(runner).await.expect("runner task panicked");

    assert_eq!(outcome, OperatorOutcome::Killed);
    assert!(op.is_finished());
    assert!(!op.is_success());
}

#[tokio::test]
async fn kill_before_start_is_a_no_op() {
    init_tracing();

    let op = bash("echo later");
    op.kill().await;
    assert_eq!(op.state(), ProcessState::NotStarted);

    let outcome = with_timeout(op.process()).await;
    assert_eq!(outcome, OperatorOutcome::Success);
}

#[tokio::test]
async fn python_interpreter_runs_python_code() {
    init_tracing();

    let task = Task::new(2, OperatorType::Python, "print(6 * 7)");
    let op = ProcessOperator::new(task, Arc::new(OperatorSettings::default()), Interpreter::Python);

    let outcome = with_timeout(op.process()).await;

    // Hosts without python3 report a spawn failure instead.
    match outcome {
        OperatorOutcome::Success => assert_eq!(op.output(), "42\n"),
        OperatorOutcome::Failed { exit_value } => assert_eq!(exit_value, -1),
        other => panic!("unexpected outcome {other:?}"),
    }
}
