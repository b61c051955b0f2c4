// tests/cli_run.rs
mod common;
use crate::common::{init_tracing, with_timeout};

use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use tracing::Level;

use dagrun::cli::{CliArgs, LogLevel};
use dagrun::logging::resolve_level;
use dagrun::run;

type TestResult = Result<(), Box<dyn Error>>;

const PIPELINE: &str = r#"
[task.1]
type = "virtual"

[task.2]
type = "bash"
command = "echo extract"
parents = [1]

[task.3]
type = "bash"
command = "exit 2"
parents = [1]

[task.4]
type = "mail"
parents = [2, 3]
"#;

fn write_task_file(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("Dagrun.toml");
    std::fs::write(&path, contents).expect("write task file");
    path
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn run_reports_every_task_outcome() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let path = write_task_file(&dir, PIPELINE);

    let summary = with_timeout(run(CliArgs::for_task_file(path)))
        .await?
        .expect("a real run returns a summary");

    assert_eq!(summary.succeeded, vec![2]);
    assert_eq!(summary.failed, vec![(3, 2)]);
    assert_eq!(summary.skipped, vec![4], "join still runs under the default policy");
    assert!(!summary.is_clean());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn halt_on_failure_flag_overrides_the_task_file() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let path = write_task_file(&dir, PIPELINE);

    let mut args = CliArgs::for_task_file(path);
    args.halt_on_failure = true;

    let summary = with_timeout(run(args)).await?.expect("summary");
    assert_eq!(summary.succeeded, vec![2]);
    assert_eq!(summary.failed, vec![(3, 2)]);
    assert!(summary.skipped.is_empty(), "join must not run below a failed parent");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn clean_run_is_clean() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let path = write_task_file(
        &dir,
        r#"
[task.1]
type = "virtual"

[task.2]
type = "bash"
command = "true"
parents = [1]
"#,
    );

    let summary = with_timeout(run(CliArgs::for_task_file(path))).await?.expect("summary");
    assert!(summary.is_clean());
    assert_eq!(summary.total(), 1);
    Ok(())
}

#[tokio::test]
async fn dry_run_executes_nothing() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let marker = dir.path().join("ran");
    let path = write_task_file(
        &dir,
        &format!(
            "[task.1]\ntype = \"virtual\"\n\n[task.2]\ntype = \"bash\"\ncommand = \"touch '{}'\"\nparents = [1]\n",
            marker.display()
        ),
    );

    let mut args = CliArgs::for_task_file(path);
    args.dry_run = true;

    assert!(run(args).await?.is_none());
    assert!(!marker.exists());
    Ok(())
}

#[tokio::test]
async fn missing_task_file_is_an_error() {
    init_tracing();

    let dir = tempfile::tempdir().expect("tempdir");
    let result = run(CliArgs::for_task_file(dir.path().join("nope.toml"))).await;
    assert!(result.is_err());
}

#[test]
fn cli_flags_parse() {
    let args = CliArgs::try_parse_from([
        "dagrun",
        "--tasks",
        "jobs.toml",
        "--log-level",
        "debug",
        "--dry-run",
        "--halt-on-failure",
    ])
    .expect("valid flags");

    assert_eq!(args.tasks, PathBuf::from("jobs.toml"));
    assert!(matches!(args.log_level, Some(LogLevel::Debug)));
    assert!(args.dry_run);
    assert!(args.halt_on_failure);

    let defaults = CliArgs::try_parse_from(["dagrun"]).expect("no flags");
    assert_eq!(defaults.tasks, PathBuf::from("Dagrun.toml"));
    assert!(defaults.log_level.is_none());
    assert!(!defaults.dry_run);
}

#[test]
fn log_level_prefers_flag_then_env() {
    assert_eq!(resolve_level(Some(LogLevel::Trace), Some("error")), Level::TRACE);
    assert_eq!(resolve_level(None, Some("warning")), Level::WARN);
    assert_eq!(resolve_level(None, Some("nonsense")), Level::INFO);
    assert_eq!(resolve_level(None, None), Level::INFO);
}
