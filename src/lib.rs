// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod operator;
pub mod tracker;
pub mod types;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::TaskFile;
use crate::dag::{TaskStore, root_ids, topological_order};
use crate::engine::{RunSummary, SchedulingEngine, TokioEngine};
use crate::tracker::GraphTracker;
use crate::types::FailurePolicy;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - task file loading
/// - task store / scheduling engine / graph tracker
/// - Ctrl-C handling
///
/// Returns `None` for `--dry-run`, otherwise the summary of the finished run.
pub async fn run(args: CliArgs) -> Result<Option<RunSummary>> {
    let file = load_and_validate(&args.tasks)
        .with_context(|| format!("loading task file {}", args.tasks.display()))?;

    if args.dry_run {
        print_dry_run(&file)?;
        return Ok(None);
    }

    let (mut settings, store) = file.into_parts();
    if args.halt_on_failure {
        settings.failure_policy = FailurePolicy::Halt;
    }
    info!(
        tasks = store.len(),
        policy = ?settings.failure_policy,
        timeout = ?settings.timeout,
        "task file loaded"
    );

    let store: Arc<dyn TaskStore> = Arc::new(store);
    let engine = TokioEngine::new(Arc::clone(&store))?;
    let tracker = GraphTracker::new(
        store,
        Arc::new(engine.clone()) as Arc<dyn SchedulingEngine>,
        Arc::new(settings),
    );

    let report = tracker.start()?;
    if report.roots.is_empty() {
        warn!("no live virtual task found; nothing to run");
    }
    for (task, err) in &report.rejected {
        warn!(task, error = %err, "branch not started");
    }

    // Each Ctrl-C kills whatever is still running; the run ends once idle.
    loop {
        tokio::select! {
            _ = engine.wait_idle() => {
                debug!("all jobs finished");
                break;
            }
            res = tokio::signal::ctrl_c() => {
                match res {
                    Ok(()) => info!("Ctrl-C received; cancelling the run and killing running tasks"),
                    Err(e) => {
                        warn!(error = %e, "failed to listen for Ctrl-C; waiting for the run to finish");
                        engine.wait_idle().await;
                        break;
                    }
                }
                engine.kill_all().await;
            }
        }
    }

    let summary = engine.ledger().summary();
    println!("{summary}");
    Ok(Some(summary))
}

/// Print tasks, roots and a valid execution order without running anything.
fn print_dry_run(file: &TaskFile) -> Result<()> {
    let settings = file.settings();
    println!("dagrun dry-run");
    println!("  config.expected_exit_value = {}", settings.expected_exit_value);
    println!("  config.failure_policy = {:?}", settings.failure_policy);
    match settings.timeout {
        Some(t) => println!("  config.timeout = {t:?}"),
        None => println!("  config.timeout = none"),
    }
    println!();

    let tasks = file.tasks();
    println!("tasks ({}):", tasks.len());
    for task in tasks {
        let removed = if task.is_live() { "" } else { " (removed)" };
        println!("  - {} [{}] {}{removed}", task.id, task.operator_type, task.name);
        if !task.command.is_empty() {
            println!("      command: {}", task.command);
        }
        if !task.parent_ids.is_empty() {
            println!("      parents: {:?}", task.parent_ids);
        }
    }
    println!();

    println!("roots: {:?}", root_ids(tasks));
    println!("order: {:?}", topological_order(tasks)?);

    debug!("dry-run complete (no execution)");
    Ok(())
}
