// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `dagrun`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "dagrun",
    version,
    about = "Run a DAG of tasks, each task triggering its children once its own work is done.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the task file (TOML).
    ///
    /// Default: `Dagrun.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Dagrun.toml")]
    pub tasks: PathBuf,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DAGRUN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print tasks, roots and execution order, but don't
    /// run anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Do not trigger the children of a failed task, whatever the task file
    /// says.
    #[arg(long)]
    pub halt_on_failure: bool,
}

impl CliArgs {
    /// Arguments for running `path` with every flag at its default.
    pub fn for_task_file(path: impl Into<PathBuf>) -> Self {
        Self {
            tasks: path.into(),
            log_level: None,
            dry_run: false,
            halt_on_failure: false,
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
