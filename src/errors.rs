// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! Process-level failures (spawn errors, non-zero exits, kill problems) are
//! never reported through this type; they live in operator state.

use thiserror::Error;

use crate::types::{OperatorType, TaskId};

#[derive(Error, Debug)]
pub enum DagrunError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("unsupported operator type '{kind}' for task {task}")]
    UnsupportedOperator { task: TaskId, kind: OperatorType },

    #[error("Cycle detected in DAG: {0}")]
    DagCycle(String),

    #[error("inconsistent edge {parent} -> {child}: both sides must reference each other")]
    InconsistentEdge { parent: TaskId, child: TaskId },

    #[error("a graph run is still in flight; wait for it to finish before starting again")]
    AlreadyRunning,

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DagrunError>;
