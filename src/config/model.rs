// src/config/model.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::dag::{InMemoryTaskStore, Task};
use crate::operator::OperatorSettings;
use crate::types::{FailurePolicy, OperatorType, TaskId};

/// Task file exactly as read from TOML, before validation.
///
/// ```toml
/// [config]
/// expected_exit_value = 0
/// failure_policy = "continue"
/// timeout = "30m"
///
/// [task.1]
/// type = "virtual"
/// name = "nightly"
///
/// [task.2]
/// type = "bash"
/// command = "echo hello"
/// parents = [1]
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTaskFile {
    /// Operator behaviour from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// All tasks from `[task.<id>]`. Keys must be numeric task ids.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Exit code that counts as success for bash / python tasks.
    #[serde(default)]
    pub expected_exit_value: i32,

    /// `"continue"` (default) or `"halt"`.
    ///
    /// - `"continue"`: children run whether or not their parent succeeded.
    /// - `"halt"`: a failed task does not trigger its children.
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Watchdog threshold such as `"30m"`; absent means no timeout.
    #[serde(default)]
    pub timeout: Option<String>,

    #[serde(default = "default_bash")]
    pub bash: String,

    #[serde(default = "default_python")]
    pub python: String,
}

fn default_bash() -> String {
    "bash".to_string()
}

fn default_python() -> String {
    "python3".to_string()
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            expected_exit_value: 0,
            failure_policy: FailurePolicy::default(),
            timeout: None,
            bash: default_bash(),
            python: default_python(),
        }
    }
}

/// `[task.<id>]` section.
///
/// Edges may be written on either end: `parents` on the child, `children` on
/// the parent, or both. The loader merges them.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// Operator type; unknown names load as `Unsupported`.
    #[serde(rename = "type")]
    pub operator_type: OperatorType,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub command: String,

    #[serde(default)]
    pub owner: u64,

    #[serde(default)]
    pub parents: Vec<TaskId>,

    #[serde(default)]
    pub children: Vec<TaskId>,

    /// Soft-delete flag.
    #[serde(default)]
    pub removed: bool,

    /// RFC 3339 string, e.g. `"2024-05-01T08:00:00Z"`. Defaults to load time.
    #[serde(default)]
    pub create_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub update_time: Option<DateTime<Utc>>,
}

/// Validated task file: operator settings plus an edge-consistent, acyclic
/// task set.
#[derive(Debug, Clone)]
pub struct TaskFile {
    settings: OperatorSettings,
    tasks: Vec<Task>,
}

impl TaskFile {
    /// Construct without validation. Prefer `TaskFile::try_from(raw)`.
    pub fn new_unchecked(settings: OperatorSettings, tasks: Vec<Task>) -> Self {
        Self { settings, tasks }
    }

    pub fn settings(&self) -> &OperatorSettings {
        &self.settings
    }

    /// Tasks in ascending id order, soft-deleted ones included.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn into_parts(self) -> (OperatorSettings, InMemoryTaskStore) {
        (
            self.settings,
            InMemoryTaskStore::from_tasks_unchecked(self.tasks),
        )
    }
}
