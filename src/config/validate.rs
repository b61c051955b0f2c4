// src/config/validate.rs

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;

use crate::config::duration::parse_duration;
use crate::config::model::{ConfigSection, RawTaskFile, TaskFile};
use crate::dag::{Task, validate_tasks};
use crate::errors::{DagrunError, Result};
use crate::operator::OperatorSettings;
use crate::types::TaskId;

impl TryFrom<RawTaskFile> for TaskFile {
    type Error = crate::errors::DagrunError;

    fn try_from(raw: RawTaskFile) -> std::result::Result<Self, Self::Error> {
        ensure_has_tasks(&raw)?;
        let settings = settings_from_config(&raw.config)?;
        let tasks = build_tasks(&raw)?;
        validate_tasks(&tasks)?;
        Ok(TaskFile::new_unchecked(settings, tasks))
    }
}

fn ensure_has_tasks(raw: &RawTaskFile) -> Result<()> {
    if raw.task.is_empty() {
        return Err(DagrunError::ConfigError(
            "task file must contain at least one [task.<id>] section".to_string(),
        ));
    }
    Ok(())
}

fn settings_from_config(cfg: &ConfigSection) -> Result<OperatorSettings> {
    let timeout = match cfg.timeout.as_deref() {
        Some(s) => Some(parse_duration(s).map_err(|e| {
            DagrunError::ConfigError(format!("[config].timeout = \"{s}\": {e}"))
        })?),
        None => None,
    };

    if cfg.bash.trim().is_empty() || cfg.python.trim().is_empty() {
        return Err(DagrunError::ConfigError(
            "[config].bash and [config].python must not be empty".to_string(),
        ));
    }

    Ok(OperatorSettings {
        expected_exit_value: cfg.expected_exit_value,
        failure_policy: cfg.failure_policy,
        timeout,
        bash: cfg.bash.clone(),
        python: cfg.python.clone(),
    })
}

/// Turn `[task.<id>]` sections into task records, merging edges declared on
/// either end so that both sides always agree.
fn build_tasks(raw: &RawTaskFile) -> Result<Vec<Task>> {
    let mut ids: BTreeMap<TaskId, &str> = BTreeMap::new();
    for key in raw.task.keys() {
        let id: TaskId = key.trim().parse().map_err(|_| {
            DagrunError::ConfigError(format!(
                "task key '{key}' is not a numeric task id (expected [task.<id>])"
            ))
        })?;
        if ids.insert(id, key.as_str()).is_some() {
            return Err(DagrunError::ConfigError(format!(
                "task id {id} is defined more than once"
            )));
        }
    }

    // Collect every edge as (parent, child).
    let mut edges: BTreeSet<(TaskId, TaskId)> = BTreeSet::new();
    for (&id, key) in &ids {
        let cfg = &raw.task[*key];
        for &parent in &cfg.parents {
            ensure_known(&ids, id, parent, "parent")?;
            edges.insert((parent, id));
        }
        for &child in &cfg.children {
            ensure_known(&ids, id, child, "child")?;
            edges.insert((id, child));
        }
    }

    let now = Utc::now();
    let mut tasks: BTreeMap<TaskId, Task> = BTreeMap::new();
    for (&id, key) in &ids {
        let cfg = &raw.task[*key];
        let create_time = cfg.create_time.unwrap_or(now);
        let task = Task {
            id,
            name: cfg.name.clone().unwrap_or_else(|| format!("task-{id}")),
            operator_type: cfg.operator_type,
            command: cfg.command.clone(),
            owner_id: cfg.owner,
            parent_ids: BTreeSet::new(),
            children_ids: BTreeSet::new(),
            is_remove: cfg.removed,
            create_time,
            update_time: cfg.update_time.unwrap_or(create_time),
        };
        tasks.insert(id, task);
    }

    for (parent, child) in edges {
        if let Some(task) = tasks.get_mut(&parent) {
            task.children_ids.insert(child);
        }
        if let Some(task) = tasks.get_mut(&child) {
            task.parent_ids.insert(parent);
        }
    }

    Ok(tasks.into_values().collect())
}

fn ensure_known(
    ids: &BTreeMap<TaskId, &str>,
    task: TaskId,
    other: TaskId,
    role: &str,
) -> Result<()> {
    if !ids.contains_key(&other) {
        return Err(DagrunError::ConfigError(format!(
            "task {task} has unknown {role} {other}"
        )));
    }
    Ok(())
}
