// src/dag/task.rs

//! Task record: one node of the DAG plus its edges.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::types::{OperatorType, TaskId};

/// Snapshot of one task as read from the task store.
///
/// The scheduler only ever reads these; creation, edits and soft deletion
/// belong to whoever owns the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub operator_type: OperatorType,
    /// Payload interpreted by the operator (e.g. the shell command for Bash).
    pub command: String,
    pub owner_id: u64,
    /// Direct predecessors. Invariant: `p ∈ parent_ids` iff `id ∈ p.children_ids`.
    pub parent_ids: BTreeSet<TaskId>,
    /// Direct dependents, triggered once this task's work returns.
    pub children_ids: BTreeSet<TaskId>,
    /// Soft-delete flag; a removed task is treated as absent everywhere.
    pub is_remove: bool,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

impl Task {
    pub fn new(id: TaskId, operator_type: OperatorType, command: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: format!("task-{id}"),
            operator_type,
            command: command.into(),
            owner_id: 0,
            parent_ids: BTreeSet::new(),
            children_ids: BTreeSet::new(),
            is_remove: false,
            create_time: now,
            update_time: now,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_owner(mut self, owner_id: u64) -> Self {
        self.owner_id = owner_id;
        self
    }

    pub fn with_parents(mut self, parents: impl IntoIterator<Item = TaskId>) -> Self {
        self.parent_ids.extend(parents);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = TaskId>) -> Self {
        self.children_ids.extend(children);
        self
    }

    pub fn removed(mut self, is_remove: bool) -> Self {
        self.is_remove = is_remove;
        self
    }

    /// `false` once the task has been soft-deleted.
    pub fn is_live(&self) -> bool {
        !self.is_remove
    }

    pub fn is_virtual(&self) -> bool {
        self.operator_type == OperatorType::Virtual
    }
}
