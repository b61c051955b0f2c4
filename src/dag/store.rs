// src/dag/store.rs

//! Read-only access to task records.
//!
//! The scheduler needs only two queries from storage: look tasks up by id
//! (to resolve children and parents) and by type (to find virtual roots).
//! Every implementation must hide soft-deleted tasks from both.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;
use std::sync::RwLock;

use tracing::debug;

use crate::dag::graph::validate_tasks;
use crate::dag::task::Task;
use crate::errors::Result;
use crate::types::{OperatorType, TaskId};

/// Abstract task storage.
///
/// Implementations are shared by every in-flight operator and must tolerate
/// concurrent reads.
pub trait TaskStore: Send + Sync + Debug {
    /// Live tasks whose id is in `ids`, in ascending id order. Unknown or
    /// soft-deleted ids are silently skipped.
    fn find_tasks_by_ids(&self, ids: &BTreeSet<TaskId>) -> Vec<Task>;

    /// Live tasks of the given type, in ascending id order.
    fn find_tasks_by_type(&self, operator_type: OperatorType) -> Vec<Task>;

    fn find_task(&self, id: TaskId) -> Option<Task> {
        let ids = BTreeSet::from([id]);
        self.find_tasks_by_ids(&ids).into_iter().next()
    }
}

/// Task store backed by an in-memory map.
///
/// Used by the binary (filled from the task file) and by tests.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: RwLock<BTreeMap<TaskId, Task>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a complete task set, checking edge consistency and
    /// acyclicity first.
    pub fn from_tasks(tasks: impl IntoIterator<Item = Task>) -> Result<Self> {
        let tasks: Vec<Task> = tasks.into_iter().collect();
        validate_tasks(&tasks)?;
        Ok(Self::from_tasks_unchecked(tasks))
    }

    /// Build a store without validating the graph.
    pub fn from_tasks_unchecked(tasks: impl IntoIterator<Item = Task>) -> Self {
        let map = tasks.into_iter().map(|t| (t.id, t)).collect();
        Self {
            tasks: RwLock::new(map),
        }
    }

    /// Insert or replace a single record.
    pub fn insert(&self, task: Task) {
        debug!(task = task.id, "storing task record");
        self.write().insert(task.id, task);
    }

    /// Number of records, soft-deleted ones included.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Every record, soft-deleted ones included, in ascending id order.
    pub fn all(&self) -> Vec<Task> {
        self.read().values().cloned().collect()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<TaskId, Task>> {
        // A poisoned lock only means a writer panicked mid-insert; the map
        // itself is still usable.
        self.tasks.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<TaskId, Task>> {
        self.tasks.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl TaskStore for InMemoryTaskStore {
    fn find_tasks_by_ids(&self, ids: &BTreeSet<TaskId>) -> Vec<Task> {
        let tasks = self.read();
        ids.iter()
            .filter_map(|id| tasks.get(id))
            .filter(|t| t.is_live())
            .cloned()
            .collect()
    }

    fn find_tasks_by_type(&self, operator_type: OperatorType) -> Vec<Task> {
        self.read()
            .values()
            .filter(|t| t.is_live() && t.operator_type == operator_type)
            .cloned()
            .collect()
    }
}
