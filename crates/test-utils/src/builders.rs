#![allow(dead_code)]

use std::collections::BTreeMap;

use dagrun::dag::{InMemoryTaskStore, Task};
use dagrun::types::{OperatorType, TaskId};

/// Builder for a single `Task`.
pub struct TaskBuilder {
    task: Task,
}

impl TaskBuilder {
    pub fn new(id: TaskId, operator_type: OperatorType) -> Self {
        Self {
            task: Task::new(id, operator_type, ""),
        }
    }

    pub fn virtual_root(id: TaskId) -> Self {
        Self::new(id, OperatorType::Virtual)
    }

    pub fn bash(id: TaskId, command: &str) -> Self {
        Self::new(id, OperatorType::Bash).command(command)
    }

    pub fn python(id: TaskId, command: &str) -> Self {
        Self::new(id, OperatorType::Python).command(command)
    }

    pub fn command(mut self, command: &str) -> Self {
        self.task.command = command.to_string();
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.task.name = name.to_string();
        self
    }

    pub fn after(mut self, parent: TaskId) -> Self {
        self.task.parent_ids.insert(parent);
        self
    }

    pub fn removed(mut self) -> Self {
        self.task.is_remove = true;
        self
    }

    pub fn build(self) -> Task {
        self.task
    }
}

/// Builder for an `InMemoryTaskStore`.
///
/// Edges are declared on the child with `TaskBuilder::after`; `build` fills
/// in the matching `children_ids` so both directions agree.
#[derive(Default)]
pub struct StoreBuilder {
    tasks: BTreeMap<TaskId, Task>,
}

impl StoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_task(mut self, task: TaskBuilder) -> Self {
        let task = task.build();
        self.tasks.insert(task.id, task);
        self
    }

    /// Linked tasks, without building a store.
    pub fn build_tasks(self) -> Vec<Task> {
        let mut tasks = self.tasks;
        let edges: Vec<(TaskId, TaskId)> = tasks
            .values()
            .flat_map(|t| t.parent_ids.iter().map(move |&p| (p, t.id)))
            .collect();

        for (parent, child) in edges {
            if let Some(task) = tasks.get_mut(&parent) {
                task.children_ids.insert(child);
            }
        }

        tasks.into_values().collect()
    }

    pub fn build(self) -> InMemoryTaskStore {
        InMemoryTaskStore::from_tasks(self.build_tasks())
            .expect("Failed to build valid task store from builder")
    }
}
