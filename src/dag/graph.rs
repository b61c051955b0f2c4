// src/dag/graph.rs

//! Whole-graph checks and queries over a set of task records.
//!
//! The scheduler itself only follows `children_ids` one hop at a time; these
//! helpers exist for loading (validation), dry runs and diagnostics.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::dag::task::Task;
use crate::errors::{DagrunError, Result};
use crate::types::TaskId;

/// Check that a task set forms a well-formed DAG:
///
/// - ids are unique
/// - every parent/child reference points at a known task
/// - no task lists itself as a parent or child
/// - edges are consistent (`b ∈ a.children_ids` iff `a ∈ b.parent_ids`)
/// - there are no cycles
///
/// Soft-deleted tasks take part in the check like any other record.
pub fn validate_tasks(tasks: &[Task]) -> Result<()> {
    let mut by_id: BTreeMap<TaskId, &Task> = BTreeMap::new();
    for task in tasks {
        if by_id.insert(task.id, task).is_some() {
            return Err(DagrunError::ConfigError(format!(
                "duplicate task id {}",
                task.id
            )));
        }
    }

    for task in tasks {
        for &child in &task.children_ids {
            let child_task = by_id.get(&child).ok_or_else(|| {
                DagrunError::ConfigError(format!(
                    "task {} has unknown child {}",
                    task.id, child
                ))
            })?;
            if child == task.id {
                return Err(DagrunError::ConfigError(format!(
                    "task {} cannot be its own child",
                    task.id
                )));
            }
            if !child_task.parent_ids.contains(&task.id) {
                return Err(DagrunError::InconsistentEdge {
                    parent: task.id,
                    child,
                });
            }
        }

        for &parent in &task.parent_ids {
            let parent_task = by_id.get(&parent).ok_or_else(|| {
                DagrunError::ConfigError(format!(
                    "task {} has unknown parent {}",
                    task.id, parent
                ))
            })?;
            if parent == task.id {
                return Err(DagrunError::ConfigError(format!(
                    "task {} cannot be its own parent",
                    task.id
                )));
            }
            if !parent_task.children_ids.contains(&task.id) {
                return Err(DagrunError::InconsistentEdge {
                    parent,
                    child: task.id,
                });
            }
        }
    }

    // Edge direction: parent -> child.
    match toposort(&edge_graph(tasks, |_| true), None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(DagrunError::DagCycle(format!(
            "cycle detected in task DAG involving task {}",
            cycle.node_id()
        ))),
    }
}

/// Ids of live virtual tasks, i.e. the points a tracker run starts from.
pub fn root_ids(tasks: &[Task]) -> Vec<TaskId> {
    tasks
        .iter()
        .filter(|t| t.is_live() && t.is_virtual())
        .map(|t| t.id)
        .collect()
}

/// Live tasks in an order where every parent precedes its children.
pub fn topological_order(tasks: &[Task]) -> Result<Vec<TaskId>> {
    let live: BTreeSet<TaskId> = tasks.iter().filter(|t| t.is_live()).map(|t| t.id).collect();
    let graph = edge_graph(tasks, |id| live.contains(&id));

    toposort(&graph, None).map_err(|cycle| {
        DagrunError::DagCycle(format!(
            "cycle detected in task DAG involving task {}",
            cycle.node_id()
        ))
    })
}

/// Live tasks reachable from `roots` by following `children_ids`, roots
/// excluded. Soft-deleted tasks cut the walk.
pub fn reachable_from(tasks: &[Task], roots: &[TaskId]) -> BTreeSet<TaskId> {
    let by_id: BTreeMap<TaskId, &Task> = tasks
        .iter()
        .filter(|t| t.is_live())
        .map(|t| (t.id, t))
        .collect();

    let mut seen = BTreeSet::new();
    let mut queue: VecDeque<TaskId> = VecDeque::new();

    for root in roots {
        if let Some(task) = by_id.get(root) {
            queue.extend(task.children_ids.iter().copied());
        }
    }

    while let Some(id) = queue.pop_front() {
        let Some(task) = by_id.get(&id) else {
            continue;
        };
        if seen.insert(id) {
            queue.extend(task.children_ids.iter().copied());
        }
    }

    seen
}

fn edge_graph(tasks: &[Task], include: impl Fn(TaskId) -> bool) -> DiGraphMap<TaskId, ()> {
    let mut graph: DiGraphMap<TaskId, ()> = DiGraphMap::new();

    for task in tasks.iter().filter(|t| include(t.id)) {
        graph.add_node(task.id);
    }

    for task in tasks.iter().filter(|t| include(t.id)) {
        for &child in task.children_ids.iter().filter(|&&c| include(c)) {
            graph.add_edge(task.id, child, ());
        }
    }

    graph
}
