// tests/graph_validation.rs
mod common;
use crate::common::builders::{StoreBuilder, TaskBuilder};
use crate::common::init_tracing;

use std::collections::BTreeSet;

use dagrun::dag::{InMemoryTaskStore, Task, TaskStore, reachable_from, root_ids, topological_order, validate_tasks};
use dagrun::errors::DagrunError;
use dagrun::types::OperatorType;

fn sample() -> Vec<Task> {
    StoreBuilder::new()
        .with_task(TaskBuilder::virtual_root(1))
        .with_task(TaskBuilder::bash(2, "a").after(1))
        .with_task(TaskBuilder::bash(3, "b").after(2))
        .with_task(TaskBuilder::bash(4, "c").after(2).removed())
        .with_task(TaskBuilder::bash(5, "d").after(4))
        .with_task(TaskBuilder::virtual_root(6).removed())
        .build_tasks()
}

#[test]
fn one_sided_edge_is_inconsistent() {
    init_tracing();

    let tasks = vec![
        Task::new(1, OperatorType::Virtual, "").with_children([2]),
        Task::new(2, OperatorType::Bash, "true"),
    ];
    assert!(matches!(
        validate_tasks(&tasks),
        Err(DagrunError::InconsistentEdge { parent: 1, child: 2 })
    ));
    assert!(InMemoryTaskStore::from_tasks(tasks).is_err());
}

#[test]
fn duplicate_ids_are_rejected() {
    let tasks = vec![
        Task::new(1, OperatorType::Bash, "a"),
        Task::new(1, OperatorType::Bash, "b"),
    ];
    assert!(matches!(validate_tasks(&tasks), Err(DagrunError::ConfigError(_))));
}

#[test]
fn roots_order_and_reachability_ignore_removed_tasks() {
    init_tracing();

    let tasks = sample();
    assert!(validate_tasks(&tasks).is_ok());

    assert_eq!(root_ids(&tasks), vec![1]);

    let order = topological_order(&tasks).expect("acyclic");
    assert_eq!(order.len(), 4, "removed tasks 4 and 6 are left out: {order:?}");
    let pos = |id| order.iter().position(|&t| t == id).expect("in order");
    assert!(pos(1) < pos(2));
    assert!(pos(2) < pos(3));

    // 5 hangs below the removed task 4, so the walk never reaches it.
    assert_eq!(reachable_from(&tasks, &[1]), BTreeSet::from([2, 3]));
}

#[test]
fn store_hides_removed_tasks() {
    init_tracing();

    let store = InMemoryTaskStore::from_tasks(sample()).expect("valid");
    assert_eq!(store.len(), 6);

    let found: Vec<_> = store
        .find_tasks_by_ids(&BTreeSet::from([2, 4, 5, 77]))
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(found, vec![2, 5]);

    let roots: Vec<_> = store
        .find_tasks_by_type(OperatorType::Virtual)
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(roots, vec![1]);

    assert!(store.find_task(4).is_none());
    assert_eq!(store.find_task(3).map(|t| t.command), Some("b".to_string()));
}
