// tests/dispatch.rs
mod common;
use crate::common::builders::{StoreBuilder, TaskBuilder};
use crate::common::init_tracing;

use std::sync::Arc;

use dagrun::dag::Task;
use dagrun::errors::DagrunError;
use dagrun::operator::{Interpreter, Operator, OperatorOutcome, OperatorSettings};
use dagrun::types::OperatorType;

fn settings() -> Arc<OperatorSettings> {
    Arc::new(OperatorSettings::default())
}

#[test]
fn bash_task_becomes_a_process_operator_with_its_command() {
    init_tracing();

    let task = Task::new(5, OperatorType::Bash, "echo five");
    let op = Operator::child_from_task(task, settings()).expect("bash is supported");

    assert!(matches!(op, Operator::Bash(_)));
    assert_eq!(op.id(), 5);
    assert_eq!(op.operator_type(), OperatorType::Bash);

    let process = op.as_process().expect("bash runs a process");
    assert_eq!(process.command(), "echo five");
    assert_eq!(process.interpreter(), Interpreter::Bash);
}

#[test]
fn every_work_type_dispatches_to_its_variant() {
    init_tracing();

    let cases = [
        OperatorType::Bash,
        OperatorType::Python,
        OperatorType::Mail,
        OperatorType::DataX,
        OperatorType::Hive,
    ];
    for kind in cases {
        let op = Operator::child_from_task(Task::new(1, kind, "x"), settings())
            .unwrap_or_else(|e| panic!("{kind} should dispatch: {e}"));
        assert_eq!(op.operator_type(), kind);
        assert_eq!(op.as_process().is_some(), matches!(kind, OperatorType::Bash | OperatorType::Python));
    }
}

#[test]
fn unsupported_type_is_rejected() {
    init_tracing();

    let err = Operator::from_task(Task::new(9, OperatorType::Unsupported, ""), settings())
        .expect_err("unsupported must not dispatch");
    assert!(matches!(
        err,
        DagrunError::UnsupportedOperator { task: 9, kind: OperatorType::Unsupported }
    ));
}

#[test]
fn virtual_is_a_root_but_never_a_child() {
    init_tracing();

    let root = Operator::from_task(Task::new(1, OperatorType::Virtual, ""), settings());
    assert!(matches!(root, Ok(Operator::Virtual(_))));

    let child = Operator::child_from_task(Task::new(1, OperatorType::Virtual, ""), settings());
    assert!(matches!(
        child,
        Err(DagrunError::UnsupportedOperator { task: 1, kind: OperatorType::Virtual })
    ));
}

#[test]
fn resolve_children_builds_live_children_in_id_order() {
    init_tracing();

    let tasks = StoreBuilder::new()
        .with_task(TaskBuilder::virtual_root(1))
        .with_task(TaskBuilder::bash(4, "echo four").after(1))
        .with_task(TaskBuilder::new(2, OperatorType::Unsupported).after(1))
        .with_task(TaskBuilder::new(3, OperatorType::Hive).after(1).removed())
        .build_tasks();
    let root = tasks.iter().find(|t| t.id == 1).cloned().expect("root");
    let store = dagrun::dag::InMemoryTaskStore::from_tasks(tasks).expect("valid graph");

    let op = Operator::from_task(root, settings()).expect("virtual root");
    let children = op.resolve_children(&store);

    let ids: Vec<_> = children.iter().map(|(id, _)| *id).collect();
    assert_eq!(ids, vec![2, 4], "removed child 3 is skipped");
    assert!(children[0].1.is_err());
    assert!(matches!(children[1].1, Ok(Operator::Bash(_))));
}

#[tokio::test]
async fn connector_and_virtual_operators_skip_their_work() {
    init_tracing();

    for kind in [OperatorType::Mail, OperatorType::DataX, OperatorType::Hive, OperatorType::Virtual] {
        let op = Operator::from_task(Task::new(1, kind, "payload"), settings()).expect("supported");
        assert_eq!(op.process().await, OperatorOutcome::Skipped);
        // Nothing to kill; must not panic.
        op.kill().await;
    }
}
