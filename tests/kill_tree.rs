// tests/kill_tree.rs
mod common;
use crate::common::{init_tracing, with_timeout};

use std::sync::Arc;
use std::time::Duration;

use dagrun::dag::Task;
use dagrun::operator::kill_tree::{descendants, parse_process_table, process_table};
use dagrun::operator::{Interpreter, OperatorOutcome, OperatorSettings, ProcessOperator};
use dagrun::types::OperatorType;

#[test]
fn parses_ps_output_and_ignores_noise() {
    let table = parse_process_table(
        "    1     0\n  100     1\n  101   100\n  102   100\n garbage line\n\n  200   101\n",
    );

    assert_eq!(table.get(&0), Some(&vec![1]));
    assert_eq!(table.get(&100), Some(&vec![101, 102]));
    assert_eq!(table.get(&101), Some(&vec![200]));
    assert_eq!(table.get(&200), None);
}

#[test]
fn descendants_are_breadth_first_and_exclude_root() {
    let table = parse_process_table("100 1\n101 100\n102 100\n200 101\n300 200\n999 1\n");

    assert_eq!(descendants(100, &table), vec![101, 102, 200, 300]);
    assert_eq!(descendants(300, &table), Vec::<u32>::new());
    assert_eq!(descendants(4242, &table), Vec::<u32>::new());
}

#[tokio::test]
async fn process_table_contains_the_current_process() {
    init_tracing();

    let table = process_table().await.expect("ps should be available");
    let me = std::process::id();
    assert!(
        table.values().any(|children| children.contains(&me)),
        "own pid {me} not found in the process table"
    );
}

/// `true` while `pid` exists and is not a zombie.
async fn is_alive(pid: u32) -> bool {
    let output = tokio::process::Command::new("ps")
        .args(["-o", "stat=", "-p", &pid.to_string()])
        .output()
        .await
        .expect("ps should run");
    let stat = String::from_utf8_lossy(&output.stdout);
    let stat = stat.trim();
    !stat.is_empty() && !stat.starts_with('Z')
}

#[tokio::test]
async fn kill_terminates_grandchildren() {
    init_tracing();

    // The background sleep is a grandchild of the operator's process; the
    // wrapper reports its pid and then waits on it.
    let task = Task::new(1, OperatorType::Bash, "sleep 30 & echo $!; wait");
    let op = Arc::new(ProcessOperator::new(
        task,
        Arc::new(OperatorSettings::default()),
        Interpreter::Bash,
    ));

    let runner = {
        let op = Arc::clone(&op);
        tokio::spawn(async move { op.process().await })
    };

    let grandchild: u32 = with_timeout(async {
        loop {
            if let Some(line) = op.output().lines().next() {
                if let Ok(pid) = line.trim().parse() {
                    return pid;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(is_alive(grandchild).await, "grandchild should be running before kill");

    op.kill().await;
    let outcome = with_timeout(runner).await.expect("runner task panicked");
    assert_eq!(outcome, OperatorOutcome::Killed);

    with_timeout(async {
        while is_alive(grandchild).await {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await;
}
