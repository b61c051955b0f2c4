// src/operator/mod.rs

//! Operators: the runtime unit of work bound to one task for one firing.
//!
//! Every operator follows the same lifecycle:
//!
//! 1. `process()` does the task's own work and returns only once that work
//!    is in a terminal state.
//! 2. `trigger_children()` resolves the task's children from the store,
//!    builds one operator per child by dispatching on its type, and asks the
//!    scheduling engine to fire each one.
//!
//! `execute()` runs both steps in order, so a child can never start before
//! its parent's work has returned.
//!
//! - [`process`] runs shell / python commands as OS processes.
//! - [`kill_tree`] terminates a process and everything it forked.
//! - [`connector`] holds the lifecycle-only Mail / DataX / Hive operators and
//!   the virtual root operator.
//! - [`settings`] holds the knobs shared by all operators of a run.

pub mod connector;
pub mod kill_tree;
pub mod process;
pub mod settings;

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::dag::{Task, TaskStore};
use crate::engine::{Claim, FireContext, Fired};
use crate::errors::{DagrunError, Result};
use crate::types::{FailurePolicy, OperatorType, TaskId};

pub use connector::{ConnectorOperator, VirtualOperator};
pub use process::{Interpreter, ProcessOperator, ProcessState};
pub use settings::OperatorSettings;

/// Terminal result of an operator's own work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorOutcome {
    Success,
    /// Exit value differed from the expected one (`-1` if the process could
    /// not be spawned).
    Failed { exit_value: i32 },
    Killed,
    /// The operator has no work of its own (virtual roots, unbound
    /// connectors).
    Skipped,
}

impl OperatorOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, OperatorOutcome::Failed { .. } | OperatorOutcome::Killed)
    }
}

/// One operator per task type.
#[derive(Debug)]
pub enum Operator {
    Bash(ProcessOperator),
    Python(ProcessOperator),
    Mail(ConnectorOperator),
    DataX(ConnectorOperator),
    Hive(ConnectorOperator),
    Virtual(VirtualOperator),
}

/// What `execute()` did.
#[derive(Debug)]
pub struct ExecutionReport {
    pub task: TaskId,
    pub outcome: OperatorOutcome,
    /// `None` when the children were not triggered because the task failed
    /// under `FailurePolicy::Halt`.
    pub children: Option<TriggerReport>,
}

/// What `trigger_children()` did, per child id.
#[derive(Debug, Default)]
pub struct TriggerReport {
    /// Handed to the engine.
    pub fired: Vec<TaskId>,
    /// Still waiting on other parents.
    pub waiting: Vec<TaskId>,
    /// Already fired by another parent in this run.
    pub already_claimed: Vec<TaskId>,
    /// The engine dropped the request because the job was in flight.
    pub suppressed: Vec<TaskId>,
    /// Not fired because the run was cancelled.
    pub cancelled: Vec<TaskId>,
    /// Could not be built or fired. Only that branch is affected.
    pub rejected: Vec<(TaskId, DagrunError)>,
}

impl Operator {
    /// Build the operator for `task`. Every type except `Unsupported` is
    /// accepted.
    pub fn from_task(task: Task, settings: Arc<OperatorSettings>) -> Result<Self> {
        let op = match task.operator_type {
            OperatorType::Bash => {
                Operator::Bash(ProcessOperator::new(task, settings, Interpreter::Bash))
            }
            OperatorType::Python => {
                Operator::Python(ProcessOperator::new(task, settings, Interpreter::Python))
            }
            OperatorType::Mail => Operator::Mail(ConnectorOperator::new(task, settings)),
            OperatorType::DataX => Operator::DataX(ConnectorOperator::new(task, settings)),
            OperatorType::Hive => Operator::Hive(ConnectorOperator::new(task, settings)),
            OperatorType::Virtual => Operator::Virtual(VirtualOperator::new(task, settings)),
            OperatorType::Unsupported => {
                return Err(DagrunError::UnsupportedOperator {
                    task: task.id,
                    kind: task.operator_type,
                });
            }
        };
        Ok(op)
    }

    /// Build the operator for a child task. Children must carry real work,
    /// so `Virtual` is rejected along with `Unsupported`.
    pub fn child_from_task(task: Task, settings: Arc<OperatorSettings>) -> Result<Self> {
        if task.operator_type == OperatorType::Virtual {
            return Err(DagrunError::UnsupportedOperator {
                task: task.id,
                kind: task.operator_type,
            });
        }
        Self::from_task(task, settings)
    }

    pub fn task(&self) -> &Task {
        match self {
            Operator::Bash(op) | Operator::Python(op) => op.task(),
            Operator::Mail(op) | Operator::DataX(op) | Operator::Hive(op) => op.task(),
            Operator::Virtual(op) => op.task(),
        }
    }

    pub fn id(&self) -> TaskId {
        self.task().id
    }

    pub fn operator_type(&self) -> OperatorType {
        match self {
            Operator::Bash(_) => OperatorType::Bash,
            Operator::Python(_) => OperatorType::Python,
            Operator::Mail(_) => OperatorType::Mail,
            Operator::DataX(_) => OperatorType::DataX,
            Operator::Hive(_) => OperatorType::Hive,
            Operator::Virtual(_) => OperatorType::Virtual,
        }
    }

    pub fn settings(&self) -> &Arc<OperatorSettings> {
        match self {
            Operator::Bash(op) | Operator::Python(op) => op.settings(),
            Operator::Mail(op) | Operator::DataX(op) | Operator::Hive(op) => op.settings(),
            Operator::Virtual(op) => op.settings(),
        }
    }

    /// The process operator behind a Bash or Python task.
    pub fn as_process(&self) -> Option<&ProcessOperator> {
        match self {
            Operator::Bash(op) | Operator::Python(op) => Some(op),
            _ => None,
        }
    }

    /// Run this task's own work to a terminal state.
    pub async fn process(&self) -> OperatorOutcome {
        match self {
            Operator::Bash(op) | Operator::Python(op) => op.process().await,
            Operator::Mail(op) | Operator::DataX(op) | Operator::Hive(op) => op.process().await,
            Operator::Virtual(op) => op.process().await,
        }
    }

    /// Forcefully stop the running work, if there is any. Best effort.
    pub async fn kill(&self) {
        match self {
            Operator::Bash(op) | Operator::Python(op) => op.kill().await,
            _ => debug!(task = self.id(), "operator has nothing to kill"),
        }
    }

    /// Run `process()`, record the outcome, then trigger the children.
    ///
    /// Children are triggered whatever the outcome, unless the task failed
    /// and the failure policy is `Halt`. A job fired before its run was
    /// cancelled is recorded as `Killed` without doing any work.
    pub async fn execute(&self, ctx: &FireContext<'_>) -> ExecutionReport {
        let task = self.id();
        let ledger = ctx.engine.ledger();
        let policy = self.settings().failure_policy;

        ledger.record_started(task);
        if ledger.is_cancelled() {
            info!(task, "run cancelled before the task started; not running it");
            ledger.record_finished(task, OperatorOutcome::Killed, policy);
            return ExecutionReport {
                task,
                outcome: OperatorOutcome::Killed,
                children: None,
            };
        }
        let outcome = self.process().await;
        ledger.record_finished(task, outcome, policy);

        if outcome.is_failure() {
            if policy == FailurePolicy::Halt {
                warn!(task, ?outcome, "task failed; not triggering its children");
                return ExecutionReport {
                    task,
                    outcome,
                    children: None,
                };
            }
            warn!(task, ?outcome, "task failed; triggering its children anyway");
        }

        let children = self.trigger_children(ctx);
        ExecutionReport {
            task,
            outcome,
            children: Some(children),
        }
    }

    /// Build one operator per live child, in ascending id order.
    ///
    /// Soft-deleted or unknown children are left out. A child whose type
    /// cannot be dispatched yields an error for that child only.
    pub fn resolve_children(&self, store: &dyn TaskStore) -> Vec<(TaskId, Result<Operator>)> {
        let task = self.task();
        let children = store.find_tasks_by_ids(&task.children_ids);

        if children.len() < task.children_ids.len() {
            let found: Vec<TaskId> = children.iter().map(|c| c.id).collect();
            debug!(
                task = task.id,
                declared = ?task.children_ids,
                ?found,
                "some children are deleted or missing; skipping them"
            );
        }

        children
            .into_iter()
            .map(|child| {
                let id = child.id;
                (id, Operator::child_from_task(child, Arc::clone(self.settings())))
            })
            .collect()
    }

    /// Fire every child whose parents are all done, exactly once per run.
    pub fn trigger_children(&self, ctx: &FireContext<'_>) -> TriggerReport {
        let task = self.id();
        let ledger = ctx.engine.ledger();
        let mut report = TriggerReport::default();

        for (child, built) in self.resolve_children(ctx.store) {
            let operator = match built {
                Ok(operator) => operator,
                Err(e) => {
                    error!(task, child, error = %e, "cannot build operator for child; skipping its branch");
                    report.rejected.push((child, e));
                    continue;
                }
            };

            let parents = ctx.store.find_tasks_by_ids(&operator.task().parent_ids);
            match ledger.claim(operator.task(), &parents) {
                Claim::Ready => {}
                Claim::Waiting { pending } => {
                    debug!(task, child, ?pending, "child still waiting on other parents");
                    report.waiting.push(child);
                    continue;
                }
                Claim::AlreadyClaimed => {
                    debug!(task, child, "child already fired in this run");
                    report.already_claimed.push(child);
                    continue;
                }
                Claim::Cancelled => {
                    debug!(task, child, "run cancelled; not firing child");
                    report.cancelled.push(child);
                    continue;
                }
            }

            match ctx.engine.fire_now(child, operator) {
                Ok(Fired::Scheduled) => {
                    debug!(task, child, "child fired");
                    report.fired.push(child);
                }
                Ok(Fired::Suppressed) => report.suppressed.push(child),
                Err(e) => {
                    error!(task, child, error = %e, "engine refused to fire child");
                    report.rejected.push((child, e));
                }
            }
        }

        report
    }
}
