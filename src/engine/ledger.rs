// src/engine/ledger.rs

//! Per-run record of what has started, what has finished, and which children
//! have already been handed to the engine.
//!
//! The ledger is what turns "every finished parent triggers its children"
//! into "every reachable task runs exactly once, after all of its parents":
//!
//! - A parent records its outcome *before* it triggers children.
//! - A child is claimed (and fired) only when every live parent is
//!   satisfied, and only once per run.
//!
//! Both steps happen under one lock, so when two parents of a join finish at
//! the same time exactly one of them fires the child.
//!
//! Only parents inside the run's scope (the tasks reachable from the live
//! roots) gate a join. A parent outside it never runs in this run and counts
//! as absent.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::dag::Task;
use crate::operator::OperatorOutcome;
use crate::types::{FailurePolicy, TaskId};

/// One entry of the run's event log. `seq` is strictly increasing within a
/// run, so tests can check causal ordering without timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerEvent {
    Started { seq: u64, task: TaskId },
    Finished { seq: u64, task: TaskId, outcome: OperatorOutcome },
}

impl LedgerEvent {
    pub fn seq(&self) -> u64 {
        match self {
            LedgerEvent::Started { seq, .. } | LedgerEvent::Finished { seq, .. } => *seq,
        }
    }

    pub fn task(&self) -> TaskId {
        match self {
            LedgerEvent::Started { task, .. } | LedgerEvent::Finished { task, .. } => *task,
        }
    }
}

/// Result of asking whether a child may be fired now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    /// All parents are satisfied; the caller now owns the child's firing.
    Ready,
    /// Some parents have not finished (or failed under `Halt`).
    Waiting { pending: Vec<TaskId> },
    /// Another parent already fired this child in the current run.
    AlreadyClaimed,
    /// The run was cancelled; nothing new is fired.
    Cancelled,
}

#[derive(Debug, Default)]
struct LedgerState {
    run_id: u64,
    seq: u64,
    /// Tasks the run may execute. `None` until a run begins; then every
    /// parent gates its children.
    scope: Option<BTreeSet<TaskId>>,
    cancelled: bool,
    claimed: BTreeSet<TaskId>,
    satisfied: BTreeSet<TaskId>,
    outcomes: BTreeMap<TaskId, OperatorOutcome>,
    events: Vec<LedgerEvent>,
}

#[derive(Debug, Default)]
pub struct RunLedger {
    state: Mutex<LedgerState>,
}

impl RunLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the previous run and start numbering a new one.
    ///
    /// `scope` holds the tasks reachable from the run's live roots.
    pub fn begin_run(&self, scope: BTreeSet<TaskId>) -> u64 {
        let mut state = self.lock();
        let run_id = state.run_id + 1;
        debug!(run_id, scope = ?scope, "ledger: starting new run");
        *state = LedgerState {
            run_id,
            scope: Some(scope),
            ..LedgerState::default()
        };
        run_id
    }

    /// Stop the current run: every later `claim` returns `Cancelled`.
    pub fn cancel(&self) {
        let mut state = self.lock();
        if !state.cancelled {
            debug!(run_id = state.run_id, "ledger: run cancelled");
        }
        state.cancelled = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.lock().cancelled
    }

    pub fn run_id(&self) -> u64 {
        self.lock().run_id
    }

    pub fn record_started(&self, task: TaskId) {
        let mut state = self.lock();
        state.seq += 1;
        let seq = state.seq;
        state.events.push(LedgerEvent::Started { seq, task });
    }

    /// Record a task's outcome. Under `Halt`, a failed or killed task does
    /// not satisfy its children.
    pub fn record_finished(&self, task: TaskId, outcome: OperatorOutcome, policy: FailurePolicy) {
        let mut state = self.lock();
        state.seq += 1;
        let seq = state.seq;
        state.events.push(LedgerEvent::Finished { seq, task, outcome });
        state.outcomes.insert(task, outcome);

        if !outcome.is_failure() || policy == FailurePolicy::Continue {
            state.satisfied.insert(task);
        }
    }

    /// Try to claim `child` for firing.
    ///
    /// `live_parents` are the child's parents as currently present in the
    /// store. Virtual parents never run and are always satisfied; parents
    /// outside the run's scope are ignored.
    pub fn claim(&self, child: &Task, live_parents: &[Task]) -> Claim {
        let mut state = self.lock();

        if state.cancelled {
            return Claim::Cancelled;
        }
        if state.claimed.contains(&child.id) {
            return Claim::AlreadyClaimed;
        }

        let in_scope = |id: &TaskId| state.scope.as_ref().is_none_or(|s| s.contains(id));
        let pending: Vec<TaskId> = live_parents
            .iter()
            .filter(|p| !p.is_virtual() && in_scope(&p.id) && !state.satisfied.contains(&p.id))
            .map(|p| p.id)
            .collect();

        if pending.is_empty() {
            state.claimed.insert(child.id);
            Claim::Ready
        } else {
            Claim::Waiting { pending }
        }
    }

    pub fn is_claimed(&self, task: TaskId) -> bool {
        self.lock().claimed.contains(&task)
    }

    pub fn outcome_of(&self, task: TaskId) -> Option<OperatorOutcome> {
        self.lock().outcomes.get(&task).copied()
    }

    /// Snapshot of the event log, in `seq` order.
    pub fn events(&self) -> Vec<LedgerEvent> {
        self.lock().events.clone()
    }

    pub fn summary(&self) -> RunSummary {
        let state = self.lock();
        let mut summary = RunSummary {
            run_id: state.run_id,
            ..RunSummary::default()
        };

        for (&task, outcome) in &state.outcomes {
            match outcome {
                OperatorOutcome::Success => summary.succeeded.push(task),
                OperatorOutcome::Failed { exit_value } => summary.failed.push((task, *exit_value)),
                OperatorOutcome::Killed => summary.killed.push(task),
                OperatorOutcome::Skipped => summary.skipped.push(task),
            }
        }

        summary
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Outcome counts for one run, grouped by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: u64,
    pub succeeded: Vec<TaskId>,
    pub failed: Vec<(TaskId, i32)>,
    pub killed: Vec<TaskId>,
    pub skipped: Vec<TaskId>,
}

impl RunSummary {
    /// No task failed or was killed.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.killed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len() + self.killed.len() + self.skipped.len()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "run {} finished: {} task(s)", self.run_id, self.total())?;
        writeln!(f, "  succeeded: {:?}", self.succeeded)?;
        if !self.failed.is_empty() {
            let failed: Vec<String> = self
                .failed
                .iter()
                .map(|(task, code)| format!("{task} (exit {code})"))
                .collect();
            writeln!(f, "  failed:    [{}]", failed.join(", "))?;
        }
        if !self.killed.is_empty() {
            writeln!(f, "  killed:    {:?}", self.killed)?;
        }
        if !self.skipped.is_empty() {
            writeln!(f, "  skipped:   {:?}", self.skipped)?;
        }
        Ok(())
    }
}
