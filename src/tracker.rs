// src/tracker.rs

//! Entry point of a graph run.
//!
//! Virtual tasks mark the roots of the DAG. Starting the tracker fans out
//! from every live virtual task to its children; from there each finished
//! operator triggers its own children through the engine.

use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::dag::{Task, TaskStore};
use crate::engine::{FireContext, SchedulingEngine};
use crate::errors::{DagrunError, Result};
use crate::operator::{Operator, OperatorSettings, VirtualOperator};
use crate::types::{OperatorType, TaskId};

/// What one `start()` call seeded.
#[derive(Debug, Default)]
pub struct TrackerReport {
    pub run_id: u64,
    /// Live virtual roots, ascending.
    pub roots: Vec<TaskId>,
    /// Children handed to the engine.
    pub fired: Vec<TaskId>,
    /// Children that also depend on non-virtual parents; they fire later.
    pub waiting: Vec<TaskId>,
    /// Children that could not be built or fired.
    pub rejected: Vec<(TaskId, DagrunError)>,
}

pub struct GraphTracker {
    store: Arc<dyn TaskStore>,
    engine: Arc<dyn SchedulingEngine>,
    settings: Arc<OperatorSettings>,
    /// Set after the first `start()`.
    started: Mutex<bool>,
}

impl fmt::Debug for GraphTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphTracker")
            .field("store", &self.store)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl GraphTracker {
    pub fn new(
        store: Arc<dyn TaskStore>,
        engine: Arc<dyn SchedulingEngine>,
        settings: Arc<OperatorSettings>,
    ) -> Self {
        Self {
            store,
            engine,
            settings,
            started: Mutex::new(false),
        }
    }

    pub fn settings(&self) -> &Arc<OperatorSettings> {
        &self.settings
    }

    /// Seed a new run: one `trigger_children` per live virtual root.
    ///
    /// Never runs a root's own work and never waits on the fired jobs.
    /// Fails with [`DagrunError::AlreadyRunning`] while jobs from an earlier
    /// start are still in flight, so a subtree cannot be fired twice by
    /// accident.
    pub fn start(&self) -> Result<TrackerReport> {
        let mut started = self.started.lock().unwrap_or_else(|e| e.into_inner());
        if *started && !self.engine.is_idle() {
            warn!("tracker start requested while the previous run is still in flight");
            return Err(DagrunError::AlreadyRunning);
        }
        *started = true;

        let roots = self.store.find_tasks_by_type(OperatorType::Virtual);
        let scope = reachable_tasks(self.store.as_ref(), &roots);
        let run_id = self.engine.ledger().begin_run(scope);
        info!(run_id, roots = roots.len(), "graph tracker starting");

        let ctx = FireContext::new(self.store.as_ref(), self.engine.as_ref());
        let mut report = TrackerReport {
            run_id,
            ..TrackerReport::default()
        };

        for root in roots {
            let root_id = root.id;
            let operator = Operator::Virtual(VirtualOperator::new(root, Arc::clone(&self.settings)));
            let triggered = operator.trigger_children(&ctx);
            debug!(root = root_id, ?triggered, "virtual root triggered its children");

            report.roots.push(root_id);
            report.fired.extend(triggered.fired);
            report.waiting.extend(triggered.waiting);
            report.rejected.extend(triggered.rejected);
        }

        info!(
            run_id,
            fired = ?report.fired,
            rejected = report.rejected.len(),
            "graph tracker seeded run"
        );
        Ok(report)
    }
}

/// Live tasks reachable from `roots` through `children_ids`, roots excluded.
/// Store-backed counterpart of `dag::reachable_from`.
fn reachable_tasks(store: &dyn TaskStore, roots: &[Task]) -> BTreeSet<TaskId> {
    let mut seen = BTreeSet::new();
    let mut queue: VecDeque<Task> = roots
        .iter()
        .flat_map(|root| store.find_tasks_by_ids(&root.children_ids))
        .collect();

    while let Some(task) = queue.pop_front() {
        if seen.insert(task.id) {
            queue.extend(store.find_tasks_by_ids(&task.children_ids));
        }
    }

    seen
}
