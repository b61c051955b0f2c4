// src/engine/mod.rs

//! Scheduling engine seam.
//!
//! Operators never run themselves; they ask a [`SchedulingEngine`] to fire
//! them "now", and the engine invokes `Operator::execute` on a worker of its
//! own. Keeping this behind a trait lets tests swap the real engine for a
//! deterministic one.
//!
//! - [`ledger`] holds the per-run record that guarantees each reachable task
//!   fires once, after all of its parents.
//! - [`runtime`] is the production engine: one Tokio task per fired job.

pub mod ledger;
pub mod runtime;

use crate::dag::TaskStore;
use crate::errors::Result;
use crate::operator::Operator;
use crate::types::JobId;

pub use ledger::{Claim, LedgerEvent, RunLedger, RunSummary};
pub use runtime::TokioEngine;

/// What the engine did with a `fire_now` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fired {
    /// The operator will be executed exactly once.
    Scheduled,
    /// A job with the same id is already in flight; the request was dropped.
    Suppressed,
}

/// Capability required from the scheduling engine.
///
/// `fire_now` is at-most-once per call and must be safe to call concurrently
/// from many operators triggering their children in parallel.
pub trait SchedulingEngine: Send + Sync {
    /// Execute `operator` as job `job` without delay, on the engine's own
    /// worker. Returns immediately.
    fn fire_now(&self, job: JobId, operator: Operator) -> Result<Fired>;

    /// Ledger of the current run.
    fn ledger(&self) -> &RunLedger;

    /// `true` when no fired job is queued or running.
    fn is_idle(&self) -> bool;
}

/// Everything an operator needs while it executes: where to read tasks and
/// where to fire children.
#[derive(Clone, Copy)]
pub struct FireContext<'a> {
    pub store: &'a dyn TaskStore,
    pub engine: &'a dyn SchedulingEngine,
}

impl<'a> FireContext<'a> {
    pub fn new(store: &'a dyn TaskStore, engine: &'a dyn SchedulingEngine) -> Self {
        Self { store, engine }
    }
}
