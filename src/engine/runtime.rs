// src/engine/runtime.rs

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::dag::TaskStore;
use crate::errors::{DagrunError, Result};
use crate::operator::Operator;
use crate::types::JobId;

use super::{FireContext, Fired, RunLedger, SchedulingEngine};

/// Production scheduling engine.
///
/// Every fired job runs on its own Tokio task, so siblings and unrelated
/// branches execute in parallel. A job id that is already in flight is
/// suppressed rather than run twice.
///
/// Cloning is cheap; all clones share the same job registry and ledger.
#[derive(Clone)]
pub struct TokioEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    store: Arc<dyn TaskStore>,
    ledger: RunLedger,
    /// Jobs currently in flight, kept so they can be killed.
    jobs: Mutex<HashMap<JobId, Arc<Operator>>>,
    /// Number of jobs in flight; `wait_idle` watches for zero.
    in_flight: watch::Sender<usize>,
    runtime: Handle,
}

impl fmt::Debug for TokioEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioEngine")
            .field("in_flight", &self.in_flight())
            .field("ledger", &self.inner.ledger)
            .finish_non_exhaustive()
    }
}

impl TokioEngine {
    /// Create an engine bound to the current Tokio runtime.
    ///
    /// Must be called from inside a runtime.
    pub fn new(store: Arc<dyn TaskStore>) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| {
            DagrunError::Other(anyhow::anyhow!("TokioEngine needs a Tokio runtime: {e}"))
        })?;
        let (in_flight, _) = watch::channel(0usize);

        Ok(Self {
            inner: Arc::new(EngineInner {
                store,
                ledger: RunLedger::new(),
                jobs: Mutex::new(HashMap::new()),
                in_flight,
                runtime,
            }),
        })
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.inner.store
    }

    pub fn in_flight(&self) -> usize {
        *self.inner.in_flight.borrow()
    }

    /// Ids of jobs currently in flight, ascending.
    pub fn running_jobs(&self) -> Vec<JobId> {
        let mut jobs: Vec<JobId> = self.jobs().keys().copied().collect();
        jobs.sort_unstable();
        jobs
    }

    /// Resolve once no job is in flight.
    ///
    /// Children are fired before their parent's job is released, so the
    /// count cannot touch zero in the middle of a traversal.
    pub async fn wait_idle(&self) {
        let mut rx = self.inner.in_flight.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    /// Kill one in-flight job. Returns `false` if it was not running.
    pub async fn kill(&self, job: JobId) -> bool {
        let operator = self.jobs().get(&job).cloned();
        match operator {
            Some(operator) => {
                operator.kill().await;
                true
            }
            None => false,
        }
    }

    /// Cancel the current run and kill every in-flight job (used on Ctrl-C).
    ///
    /// Killed jobs do not fire their children, and jobs already handed to
    /// the runtime end without running.
    pub async fn kill_all(&self) {
        self.inner.ledger.cancel();
        let operators: Vec<Arc<Operator>> = self.jobs().values().cloned().collect();
        info!(count = operators.len(), "killing all in-flight jobs");
        for operator in operators {
            operator.kill().await;
        }
    }

    /// Engine side of the fire contract: run the operator, then release the job.
    async fn on_fire(&self, job: JobId, operator: Arc<Operator>) {
        let _release = JobRelease { engine: self, job };
        debug!(job, kind = %operator.operator_type(), "job fired");

        let ctx = FireContext::new(self.inner.store.as_ref(), self);
        let report = operator.execute(&ctx).await;

        debug!(job, ?report, "job finished");
    }

    fn jobs(&self) -> MutexGuard<'_, HashMap<JobId, Arc<Operator>>> {
        self.inner.jobs.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SchedulingEngine for TokioEngine {
    fn fire_now(&self, job: JobId, operator: Operator) -> Result<Fired> {
        let operator = Arc::new(operator);
        {
            let mut jobs = self.jobs();
            if jobs.contains_key(&job) {
                debug!(job, "job already in flight; suppressing duplicate fire");
                return Ok(Fired::Suppressed);
            }
            jobs.insert(job, Arc::clone(&operator));
        }
        self.inner.in_flight.send_modify(|n| *n += 1);

        let engine = self.clone();
        self.inner.runtime.spawn(async move {
            engine.on_fire(job, operator).await;
        });

        Ok(Fired::Scheduled)
    }

    fn ledger(&self) -> &RunLedger {
        &self.inner.ledger
    }

    fn is_idle(&self) -> bool {
        self.in_flight() == 0
    }
}

/// Removes a job from the registry when its execution ends, including when
/// the operator panics.
struct JobRelease<'a> {
    engine: &'a TokioEngine,
    job: JobId,
}

impl Drop for JobRelease<'_> {
    fn drop(&mut self) {
        self.engine.jobs().remove(&self.job);
        self.engine.inner.in_flight.send_modify(|n| *n = n.saturating_sub(1));
    }
}
