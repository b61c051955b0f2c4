use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use dagrun::dag::TaskStore;
use dagrun::engine::{FireContext, Fired, RunLedger, SchedulingEngine};
use dagrun::errors::Result;
use dagrun::operator::{ExecutionReport, Operator};
use dagrun::types::JobId;

/// Deterministic scheduling engine for tests.
///
/// `fire_now` only queues the job. Nothing runs until the test calls
/// `run_next` / `run_until_idle`, which execute jobs one at a time in FIFO
/// order on the calling task.
pub struct ManualEngine {
    store: Arc<dyn TaskStore>,
    ledger: RunLedger,
    queue: Mutex<VecDeque<(JobId, Operator)>>,
    fired: Mutex<Vec<JobId>>,
    executed: Mutex<Vec<ExecutionReport>>,
    busy: AtomicBool,
}

impl fmt::Debug for ManualEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualEngine")
            .field("pending", &self.pending())
            .field("fired", &self.fired())
            .finish_non_exhaustive()
    }
}

impl ManualEngine {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self {
            store,
            ledger: RunLedger::new(),
            queue: Mutex::new(VecDeque::new()),
            fired: Mutex::new(Vec::new()),
            executed: Mutex::new(Vec::new()),
            busy: AtomicBool::new(false),
        }
    }

    /// Execute the oldest queued job. Returns its id, or `None` if the queue
    /// was empty.
    pub async fn run_next(&self) -> Option<JobId> {
        let (job, operator) = lock(&self.queue).pop_front()?;

        self.busy.store(true, Ordering::SeqCst);
        let ctx = FireContext::new(self.store.as_ref(), self);
        let report = operator.execute(&ctx).await;
        self.busy.store(false, Ordering::SeqCst);

        lock(&self.executed).push(report);
        Some(job)
    }

    /// Drain the queue, including jobs fired while draining. Returns the
    /// job ids in execution order.
    pub async fn run_until_idle(&self) -> Vec<JobId> {
        let mut order = Vec::new();
        while let Some(job) = self.run_next().await {
            order.push(job);
        }
        order
    }

    /// Every accepted `fire_now`, in call order.
    pub fn fired(&self) -> Vec<JobId> {
        lock(&self.fired).clone()
    }

    /// Jobs queued but not yet executed.
    pub fn pending(&self) -> Vec<JobId> {
        lock(&self.queue).iter().map(|(job, _)| *job).collect()
    }

    /// Take the execution reports collected so far.
    pub fn take_reports(&self) -> Vec<ExecutionReport> {
        std::mem::take(&mut *lock(&self.executed))
    }
}

impl SchedulingEngine for ManualEngine {
    fn fire_now(&self, job: JobId, operator: Operator) -> Result<Fired> {
        let mut queue = lock(&self.queue);
        if queue.iter().any(|(queued, _)| *queued == job) {
            return Ok(Fired::Suppressed);
        }
        queue.push_back((job, operator));
        lock(&self.fired).push(job);
        Ok(Fired::Scheduled)
    }

    fn ledger(&self) -> &RunLedger {
        &self.ledger
    }

    fn is_idle(&self) -> bool {
        !self.busy.load(Ordering::SeqCst) && lock(&self.queue).is_empty()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}
