// src/operator/process.rs

//! Operator that runs the task command as an external OS process.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::dag::Task;
use crate::operator::OperatorOutcome;
use crate::operator::kill_tree::kill_tree;
use crate::operator::settings::OperatorSettings;
use crate::types::TaskId;

/// How long to keep reading output after the process has exited. A detached
/// descendant can hold the pipes open indefinitely.
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Program flavour used to run the task command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpreter {
    /// `<bash> -c <command>`
    Bash,
    /// `<python> -c <command>`
    Python,
}

impl Interpreter {
    fn program<'a>(&self, settings: &'a OperatorSettings) -> &'a str {
        match self {
            Interpreter::Bash => &settings.bash,
            Interpreter::Python => &settings.python,
        }
    }
}

/// Lifecycle of the single process an operator runs.
///
/// `NotStarted -> Running -> Finished | Killed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    NotStarted,
    Running {
        pid: Option<u32>,
    },
    /// The process exited on its own, or could not be spawned at all
    /// (`exit_value == -1`).
    Finished {
        exit_value: i32,
    },
    /// Terminated through `kill()` or the watchdog.
    Killed {
        exit_value: Option<i32>,
    },
}

/// Per-run process bookkeeping. Owned by exactly one `ProcessOperator`.
#[derive(Debug)]
struct ProcessHandle {
    output: Arc<Mutex<String>>,
    state: Mutex<ProcessState>,
    /// Wakes the supervisor when `kill()` is called.
    cancel: Mutex<Option<oneshot::Sender<()>>>,
    kill_requested: AtomicBool,
}

impl Default for ProcessHandle {
    fn default() -> Self {
        Self {
            output: Arc::new(Mutex::new(String::new())),
            state: Mutex::new(ProcessState::NotStarted),
            cancel: Mutex::new(None),
            kill_requested: AtomicBool::new(false),
        }
    }
}

impl ProcessHandle {
    fn state(&self) -> ProcessState {
        *lock(&self.state)
    }

    fn set_state(&self, state: ProcessState) {
        *lock(&self.state) = state;
    }

    fn take_cancel(&self) -> Option<oneshot::Sender<()>> {
        lock(&self.cancel).take()
    }
}

/// Runs `task.command` through bash (or python), capturing combined
/// stdout/stderr and supervising the process until it exits or is killed.
#[derive(Debug)]
pub struct ProcessOperator {
    task: Task,
    settings: Arc<OperatorSettings>,
    interpreter: Interpreter,
    handle: ProcessHandle,
}

impl ProcessOperator {
    pub fn new(task: Task, settings: Arc<OperatorSettings>, interpreter: Interpreter) -> Self {
        Self {
            task,
            settings,
            interpreter,
            handle: ProcessHandle::default(),
        }
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn settings(&self) -> &Arc<OperatorSettings> {
        &self.settings
    }

    pub fn interpreter(&self) -> Interpreter {
        self.interpreter
    }

    pub fn command(&self) -> &str {
        &self.task.command
    }

    pub fn state(&self) -> ProcessState {
        self.handle.state()
    }

    /// OS pid of the spawned process while it is running.
    pub fn pid(&self) -> Option<u32> {
        match self.handle.state() {
            ProcessState::Running { pid } => pid,
            _ => None,
        }
    }

    /// Captured stdout and stderr so far. Partial while running, complete
    /// once finished.
    pub fn output(&self) -> String {
        lock(&self.handle.output).clone()
    }

    /// `true` once the process exited by itself or was killed.
    pub fn is_finished(&self) -> bool {
        matches!(
            self.handle.state(),
            ProcessState::Finished { .. } | ProcessState::Killed { .. }
        )
    }

    /// `true` only if finished with the expected exit value. Never fails;
    /// an unfinished process is simply not successful.
    pub fn is_success(&self) -> bool {
        matches!(
            self.handle.state(),
            ProcessState::Finished { exit_value } if exit_value == self.settings.expected_exit_value
        )
    }

    /// Exit value once known. A killed process may have none.
    pub fn exit_value(&self) -> Option<i32> {
        match self.handle.state() {
            ProcessState::Finished { exit_value } => Some(exit_value),
            ProcessState::Killed { exit_value } => exit_value,
            ProcessState::NotStarted | ProcessState::Running { .. } => None,
        }
    }

    /// Outcome derived from the current state, if terminal.
    pub fn outcome(&self) -> Option<OperatorOutcome> {
        match self.handle.state() {
            ProcessState::Finished { exit_value } if exit_value == self.settings.expected_exit_value => {
                Some(OperatorOutcome::Success)
            }
            ProcessState::Finished { exit_value } => Some(OperatorOutcome::Failed { exit_value }),
            ProcessState::Killed { .. } => Some(OperatorOutcome::Killed),
            ProcessState::NotStarted | ProcessState::Running { .. } => None,
        }
    }

    /// Spawn the command and wait for it to exit or be killed.
    ///
    /// Failures never escape: a spawn error is recorded as exit value `-1`
    /// and reported as a failed outcome.
    pub async fn process(&self) -> OperatorOutcome {
        let task_id = self.task.id;

        if self.handle.state() != ProcessState::NotStarted {
            warn!(task = task_id, state = ?self.handle.state(), "process already started; not running it again");
            return self.outcome().unwrap_or(OperatorOutcome::Failed { exit_value: -1 });
        }

        let program = self.interpreter.program(&self.settings);
        info!(task = task_id, program, cmd = %self.task.command, "starting task process");

        let mut cmd = Command::new(program);
        cmd.arg("-c")
            .arg(&self.task.command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                error!(task = task_id, program, error = %e, "failed to spawn task process");
                self.handle.set_state(ProcessState::Finished { exit_value: -1 });
                return self.finish_outcome();
            }
        };

        let pid = child.id();
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        *lock(&self.handle.cancel) = Some(cancel_tx);
        self.handle.set_state(ProcessState::Running { pid });
        debug!(task = task_id, ?pid, "task process running");

        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_capture(stdout, Arc::clone(&self.handle.output), task_id, "stdout"));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_capture(stderr, Arc::clone(&self.handle.output), task_id, "stderr"));
        }

        let final_state = tokio::select! {
            status_res = child.wait() => {
                match status_res {
                    Ok(status) if self.handle.kill_requested.load(Ordering::SeqCst) => {
                        ProcessState::Killed { exit_value: status.code() }
                    }
                    Ok(status) => ProcessState::Finished {
                        exit_value: status.code().unwrap_or(-1),
                    },
                    Err(e) => {
                        error!(task = task_id, error = %e, "waiting for task process failed");
                        ProcessState::Finished { exit_value: -1 }
                    }
                }
            }

            _ = cancel_rx => {
                // kill() has already signalled the tree; make sure the direct
                // child is gone and reaped.
                if let Err(e) = child.kill().await {
                    debug!(task = task_id, error = %e, "child already gone after kill");
                }
                ProcessState::Killed { exit_value: None }
            }

            _ = watchdog(self.settings.timeout) => {
                warn!(task = task_id, timeout = ?self.settings.timeout, "watchdog expired; killing task process");
                self.handle.kill_requested.store(true, Ordering::SeqCst);
                if let Some(pid) = pid {
                    kill_tree(pid).await;
                }
                if let Err(e) = child.kill().await {
                    debug!(task = task_id, error = %e, "child already gone after watchdog kill");
                }
                ProcessState::Killed { exit_value: None }
            }
        };

        for reader in readers {
            if timeout(OUTPUT_DRAIN_GRACE, reader).await.is_err() {
                debug!(task = task_id, "output pipe still open after exit; leaving reader detached");
            }
        }

        self.handle.take_cancel();
        self.handle.set_state(final_state);

        let outcome = self.finish_outcome();
        info!(task = task_id, state = ?final_state, ?outcome, "task process ended");
        outcome
    }

    /// Forcefully terminate the running process and all of its descendants.
    ///
    /// Best effort: problems reading the process table or signalling a pid
    /// are logged, never returned. Does nothing if no process is running.
    pub async fn kill(&self) {
        let task_id = self.task.id;
        let pid = match self.handle.state() {
            ProcessState::Running { pid } => pid,
            other => {
                debug!(task = task_id, state = ?other, "kill requested but no process is running");
                return;
            }
        };

        self.handle.kill_requested.store(true, Ordering::SeqCst);

        match pid {
            Some(pid) => {
                let signalled = kill_tree(pid).await;
                info!(task = task_id, pid, ?signalled, "killed task process tree");
            }
            None => warn!(task = task_id, "running process has no pid; relying on direct kill"),
        }

        if let Some(cancel) = self.handle.take_cancel() {
            if cancel.send(()).is_err() {
                debug!(task = task_id, "process supervisor already finished while killing");
            }
        }
    }

    fn finish_outcome(&self) -> OperatorOutcome {
        self.outcome().unwrap_or(OperatorOutcome::Failed { exit_value: -1 })
    }
}

/// Resolves after `limit`, or never when there is no limit.
async fn watchdog(limit: Option<Duration>) {
    match limit {
        Some(limit) => sleep(limit).await,
        None => std::future::pending::<()>().await,
    }
}

/// Append everything read from `reader` to the shared capture buffer.
fn spawn_capture<R>(
    reader: R,
    buffer: Arc<Mutex<String>>,
    task: TaskId,
    stream: &'static str,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut line = Vec::new();

        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line).await {
                Ok(0) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&line);
                    debug!(task, stream, "{}", text.trim_end());
                    lock(&buffer).push_str(&text);
                }
                Err(e) => {
                    debug!(task, stream, error = %e, "output reader stopped");
                    break;
                }
            }
        }
    })
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
