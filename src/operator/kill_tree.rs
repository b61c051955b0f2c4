// src/operator/kill_tree.rs

//! Terminating a process together with everything it forked.
//!
//! Killing only the `bash -c` wrapper leaves grandchildren (background jobs,
//! pipelines, sub-shells) running with init as their new parent. So the tree
//! is discovered first, while the parent links still exist, and then every
//! pid in it is signalled.
//!
//! Discovery reads the system process table through `ps`, which works the
//! same on Linux and macOS. Every step is best effort: failures are logged
//! and the remaining pids are still signalled.

use std::collections::{BTreeMap, VecDeque};
use std::sync::LazyLock;

use anyhow::{Context, Result, bail};
use regex::Regex;
use tokio::process::Command;
use tracing::{debug, warn};

static PS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d+)\s+(\d+)\s*$").expect("static regex is valid")
});

/// Map of `parent pid -> child pids`, as reported by the process table.
pub type ProcessTable = BTreeMap<u32, Vec<u32>>;

/// Parse the output of `ps -A -o pid= -o ppid=`.
///
/// Lines that do not look like `<pid> <ppid>` are ignored.
pub fn parse_process_table(ps_output: &str) -> ProcessTable {
    let mut table = ProcessTable::new();

    for line in ps_output.lines() {
        let Some(caps) = PS_LINE.captures(line) else {
            continue;
        };
        let (Ok(pid), Ok(ppid)) = (caps[1].parse::<u32>(), caps[2].parse::<u32>()) else {
            continue;
        };
        table.entry(ppid).or_default().push(pid);
    }

    table
}

/// Snapshot the current process table.
pub async fn process_table() -> Result<ProcessTable> {
    let output = Command::new("ps")
        .args(["-A", "-o", "pid=", "-o", "ppid="])
        .output()
        .await
        .context("running ps to list processes")?;

    if !output.status.success() {
        bail!("ps exited with {}", output.status);
    }

    Ok(parse_process_table(&String::from_utf8_lossy(&output.stdout)))
}

/// All descendants of `root` in breadth-first order (children before
/// grandchildren). `root` itself is not included.
pub fn descendants(root: u32, table: &ProcessTable) -> Vec<u32> {
    let mut found = Vec::new();
    let mut queue = VecDeque::from([root]);

    while let Some(pid) = queue.pop_front() {
        for &child in table.get(&pid).map(Vec::as_slice).unwrap_or(&[]) {
            // ps can in theory report a pid twice if it raced a fork.
            if child != root && !found.contains(&child) {
                found.push(child);
                queue.push_back(child);
            }
        }
    }

    found
}

/// Forcefully terminate `root` and all of its descendants.
///
/// Descendants are signalled deepest-first, the root last. Returns the pids
/// that were signalled successfully.
pub async fn kill_tree(root: u32) -> Vec<u32> {
    let mut targets = match process_table().await {
        Ok(table) => descendants(root, &table),
        Err(e) => {
            warn!(pid = root, error = %e, "could not enumerate process tree; killing root only");
            Vec::new()
        }
    };
    targets.reverse();
    targets.push(root);

    debug!(pid = root, ?targets, "killing process tree");

    let mut killed = Vec::with_capacity(targets.len());
    for pid in targets {
        match signal_kill(pid).await {
            Ok(()) => killed.push(pid),
            Err(e) => warn!(pid, error = %e, "failed to signal process"),
        }
    }

    killed
}

async fn signal_kill(pid: u32) -> Result<()> {
    let status = Command::new("kill")
        .arg("-9")
        .arg(pid.to_string())
        .output()
        .await
        .with_context(|| format!("running kill for pid {pid}"))?
        .status;

    if !status.success() {
        bail!("kill -9 {pid} exited with {status}");
    }
    Ok(())
}
