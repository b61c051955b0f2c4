use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Identifier of a task record.
pub type TaskId = u64;

/// Identifier of a job handed to the scheduling engine.
///
/// Jobs are keyed by the id of the task they run, so at most one job per task
/// can be in flight at a time.
pub type JobId = TaskId;

/// Kind of work a task performs; selects the operator variant that runs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatorType {
    Bash,
    Mail,
    #[serde(alias = "data_x")]
    DataX,
    Hive,
    Python,
    /// DAG-root marker without work of its own.
    Virtual,
    /// Any type string this build does not know how to run.
    #[serde(other)]
    Unsupported,
}

impl OperatorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperatorType::Bash => "bash",
            OperatorType::Mail => "mail",
            OperatorType::DataX => "datax",
            OperatorType::Hive => "hive",
            OperatorType::Python => "python",
            OperatorType::Virtual => "virtual",
            OperatorType::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for OperatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperatorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bash" => Ok(OperatorType::Bash),
            "mail" => Ok(OperatorType::Mail),
            "datax" | "data_x" => Ok(OperatorType::DataX),
            "hive" => Ok(OperatorType::Hive),
            "python" => Ok(OperatorType::Python),
            "virtual" => Ok(OperatorType::Virtual),
            "unsupported" => Ok(OperatorType::Unsupported),
            other => Err(format!(
                "invalid operator type: {other} (expected bash, mail, datax, hive, python or virtual)"
            )),
        }
    }
}

/// What happens to a task's children when its own work fails.
///
/// - `Continue`: children are triggered regardless of the outcome (default).
/// - `Halt`: a failed or killed task does not trigger its children, and any
///   child joining on it stays unfired for the rest of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    Continue,
    Halt,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        FailurePolicy::Continue
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "continue" => Ok(FailurePolicy::Continue),
            "halt" => Ok(FailurePolicy::Halt),
            other => Err(format!(
                "invalid failure_policy: {other} (expected \"continue\" or \"halt\")"
            )),
        }
    }
}
