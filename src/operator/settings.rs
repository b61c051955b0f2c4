// src/operator/settings.rs

use std::time::Duration;

use crate::types::FailurePolicy;

/// Knobs shared by every operator built during a run.
///
/// One `Arc<OperatorSettings>` is handed from the tracker to each root and
/// then from every parent to the children it builds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorSettings {
    /// Exit code that counts as success for process operators.
    pub expected_exit_value: i32,
    pub failure_policy: FailurePolicy,
    /// Watchdog threshold; `None` means a process may run forever unless
    /// somebody calls `kill()`.
    pub timeout: Option<Duration>,
    /// Program used for `Bash` tasks (`<bash> -c <command>`).
    pub bash: String,
    /// Program used for `Python` tasks (`<python> -c <command>`).
    pub python: String,
}

impl Default for OperatorSettings {
    fn default() -> Self {
        Self {
            expected_exit_value: 0,
            failure_policy: FailurePolicy::Continue,
            timeout: None,
            bash: "bash".to_string(),
            python: "python3".to_string(),
        }
    }
}

impl OperatorSettings {
    pub fn with_expected_exit_value(mut self, value: i32) -> Self {
        self.expected_exit_value = value;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}
