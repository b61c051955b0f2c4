// src/operator/connector.rs

//! Operators whose work happens outside this crate.
//!
//! Mail delivery and the DataX / Hive integrations are separate systems; here
//! they only follow the operator lifecycle so that a graph containing them
//! still traverses correctly.

use std::sync::Arc;

use tracing::{debug, info};

use crate::dag::Task;
use crate::operator::OperatorOutcome;
use crate::operator::settings::OperatorSettings;
use crate::types::OperatorType;

/// Lifecycle-only operator for Mail, DataX and Hive tasks.
#[derive(Debug)]
pub struct ConnectorOperator {
    task: Task,
    settings: Arc<OperatorSettings>,
}

impl ConnectorOperator {
    pub fn new(task: Task, settings: Arc<OperatorSettings>) -> Self {
        Self { task, settings }
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn settings(&self) -> &Arc<OperatorSettings> {
        &self.settings
    }

    pub fn kind(&self) -> OperatorType {
        self.task.operator_type
    }

    pub async fn process(&self) -> OperatorOutcome {
        info!(
            task = self.task.id,
            kind = %self.kind(),
            "no connector bound for this operator type; nothing to run"
        );
        OperatorOutcome::Skipped
    }
}

/// Root marker: groups children, has no work of its own.
#[derive(Debug)]
pub struct VirtualOperator {
    task: Task,
    settings: Arc<OperatorSettings>,
}

impl VirtualOperator {
    pub fn new(task: Task, settings: Arc<OperatorSettings>) -> Self {
        Self { task, settings }
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn settings(&self) -> &Arc<OperatorSettings> {
        &self.settings
    }

    pub async fn process(&self) -> OperatorOutcome {
        debug!(task = self.task.id, "virtual operator has no work");
        OperatorOutcome::Skipped
    }
}
