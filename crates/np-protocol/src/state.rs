use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::commands::CommandSet;
use crate::results::{ExecutionRecord, RecordStatus};

/// Progress marker for a pipeline run.
///
/// Not a guarded state machine: any stage may overwrite it with `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    #[default]
    Pending,
    CommandsGenerated,
    Failed,
    Success,
}

/// The record threaded through planner and executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineState {
    /// Run identifier (UUIDv7), used to correlate log lines.
    pub id: Uuid,
    /// Original natural-language request.
    pub query: String,
    /// Planner output. `None` until the planner succeeds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commands: Option<CommandSet>,
    /// Attempts in execution order.
    #[serde(default)]
    pub execution_results: Vec<ExecutionRecord>,
    pub status: PipelineStatus,
    /// Stage-level failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Start time, overwritten with the completion time by the executor.
    pub timestamp: DateTime<Utc>,
}

impl PipelineState {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            query: query.into(),
            commands: None,
            execution_results: Vec::new(),
            status: PipelineStatus::Pending,
            error_message: None,
            timestamp: Utc::now(),
        }
    }

    /// Mark the run as failed at stage granularity.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = PipelineStatus::Failed;
        self.error_message = Some(message.into());
    }

    pub fn is_failed(&self) -> bool {
        self.status == PipelineStatus::Failed
    }

    /// Planner output, or an empty set when the planner has not produced one.
    pub fn commands_or_default(&self) -> CommandSet {
        self.commands.clone().unwrap_or_default()
    }

    /// Split results into (succeeded, failed), each in execution order.
    pub fn results_by_status(&self) -> (Vec<&ExecutionRecord>, Vec<&ExecutionRecord>) {
        self.execution_results
            .iter()
            .partition(|r| r.status == RecordStatus::Success)
    }
}
