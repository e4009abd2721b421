//! Two-stage pipeline: plan, then execute unless planning failed.

use std::sync::Arc;

use np_device::{DeviceConfig, SessionConnector};
use np_protocol::PipelineState;

use crate::config::AgentConfig;
use crate::executor::CommandExecutor;
use crate::inference;
use crate::planner::CommandPlanner;

/// Rejected user input.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("query must not be empty")]
    Empty,
}

/// Trim a raw query, rejecting empty or whitespace-only input.
pub fn normalize_query(raw: &str) -> Result<&str, QueryError> {
    let query = raw.trim();
    if query.is_empty() {
        Err(QueryError::Empty)
    } else {
        Ok(query)
    }
}

/// Planner and executor wired together.
pub struct Pipeline {
    planner: CommandPlanner,
    executor: CommandExecutor,
}

impl Pipeline {
    pub fn new(planner: CommandPlanner, executor: CommandExecutor) -> Self {
        Self { planner, executor }
    }

    /// Build from resolved configuration and a session connector.
    pub fn from_config(
        config: &AgentConfig,
        connector: Arc<dyn SessionConnector>,
    ) -> anyhow::Result<Self> {
        let device = config.device_config()?;
        let planner = Self::planner_from_config(config)?;
        Ok(Self::new(planner, CommandExecutor::new(connector, device)))
    }

    /// The planning stage alone. Needs no device credentials.
    pub fn planner_from_config(config: &AgentConfig) -> anyhow::Result<CommandPlanner> {
        let backend = inference::build_backend(&config.llm)?;
        Ok(CommandPlanner::new(backend, &config.device.device_type))
    }

    /// Device the executor targets.
    pub fn device(&self) -> &DeviceConfig {
        self.executor.device()
    }

    /// Run both stages. The returned state is always well formed.
    pub async fn run(&self, query: &str) -> PipelineState {
        let mut state = self.plan_only(query).await;
        if state.is_failed() {
            return state;
        }
        self.executor.execute(&mut state).await;
        tracing::info!(run_id = %state.id, status = ?state.status, "pipeline finished");
        state
    }

    /// Run the planner only; the device is never contacted.
    pub async fn plan_only(&self, query: &str) -> PipelineState {
        self.planner.plan_query(query).await
    }
}
