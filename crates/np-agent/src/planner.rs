//! Command planner: natural-language query → show / config / verify lists.
//!
//! One structured-output call per query. No validation of the generated
//! commands and no retry; failures become stage-level errors on the state.

use std::sync::Arc;

use np_device::platform;
use np_protocol::{CommandSet, PipelineState, PipelineStatus};
use serde::Deserialize;

use crate::inference::{InferenceError, StructuredOutput, StructuredRequest};

/// Name of the output schema (and of the forced function for OpenAI).
pub const SCHEMA_NAME: &str = "CommandsList";

/// Errors from command generation.
#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error("model output does not match the CommandsList schema: {0}")]
    Schema(#[from] serde_json::Error),
}

/// Model output shape. Every list may be omitted.
#[derive(Debug, Deserialize)]
struct CommandsList {
    #[serde(default)]
    show_commands: Vec<String>,
    #[serde(default)]
    config_commands: Vec<String>,
    #[serde(default)]
    verify_commands: Vec<String>,
}

impl From<CommandsList> for CommandSet {
    fn from(list: CommandsList) -> Self {
        CommandSet::new(list.show_commands, list.config_commands, list.verify_commands)
    }
}

/// JSON schema for [`CommandsList`].
pub fn commands_schema() -> serde_json::Value {
    let list = |description: &str| {
        serde_json::json!({
            "type": "array",
            "items": { "type": "string" },
            "description": description,
        })
    };
    serde_json::json!({
        "type": "object",
        "properties": {
            "show_commands": list("Show commands to execute"),
            "config_commands": list("Configuration commands to execute"),
            "verify_commands": list("Verification commands to execute"),
        },
    })
}

/// Build the system prompt for a platform name such as "Cisco IOS XE".
pub fn system_prompt(platform_name: &str) -> String {
    format!(
        "You are an expert {platform_name} Network Command Generator.

Analyze the natural language query and generate appropriate network commands following these rules:
1. Show commands: Include diagnostic and verification commands (show, ping, traceroute)
2. Config commands: Include complete configuration sequences, properly ordered
3. Verify commands: Include verification commands to validate configurations

Important rules:
- Configuration commands must be in the correct order
- Include all necessary sub-commands for configuration
- Add appropriate verification commands for each configuration
- For interface configurations, include 'no shutdown' when enabling
- For IP configurations, include the mask in dotted-decimal format (e.g. 255.255.255.0)
- Do not include 'configure terminal', 'end' or save commands; configuration mode and saving are handled for you
- Leave a list empty when the query needs no commands of that kind"
    )
}

/// Wrap the user's query.
pub fn user_message(query: &str) -> String {
    format!("Convert this query into appropriate commands:\nQuery: {query}")
}

/// Turns queries into command sets via an LLM backend.
pub struct CommandPlanner {
    backend: Arc<dyn StructuredOutput>,
    platform_name: String,
    schema: serde_json::Value,
}

impl CommandPlanner {
    /// Planner targeting `device_type`. Unknown types fall back to the raw
    /// identifier in the prompt; the executor rejects them at connect.
    pub fn new(backend: Arc<dyn StructuredOutput>, device_type: &str) -> Self {
        let platform_name = platform::lookup(device_type)
            .map(|p| p.display_name.to_string())
            .unwrap_or_else(|| device_type.to_string());
        Self {
            backend,
            platform_name,
            schema: commands_schema(),
        }
    }

    pub fn platform_name(&self) -> &str {
        &self.platform_name
    }

    /// One structured-output call; no retry.
    pub async fn generate(&self, query: &str) -> Result<CommandSet, PlannerError> {
        let system = system_prompt(&self.platform_name);
        let user = user_message(query);
        let value = self
            .backend
            .generate(StructuredRequest {
                system: &system,
                user: &user,
                schema_name: SCHEMA_NAME,
                schema: &self.schema,
            })
            .await?;
        let list: CommandsList = serde_json::from_value(value)?;
        Ok(list.into())
    }

    /// Start a run for `query` and plan it.
    pub async fn plan_query(&self, query: &str) -> PipelineState {
        let mut state = PipelineState::new(query);
        tracing::info!(run_id = %state.id, query = %state.query, "pipeline started");
        self.plan(&mut state).await;
        state
    }

    /// Fill `state.commands`, or mark the state failed.
    pub async fn plan(&self, state: &mut PipelineState) {
        let generated = self.generate(&state.query).await;
        match generated {
            Ok(commands) => {
                tracing::info!(
                    run_id = %state.id,
                    backend = self.backend.backend_name(),
                    show = ?commands.show,
                    config = ?commands.config,
                    verify = ?commands.verify,
                    "commands generated successfully"
                );
                state.commands = Some(commands);
                state.status = PipelineStatus::CommandsGenerated;
                state.error_message = None;
            }
            Err(e) => {
                tracing::error!(run_id = %state.id, error = %e, "command generation failed");
                state.fail(format!("Error in command generation: {e}"));
            }
        }
    }
}
