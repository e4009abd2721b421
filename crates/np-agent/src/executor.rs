//! Command executor: runs a planned command set against one device.
//!
//! One session per call, strictly sequential:
//! show commands → configuration batch → save → verify commands.
//! Command-level failures become `failed` records and the run goes on;
//! a fatal session error aborts the run at stage level.

use std::sync::Arc;

use chrono::Utc;
use np_device::{DeviceConfig, DeviceSession, SessionConnector, SessionError, SessionResult};
use np_protocol::{CommandSet, ExecutionRecord, PipelineState, PipelineStatus, RecordKind};
use uuid::Uuid;

/// Stage-level executor failures.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("could not open session: {0}")]
    SessionOpen(SessionError),
    #[error("session lost: {0}")]
    SessionLost(SessionError),
}

/// Executes command sets on the configured device.
pub struct CommandExecutor {
    connector: Arc<dyn SessionConnector>,
    device: DeviceConfig,
}

impl CommandExecutor {
    pub fn new(connector: Arc<dyn SessionConnector>, device: DeviceConfig) -> Self {
        Self { connector, device }
    }

    pub fn device(&self) -> &DeviceConfig {
        &self.device
    }

    /// Run `state.commands` and record the outcome on the state.
    ///
    /// `execution_results` is replaced with this run's records, including
    /// the ones gathered before a fatal error. `timestamp` is always set.
    pub async fn execute(&self, state: &mut PipelineState) {
        let commands = state.commands_or_default();
        let mut records = Vec::with_capacity(commands.max_records());

        match self.run(state.id, &commands, &mut records).await {
            Ok(()) => {
                tracing::info!(
                    run_id = %state.id,
                    records = records.len(),
                    "command execution completed"
                );
                state.status = PipelineStatus::Success;
            }
            Err(e) => {
                tracing::error!(run_id = %state.id, error = %e, "command execution aborted");
                state.fail(format!("Unexpected error: {e}"));
            }
        }

        state.execution_results = records;
        state.timestamp = Utc::now();
    }

    async fn run(
        &self,
        run_id: Uuid,
        commands: &CommandSet,
        records: &mut Vec<ExecutionRecord>,
    ) -> Result<(), ExecutorError> {
        let mut session = self
            .connector
            .connect(&self.device)
            .await
            .map_err(ExecutorError::SessionOpen)?;
        tracing::info!(
            %run_id,
            host = %self.device.host,
            device_type = %self.device.device_type,
            "device session opened"
        );

        let outcome = run_phases(session.as_mut(), commands, records).await;

        if let Err(e) = session.close().await {
            tracing::warn!(%run_id, error = %e, "device session close failed");
        }
        outcome.map_err(ExecutorError::SessionLost)
    }
}

async fn run_phases(
    session: &mut dyn DeviceSession,
    commands: &CommandSet,
    records: &mut Vec<ExecutionRecord>,
) -> SessionResult<()> {
    if !commands.show.is_empty() {
        tracing::info!(count = commands.show.len(), "executing show commands");
        for command in &commands.show {
            records.push(run_single(session, RecordKind::Show, command).await?);
        }
    }

    if !commands.config.is_empty() {
        tracing::info!(count = commands.config.len(), "applying configuration");
        run_config(session, &commands.config, records).await?;
    }

    if !commands.verify.is_empty() {
        tracing::info!(count = commands.verify.len(), "executing verification commands");
        for command in &commands.verify {
            records.push(run_single(session, RecordKind::Verify, command).await?);
        }
    }

    Ok(())
}

/// One exec-mode command. `Err` only for fatal session errors.
async fn run_single(
    session: &mut dyn DeviceSession,
    kind: RecordKind,
    command: &str,
) -> SessionResult<ExecutionRecord> {
    match session.send_command(command).await {
        Ok(output) => {
            tracing::info!(%command, kind = %kind, "command executed");
            Ok(ExecutionRecord::succeeded(kind, command, output))
        }
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            tracing::error!(%command, kind = %kind, error = %e, "command failed");
            let noun = match kind {
                RecordKind::Verify => "verification",
                _ => "show",
            };
            Ok(ExecutionRecord::failed(
                kind,
                command,
                format!("Error executing {noun} command '{command}': {e}"),
            ))
        }
    }
}

/// Configuration batch plus save. Pushes one or two records.
async fn run_config(
    session: &mut dyn DeviceSession,
    config: &[String],
    records: &mut Vec<ExecutionRecord>,
) -> SessionResult<()> {
    match session.send_config_set(config).await {
        Ok(output) => {
            tracing::info!(commands = ?config, "configuration applied");
            records.push(ExecutionRecord::config_applied(output, config));
        }
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => {
            tracing::error!(commands = ?config, error = %e, "configuration failed");
            records.push(ExecutionRecord::config_rejected(
                format!("Error during configuration: {e}"),
                config,
            ));
            return Ok(());
        }
    }

    let save_command = session.save_command().to_string();
    match session.save_config().await {
        Ok(output) => {
            tracing::info!(command = %save_command, "configuration saved");
            records.push(ExecutionRecord::succeeded(
                RecordKind::ConfigSave,
                save_command,
                output,
            ));
        }
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => {
            tracing::error!(command = %save_command, error = %e, "configuration save failed");
            records.push(ExecutionRecord::failed(
                RecordKind::ConfigSave,
                save_command,
                format!("Error saving configuration: {e}"),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use np_device::{MockConnector, MockReply};
    use np_protocol::{CONFIG_BATCH_LABEL, RecordStatus};

    use super::*;

    fn device() -> DeviceConfig {
        DeviceConfig::new("10.0.0.1", "admin", "secret")
    }

    fn executor(mock: &MockConnector) -> CommandExecutor {
        CommandExecutor::new(Arc::new(mock.clone()), device())
    }

    fn state_with(commands: CommandSet) -> PipelineState {
        let mut state = PipelineState::new("test query");
        state.commands = Some(commands);
        state.status = PipelineStatus::CommandsGenerated;
        state
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn loopback_commands() -> CommandSet {
        CommandSet::new(
            vec![],
            strings(&[
                "interface Loopback1",
                "ip address 1.1.1.1 255.255.255.0",
                "no shutdown",
            ]),
            strings(&["show running-config interface Loopback1"]),
        )
    }

    fn kinds(state: &PipelineState) -> Vec<RecordKind> {
        state.execution_results.iter().map(|r| r.kind).collect()
    }

    #[tokio::test]
    async fn show_only_run() {
        let mock = MockConnector::new()
            .with_output("show version", "Cisco IOS XE Software, Version 17.9.4")
            .with_output("show ip interface brief", "GigabitEthernet1  10.0.0.1  YES manual up up");
        let mut state = state_with(CommandSet::new(
            strings(&["show version", "show ip interface brief"]),
            vec![],
            vec![],
        ));

        executor(&mock).execute(&mut state).await;

        assert_eq!(state.status, PipelineStatus::Success);
        assert!(state.error_message.is_none());
        assert_eq!(kinds(&state), vec![RecordKind::Show, RecordKind::Show]);
        assert_eq!(state.execution_results[0].command, "show version");
        assert!(state.execution_results[0].output.contains("17.9.4"));
        assert_eq!(state.execution_results[1].command, "show ip interface brief");
        assert!(state.execution_results.iter().all(ExecutionRecord::is_success));
        assert_eq!(mock.close_count(), 1);
    }

    #[tokio::test]
    async fn config_then_save_then_verify() {
        let mock = MockConnector::new().with_output(
            "show running-config interface Loopback1",
            "interface Loopback1\n ip address 1.1.1.1 255.255.255.0",
        );
        let mut state = state_with(loopback_commands());

        executor(&mock).execute(&mut state).await;

        assert_eq!(state.status, PipelineStatus::Success);
        assert_eq!(
            kinds(&state),
            vec![RecordKind::Config, RecordKind::ConfigSave, RecordKind::Verify]
        );

        let batch = &state.execution_results[0];
        assert_eq!(batch.command, CONFIG_BATCH_LABEL);
        assert_eq!(batch.commands_executed.as_deref(), Some(&loopback_commands().config[..]));
        assert!(batch.commands_attempted.is_none());

        let save = &state.execution_results[1];
        assert_eq!(save.command, "write memory");
        assert_eq!(save.status, RecordStatus::Success);

        assert_eq!(
            mock.sent(),
            strings(&[
                "configure terminal",
                "interface Loopback1",
                "ip address 1.1.1.1 255.255.255.0",
                "no shutdown",
                "end",
                "write memory",
                "show running-config interface Loopback1",
            ])
        );
    }

    #[tokio::test]
    async fn nxos_save_label() {
        let mock = MockConnector::new();
        let executor = CommandExecutor::new(
            Arc::new(mock.clone()),
            device().with_device_type("cisco_nxos"),
        );
        let mut state = state_with(loopback_commands());

        executor.execute(&mut state).await;

        assert_eq!(
            state.execution_results[1].command,
            "copy running-config startup-config"
        );
    }

    #[tokio::test]
    async fn empty_config_has_no_batch_records() {
        let mock = MockConnector::new();
        let commands = CommandSet::new(strings(&["show clock"]), vec![], strings(&["show ntp status"]));
        let mut state = state_with(commands.clone());

        executor(&mock).execute(&mut state).await;

        assert_eq!(state.execution_results.len(), commands.show.len() + commands.verify.len());
        assert_eq!(kinds(&state), vec![RecordKind::Show, RecordKind::Verify]);
        assert!(!mock.sent().contains(&"configure terminal".to_string()));
    }

    #[tokio::test]
    async fn failing_show_does_not_stop_run() {
        let mock = MockConnector::new()
            .with_reply(
                "show bogus",
                MockReply::Reject("% Invalid input detected at '^' marker.".into()),
            )
            .with_output("show clock", "*10:00:00.000 UTC Mon Oct 19 2026");
        let mut state = state_with(CommandSet::new(
            strings(&["show bogus", "show clock"]),
            vec![],
            strings(&["show version"]),
        ));

        executor(&mock).execute(&mut state).await;

        assert_eq!(state.status, PipelineStatus::Success);
        assert_eq!(state.execution_results.len(), 3);
        let failed = &state.execution_results[0];
        assert_eq!(failed.status, RecordStatus::Failed);
        assert!(
            failed
                .output
                .starts_with("Error executing show command 'show bogus': ")
        );
        assert!(state.execution_results[1].is_success());
        assert!(state.execution_results[2].is_success());
        assert_eq!(mock.close_count(), 1);
    }

    #[tokio::test]
    async fn failing_verify_message() {
        let mock = MockConnector::new()
            .with_reply("show ip ospf neighbor", MockReply::Fail("timed out".into()));
        let mut state = state_with(CommandSet::new(
            vec![],
            vec![],
            strings(&["show ip ospf neighbor"]),
        ));

        executor(&mock).execute(&mut state).await;

        let record = &state.execution_results[0];
        assert_eq!(record.kind, RecordKind::Verify);
        assert_eq!(record.status, RecordStatus::Failed);
        assert!(
            record
                .output
                .starts_with("Error executing verification command 'show ip ospf neighbor': ")
        );
    }

    #[tokio::test]
    async fn rejected_batch_skips_save() {
        let mock = MockConnector::new()
            .with_config_reply(MockReply::Reject("% Invalid input detected".into()));
        let mut state = state_with(loopback_commands());

        executor(&mock).execute(&mut state).await;

        assert_eq!(state.status, PipelineStatus::Success);
        assert_eq!(kinds(&state), vec![RecordKind::Config, RecordKind::Verify]);
        let batch = &state.execution_results[0];
        assert_eq!(batch.status, RecordStatus::Failed);
        assert!(batch.output.starts_with("Error during configuration: "));
        assert!(batch.commands_executed.is_none());
        assert_eq!(batch.commands_attempted.as_ref().map(Vec::len), Some(3));
        assert!(!mock.sent().contains(&"write memory".to_string()));
    }

    #[tokio::test]
    async fn failed_save_is_recorded_and_run_continues() {
        let mock = MockConnector::new()
            .with_save_reply(MockReply::Reject("% Error: flash is full".into()));
        let mut state = state_with(loopback_commands());

        executor(&mock).execute(&mut state).await;

        assert_eq!(state.status, PipelineStatus::Success);
        assert_eq!(
            kinds(&state),
            vec![RecordKind::Config, RecordKind::ConfigSave, RecordKind::Verify]
        );
        let save = &state.execution_results[1];
        assert_eq!(save.status, RecordStatus::Failed);
        assert!(save.output.starts_with("Error saving configuration: "));
    }

    #[tokio::test]
    async fn connect_failure_fails_stage() {
        let mock = MockConnector::new().refusing("No route to host");
        let mut state = state_with(loopback_commands());
        let before = state.timestamp;

        executor(&mock).execute(&mut state).await;

        assert!(state.is_failed());
        assert!(state.execution_results.is_empty());
        let message = state.error_message.clone().unwrap();
        assert!(message.starts_with("Unexpected error: "));
        assert!(message.contains("No route to host"));
        assert!(state.timestamp >= before);
        assert_eq!(mock.close_count(), 0);
    }

    #[tokio::test]
    async fn auth_failure_fails_stage() {
        let mock = MockConnector::new().denying_auth("Permission denied");
        let mut state = state_with(loopback_commands());

        executor(&mock).execute(&mut state).await;

        assert!(state.is_failed());
        assert!(state.execution_results.is_empty());
        assert!(state.error_message.unwrap().contains("Permission denied"));
    }

    #[tokio::test]
    async fn unsupported_platform_fails_stage() {
        let mock = MockConnector::new();
        let executor = CommandExecutor::new(
            Arc::new(mock.clone()),
            device().with_device_type("juniper_junos"),
        );
        let mut state = state_with(loopback_commands());

        executor.execute(&mut state).await;

        assert!(state.is_failed());
        assert!(state.error_message.unwrap().contains("juniper_junos"));
    }

    #[tokio::test]
    async fn disconnect_mid_run_keeps_earlier_records() {
        let mock = MockConnector::new()
            .with_output("show version", "Version 17.9.4")
            .with_reply("show clock", MockReply::Disconnect);
        let mut state = state_with(CommandSet::new(
            strings(&["show version", "show clock", "show users"]),
            vec![],
            strings(&["show ip route"]),
        ));

        executor(&mock).execute(&mut state).await;

        assert!(state.is_failed());
        assert!(state.error_message.unwrap().starts_with("Unexpected error: "));
        // Fatal attempt gets no record; nothing after it runs.
        assert_eq!(state.execution_results.len(), 1);
        assert_eq!(state.execution_results[0].command, "show version");
        assert!(!mock.sent().contains(&"show users".to_string()));
        assert_eq!(mock.close_count(), 1);
    }

    #[tokio::test]
    async fn disconnect_during_batch_aborts() {
        let mock = MockConnector::new().with_config_reply(MockReply::Disconnect);
        let mut state = state_with(loopback_commands());

        executor(&mock).execute(&mut state).await;

        assert!(state.is_failed());
        assert!(state.execution_results.is_empty());
        assert_eq!(mock.close_count(), 1);
    }

    #[tokio::test]
    async fn missing_commands_run_nothing() {
        let mock = MockConnector::new();
        let mut state = PipelineState::new("noop");

        executor(&mock).execute(&mut state).await;

        assert_eq!(state.status, PipelineStatus::Success);
        assert!(state.execution_results.is_empty());
        assert_eq!(mock.connect_count(), 1);
        assert_eq!(mock.close_count(), 1);
    }

    #[tokio::test]
    async fn rerun_is_deterministic() {
        let mock = MockConnector::new()
            .with_output("show version", "Version 17.9.4")
            .with_reply("show bogus", MockReply::Reject("% Invalid input".into()));
        let commands = CommandSet::new(
            strings(&["show version", "show bogus"]),
            strings(&["ntp server 10.0.0.5"]),
            strings(&["show ntp associations"]),
        );
        let executor = executor(&mock);

        let mut first = state_with(commands.clone());
        executor.execute(&mut first).await;
        let mut second = state_with(commands);
        executor.execute(&mut second).await;

        assert_eq!(first.execution_results, second.execution_results);
        assert_eq!(first.status, second.status);
        assert_eq!(mock.close_count(), 2);
    }

    #[tokio::test]
    async fn records_bounded_by_command_count() {
        let mock = MockConnector::new();
        let commands = CommandSet::new(
            strings(&["show a", "show b"]),
            strings(&["x", "y", "z"]),
            strings(&["show c"]),
        );
        let mut state = state_with(commands.clone());

        executor(&mock).execute(&mut state).await;

        assert!(state.execution_results.len() <= commands.max_records());
        assert_eq!(state.execution_results.len(), 5);
    }
}
