use std::fmt;

use serde::{Deserialize, Serialize};

/// Label used for the configuration batch record.
pub const CONFIG_BATCH_LABEL: &str = "Configuration Commands";

/// What an execution record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Show,
    Config,
    ConfigSave,
    Verify,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Show => "show",
            Self::Config => "config",
            Self::ConfigSave => "config_save",
            Self::Verify => "verify",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Success,
    Failed,
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// One attempted command, or one command batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Literal command, or a synthetic label for batch operations.
    pub command: String,
    /// Raw device output, or a synthetic error description.
    pub output: String,
    #[serde(rename = "type")]
    pub kind: RecordKind,
    pub status: RecordStatus,
    /// Underlying commands of a successful configuration batch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commands_executed: Option<Vec<String>>,
    /// Underlying commands of a failed configuration batch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commands_attempted: Option<Vec<String>>,
}

impl ExecutionRecord {
    pub fn succeeded(kind: RecordKind, command: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            output: output.into(),
            kind,
            status: RecordStatus::Success,
            commands_executed: None,
            commands_attempted: None,
        }
    }

    pub fn failed(kind: RecordKind, command: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            output: output.into(),
            kind,
            status: RecordStatus::Failed,
            commands_executed: None,
            commands_attempted: None,
        }
    }

    /// Record for a configuration batch that the device accepted.
    pub fn config_applied(output: impl Into<String>, commands: &[String]) -> Self {
        Self {
            commands_executed: Some(commands.to_vec()),
            ..Self::succeeded(RecordKind::Config, CONFIG_BATCH_LABEL, output)
        }
    }

    /// Record for a configuration batch that failed as a unit.
    pub fn config_rejected(output: impl Into<String>, commands: &[String]) -> Self {
        Self {
            commands_attempted: Some(commands.to_vec()),
            ..Self::failed(RecordKind::Config, CONFIG_BATCH_LABEL, output)
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RecordStatus::Success
    }

    /// Underlying batch commands, whichever outcome they had.
    pub fn batch_commands(&self) -> Option<&[String]> {
        self.commands_executed
            .as_deref()
            .or(self.commands_attempted.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_kind_serialization() {
        assert_eq!(
            serde_json::to_string(&RecordKind::ConfigSave).unwrap(),
            r#""config_save""#
        );
        assert_eq!(RecordKind::Verify.to_string(), "verify");
    }

    #[test]
    fn kind_serializes_as_type_field() {
        let rec = ExecutionRecord::succeeded(RecordKind::Show, "show version", "IOS XE 17.3");
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["type"], "show");
        assert_eq!(json["status"], "success");
        assert!(json.get("kind").is_none());
        assert!(json.get("commands_executed").is_none());
        assert!(json.get("commands_attempted").is_none());
    }

    #[test]
    fn config_applied_lists_executed_commands() {
        let cmds = vec!["interface Loopback1".to_string(), "no shutdown".to_string()];
        let rec = ExecutionRecord::config_applied("R1(config-if)#", &cmds);
        assert_eq!(rec.command, CONFIG_BATCH_LABEL);
        assert_eq!(rec.kind, RecordKind::Config);
        assert!(rec.is_success());
        assert_eq!(rec.commands_executed.as_deref(), Some(cmds.as_slice()));
        assert!(rec.commands_attempted.is_none());
        assert_eq!(rec.batch_commands(), Some(cmds.as_slice()));
    }

    #[test]
    fn config_rejected_lists_attempted_commands() {
        let cmds = vec!["interface Bogus0".to_string()];
        let rec = ExecutionRecord::config_rejected("Error during configuration: boom", &cmds);
        assert_eq!(rec.status, RecordStatus::Failed);
        assert!(rec.commands_executed.is_none());
        assert_eq!(rec.batch_commands(), Some(cmds.as_slice()));

        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["commands_attempted"][0], "interface Bogus0");
    }

    #[test]
    fn deserialize_without_batch_fields() {
        let json = r#"{"command": "write memory", "output": "[OK]", "type": "config_save", "status": "success"}"#;
        let rec: ExecutionRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.kind, RecordKind::ConfigSave);
        assert!(rec.batch_commands().is_none());
    }
}
