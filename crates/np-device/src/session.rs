//! Device session abstraction.
//!
//! `SessionConnector` opens a `DeviceSession` from a `DeviceConfig`. Two impls:
//! - `SshConnector`: drives the system OpenSSH client (in `ssh.rs`)
//! - `MockConnector`: scripted replies for tests (in `mock.rs`)
//!
//! A session is used by exactly one caller at a time and must be closed on
//! every exit path.

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::SessionResult;
use crate::platform::DEFAULT_DEVICE_TYPE;

/// Connection parameters for one device.
#[derive(Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Platform identifier (e.g. "cisco_ios"), see `platform::lookup`.
    pub device_type: String,
    /// IP address or hostname.
    pub host: String,
    pub username: String,
    pub password: String,
    /// SSH port.
    pub port: u16,
    /// Connection and per-read timeout in seconds.
    pub timeout_secs: u64,
    /// Skip the settle delay after each prompt.
    pub fast_cli: bool,
    /// Directory for per-run session transcripts. None disables them.
    pub session_log_dir: Option<PathBuf>,
    /// Extra arguments passed to `ssh` (e.g. legacy key exchange options).
    pub ssh_args: Vec<String>,
}

impl DeviceConfig {
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            device_type: DEFAULT_DEVICE_TYPE.to_string(),
            host: host.into(),
            username: username.into(),
            password: password.into(),
            port: 22,
            timeout_secs: 60,
            fast_cli: true,
            session_log_dir: None,
            ssh_args: Vec::new(),
        }
    }

    pub fn with_device_type(mut self, device_type: impl Into<String>) -> Self {
        self.device_type = device_type.into();
        self
    }
}

// Keep the password out of logs.
impl fmt::Debug for DeviceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceConfig")
            .field("device_type", &self.device_type)
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"********")
            .field("port", &self.port)
            .field("timeout_secs", &self.timeout_secs)
            .field("fast_cli", &self.fast_cli)
            .field("session_log_dir", &self.session_log_dir)
            .field("ssh_args", &self.ssh_args)
            .finish()
    }
}

/// A live management session to one device.
#[async_trait]
pub trait DeviceSession: Send {
    /// Send one line in exec mode and return the cleaned response.
    async fn send_command(&mut self, command: &str) -> SessionResult<String>;

    /// Enter configuration mode, apply every line in order, leave
    /// configuration mode. Returns the batch transcript.
    async fn send_config_set(&mut self, commands: &[String]) -> SessionResult<String>;

    /// Persist the running configuration to non-volatile storage.
    async fn save_config(&mut self) -> SessionResult<String>;

    /// The command `save_config` sends (e.g. "write memory").
    fn save_command(&self) -> &str;

    /// Release the session. Safe to call more than once.
    async fn close(&mut self) -> SessionResult<()>;
}

/// Opens sessions to devices.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    async fn connect(&self, device: &DeviceConfig) -> SessionResult<Box<dyn DeviceSession>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_ssh_conventions() {
        let device = DeviceConfig::new("10.0.0.1", "admin", "secret");
        assert_eq!(device.device_type, "cisco_ios");
        assert_eq!(device.port, 22);
        assert_eq!(device.timeout_secs, 60);
        assert!(device.fast_cli);
        assert!(device.session_log_dir.is_none());
        assert!(device.ssh_args.is_empty());
    }

    #[test]
    fn debug_redacts_password() {
        let device = DeviceConfig::new("10.0.0.1", "admin", "hunter2");
        let printed = format!("{device:?}");
        assert!(printed.contains("10.0.0.1"));
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn with_device_type() {
        let device = DeviceConfig::new("sw1", "admin", "pw").with_device_type("arista_eos");
        assert_eq!(device.device_type, "arista_eos");
    }
}
