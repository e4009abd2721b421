//! Mock device sessions for testing.
//!
//! Supports scripted per-command replies, failure injection at every level
//! (connect, command, config batch, save), and recording of everything sent.
//! All tests use this instead of a real device so the suite runs anywhere.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{SessionError, SessionResult};
use crate::platform;
use crate::session::{DeviceConfig, DeviceSession, SessionConnector};

/// Scripted reply to one command or batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    /// Device answered normally with this text.
    Output(String),
    /// Device printed an error marker (command-level failure).
    Reject(String),
    /// Session-level problem tied to this command (command-level failure).
    Fail(String),
    /// Connection drops while handling this command (fatal).
    Disconnect,
}

impl MockReply {
    fn into_result(self, command: &str) -> SessionResult<String> {
        match self {
            MockReply::Output(text) => Ok(text),
            MockReply::Reject(output) => Err(SessionError::CommandRejected {
                command: command.to_string(),
                output,
            }),
            MockReply::Fail(cause) => Err(SessionError::Command {
                command: command.to_string(),
                cause,
            }),
            MockReply::Disconnect => Err(SessionError::Disconnected(
                "connection reset by peer".into(),
            )),
        }
    }
}

/// How `connect` behaves.
#[derive(Debug, Clone)]
enum ConnectBehavior {
    Accept,
    Refuse(String),
    DenyAuth(String),
}

#[derive(Debug)]
struct Script {
    replies: HashMap<String, MockReply>,
    config_reply: Option<MockReply>,
    save_reply: MockReply,
    connect: ConnectBehavior,
    sent: Vec<String>,
    connects: usize,
    closes: usize,
}

/// Connector handing out scripted sessions that share one recording.
#[derive(Debug, Clone)]
pub struct MockConnector {
    script: Arc<Mutex<Script>>,
}

impl MockConnector {
    /// Accepts connections; unknown commands return empty output.
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                replies: HashMap::new(),
                config_reply: None,
                save_reply: MockReply::Output("Building configuration...\n[OK]".into()),
                connect: ConnectBehavior::Accept,
                sent: Vec::new(),
                connects: 0,
                closes: 0,
            })),
        }
    }

    /// Reply to `command` with `output`.
    pub fn with_output(self, command: &str, output: &str) -> Self {
        self.with_reply(command, MockReply::Output(output.to_string()))
    }

    pub fn with_reply(self, command: &str, reply: MockReply) -> Self {
        self.script
            .lock()
            .unwrap()
            .replies
            .insert(command.to_string(), reply);
        self
    }

    /// Reply to every configuration batch with `reply`.
    ///
    /// Without one, batches succeed with an echo of the applied lines.
    pub fn with_config_reply(self, reply: MockReply) -> Self {
        self.script.lock().unwrap().config_reply = Some(reply);
        self
    }

    pub fn with_save_reply(self, reply: MockReply) -> Self {
        self.script.lock().unwrap().save_reply = reply;
        self
    }

    /// Refuse every connection (e.g. host unreachable).
    pub fn refusing(self, reason: &str) -> Self {
        self.script.lock().unwrap().connect = ConnectBehavior::Refuse(reason.to_string());
        self
    }

    /// Reject credentials on every connection.
    pub fn denying_auth(self, reason: &str) -> Self {
        self.script.lock().unwrap().connect = ConnectBehavior::DenyAuth(reason.to_string());
        self
    }

    /// Every line sent across all sessions, in order. Config batches appear
    /// as their individual lines wrapped in the platform's enter/exit
    /// commands; saves appear as the save command.
    pub fn sent(&self) -> Vec<String> {
        self.script.lock().unwrap().sent.clone()
    }

    pub fn connect_count(&self) -> usize {
        self.script.lock().unwrap().connects
    }

    pub fn close_count(&self) -> usize {
        self.script.lock().unwrap().closes
    }
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionConnector for MockConnector {
    async fn connect(&self, device: &DeviceConfig) -> SessionResult<Box<dyn DeviceSession>> {
        let profile = platform::lookup(&device.device_type)
            .ok_or_else(|| SessionError::UnsupportedPlatform(device.device_type.clone()))?;

        let mut script = self.script.lock().unwrap();
        script.connects += 1;
        match &script.connect {
            ConnectBehavior::Accept => {}
            ConnectBehavior::Refuse(reason) => {
                return Err(SessionError::Connect(format!("{}: {reason}", device.host)));
            }
            ConnectBehavior::DenyAuth(reason) => {
                return Err(SessionError::Auth(reason.clone()));
            }
        }

        Ok(Box::new(MockSession {
            script: Arc::clone(&self.script),
            config_enter: profile.config_enter,
            config_exit: profile.config_exit,
            save_command: profile.save_command,
            disconnected: false,
            closed: false,
        }))
    }
}

/// Session handed out by `MockConnector`.
pub struct MockSession {
    script: Arc<Mutex<Script>>,
    config_enter: &'static str,
    config_exit: &'static str,
    save_command: &'static str,
    disconnected: bool,
    closed: bool,
}

impl MockSession {
    fn ensure_connected(&self) -> SessionResult<()> {
        if self.disconnected || self.closed {
            return Err(SessionError::Disconnected("session is not open".into()));
        }
        Ok(())
    }

    fn finish(&mut self, result: SessionResult<String>) -> SessionResult<String> {
        if matches!(result, Err(SessionError::Disconnected(_))) {
            self.disconnected = true;
        }
        result
    }
}

#[async_trait]
impl DeviceSession for MockSession {
    async fn send_command(&mut self, command: &str) -> SessionResult<String> {
        self.ensure_connected()?;
        let reply = {
            let mut script = self.script.lock().unwrap();
            script.sent.push(command.to_string());
            script
                .replies
                .get(command)
                .cloned()
                .unwrap_or(MockReply::Output(String::new()))
        };
        let result = reply.into_result(command);
        self.finish(result)
    }

    async fn send_config_set(&mut self, commands: &[String]) -> SessionResult<String> {
        self.ensure_connected()?;
        let reply = {
            let mut script = self.script.lock().unwrap();
            script.sent.push(self.config_enter.to_string());
            script.sent.extend(commands.iter().cloned());
            script.sent.push(self.config_exit.to_string());
            script.config_reply.clone()
        };

        let result = match reply {
            Some(reply) => reply.into_result(self.config_enter),
            None => {
                let mut transcript = format!("{}\n", self.config_enter);
                for command in commands {
                    transcript.push_str(command);
                    transcript.push('\n');
                }
                transcript.push_str(self.config_exit);
                Ok(transcript)
            }
        };
        self.finish(result)
    }

    async fn save_config(&mut self) -> SessionResult<String> {
        self.ensure_connected()?;
        let reply = {
            let mut script = self.script.lock().unwrap();
            script.sent.push(self.save_command.to_string());
            script.save_reply.clone()
        };
        let result = reply.into_result(self.save_command);
        self.finish(result)
    }

    fn save_command(&self) -> &str {
        self.save_command
    }

    async fn close(&mut self) -> SessionResult<()> {
        if !self.closed {
            self.closed = true;
            self.script.lock().unwrap().closes += 1;
        }
        Ok(())
    }
}
