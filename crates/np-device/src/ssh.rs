//! OpenSSH-backed device sessions.
//!
//! Spawns the system `ssh` client with a forced remote TTY, then talks to the
//! device CLI over the child's stdin/stdout: write a line, read until the
//! next prompt. The child is spawned with `kill_on_drop`, so a session that
//! is dropped without `close()` still tears down the connection.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::time::Instant;

use crate::askpass;
use crate::error::{SessionError, SessionResult};
use crate::platform::{self, PlatformProfile};
use crate::prompt;
use crate::session::{DeviceConfig, DeviceSession, SessionConnector};

/// Extra wait after a prompt when `fast_cli` is off, to catch late output.
const SETTLE_DELAY: Duration = Duration::from_millis(200);

/// How long `close()` waits for `ssh` to exit before killing it.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Opens sessions by spawning the system `ssh` binary.
#[derive(Debug, Clone)]
pub struct SshConnector {
    program: String,
}

impl SshConnector {
    pub fn new() -> Self {
        Self {
            program: "ssh".to_string(),
        }
    }

    /// Use a specific `ssh` binary instead of the one on `PATH`.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for SshConnector {
    fn default() -> Self {
        Self::new()
    }
}

/// Arguments for `ssh`, everything except the program name.
pub fn build_ssh_args(device: &DeviceConfig) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-tt".into(),
        "-p".into(),
        device.port.to_string(),
        "-l".into(),
        device.username.clone(),
        "-o".into(),
        "StrictHostKeyChecking=accept-new".into(),
        "-o".into(),
        format!("ConnectTimeout={}", device.timeout_secs),
        "-o".into(),
        "NumberOfPasswordPrompts=1".into(),
        "-o".into(),
        "PreferredAuthentications=password,keyboard-interactive".into(),
        "-o".into(),
        "PubkeyAuthentication=no".into(),
        "-o".into(),
        "ServerAliveInterval=30".into(),
    ];
    args.extend(device.ssh_args.iter().cloned());
    args.push(device.host.clone());
    args
}

/// Transcript file name for a session started now.
pub fn session_log_path(dir: &Path) -> PathBuf {
    dir.join(format!(
        "session_log_{}.txt",
        Local::now().format("%Y%m%d_%H%M%S")
    ))
}

#[async_trait]
impl SessionConnector for SshConnector {
    async fn connect(&self, device: &DeviceConfig) -> SessionResult<Box<dyn DeviceSession>> {
        let profile = platform::lookup(&device.device_type)
            .ok_or_else(|| SessionError::UnsupportedPlatform(device.device_type.clone()))?;

        let mut cmd = Command::new(&self.program);
        cmd.args(build_ssh_args(device))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        askpass::apply(&mut cmd, &device.password).await?;

        tracing::debug!(
            host = %device.host,
            port = device.port,
            device_type = profile.device_type,
            "spawning ssh"
        );
        let mut child = cmd
            .spawn()
            .map_err(|e| SessionError::Connect(format!("{}: {e}", self.program)))?;

        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            return Err(SessionError::Connect("ssh stdio not captured".into()));
        };

        let transcript = match &device.session_log_dir {
            Some(dir) => open_transcript(dir).await,
            None => None,
        };

        let mut session = SshSession {
            child,
            stdin,
            stdout,
            stderr,
            profile,
            read_timeout: Duration::from_secs(device.timeout_secs),
            fast_cli: device.fast_cli,
            transcript,
            decoder: Utf8Decoder::default(),
            desynced: false,
            closed: false,
        };

        if let Err(e) = session.login().await {
            // Login failed; reap the child before reporting.
            let _ = session.close().await;
            return Err(e);
        }

        tracing::info!(
            host = %device.host,
            device_type = profile.device_type,
            "device session established"
        );
        Ok(Box::new(session))
    }
}

async fn open_transcript(dir: &Path) -> Option<File> {
    if let Err(e) = tokio::fs::create_dir_all(dir).await {
        tracing::warn!(dir = %dir.display(), error = %e, "cannot create session log directory");
        return None;
    }
    let path = session_log_path(dir);
    match tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .await
    {
        Ok(file) => {
            tracing::info!(path = %path.display(), "session transcript enabled");
            Some(file)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot open session log");
            None
        }
    }
}

/// Incremental UTF-8 decoding across reads.
///
/// A multibyte character split between two reads is held back until the
/// rest of it arrives. Invalid sequences become U+FFFD.
#[derive(Debug, Default)]
struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    return out;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + bad);
                        }
                        // Incomplete tail: wait for the next read.
                        None => {
                            self.pending.drain(..valid);
                            return out;
                        }
                    }
                }
            }
        }
    }
}

/// A device CLI reached through an `ssh` child process.
pub struct SshSession {
    child: Child,
    stdin: ChildStdin,
    stdout: ChildStdout,
    stderr: ChildStderr,
    profile: &'static PlatformProfile,
    read_timeout: Duration,
    fast_cli: bool,
    transcript: Option<File>,
    decoder: Utf8Decoder,
    /// Set when a read timed out; the device may still send that output.
    desynced: bool,
    closed: bool,
}

impl SshSession {
    /// Wait for the first prompt and prepare the terminal.
    async fn login(&mut self) -> SessionResult<()> {
        match self.read_until_prompt(false).await {
            Ok(_) => {}
            Err(SessionError::Disconnected(_)) => return Err(self.login_failure().await),
            Err(SessionError::Timeout { timeout_secs }) => {
                return Err(SessionError::Connect(format!(
                    "no CLI prompt within {timeout_secs}s"
                )));
            }
            Err(e) => return Err(e),
        }

        for setup in self.profile.session_setup {
            self.write_line(setup).await?;
            self.read_until_prompt(false).await?;
        }
        Ok(())
    }

    /// Classify why `ssh` exited during login from what it printed on stderr.
    async fn login_failure(&mut self) -> SessionError {
        let mut stderr = String::new();
        let _ = tokio::time::timeout(
            Duration::from_millis(500),
            self.stderr.read_to_string(&mut stderr),
        )
        .await;
        let detail = stderr.trim().to_string();

        if detail.contains("Permission denied") || detail.contains("Authentication failed") {
            SessionError::Auth(detail)
        } else if detail.is_empty() {
            SessionError::Connect("ssh exited before a CLI prompt appeared".into())
        } else {
            SessionError::Connect(detail)
        }
    }

    async fn write_line(&mut self, line: &str) -> SessionResult<()> {
        let data = format!("{line}\n");
        self.stdin
            .write_all(data.as_bytes())
            .await
            .map_err(io_error)?;
        self.stdin.flush().await.map_err(io_error)?;
        Ok(())
    }

    /// One read from the device, or `None` if nothing arrived within `wait`.
    async fn read_chunk(&mut self, wait: Duration) -> SessionResult<Option<String>> {
        let mut buf = [0u8; 4096];
        let n = match tokio::time::timeout(wait, self.stdout.read(&mut buf)).await {
            Err(_) => return Ok(None),
            Ok(Err(e)) => return Err(SessionError::Io(e.to_string())),
            Ok(Ok(0)) => {
                return Err(SessionError::Disconnected("ssh connection closed".into()));
            }
            Ok(Ok(n)) => n,
        };
        let text = self.decoder.decode(&buf[..n]);
        self.log_transcript(&text).await;
        Ok(Some(text))
    }

    /// Read until the device shows a prompt, returning everything read.
    ///
    /// With `answer_confirm`, confirmation questions (`[confirm]`) are
    /// answered with an empty line and reading continues.
    async fn read_until_prompt(&mut self, answer_confirm: bool) -> SessionResult<String> {
        let deadline = Instant::now() + self.read_timeout;
        let mut collected = String::new();

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(self.timed_out());
            }
            let Some(text) = self.read_chunk(remaining).await? else {
                return Err(self.timed_out());
            };
            collected.push_str(&text);

            let text = prompt::normalize(&collected);
            if answer_confirm && prompt::needs_confirmation(&text) {
                self.write_line("").await?;
                continue;
            }
            if prompt::trailing_prompt(&text).is_none() {
                continue;
            }
            if self.fast_cli {
                return Ok(collected);
            }

            // Slow mode: a prompt-looking line followed by more output was not
            // the real prompt.
            match self.read_chunk(SETTLE_DELAY).await {
                Ok(Some(more)) => collected.push_str(&more),
                _ => return Ok(collected),
            }
        }
    }

    /// Read to a prompt, then keep reading until the device goes quiet.
    async fn drain_to_prompt(&mut self) -> SessionResult<String> {
        let mut collected = self.read_until_prompt(false).await?;
        while let Some(more) = self.read_chunk(SETTLE_DELAY).await? {
            collected.push_str(&more);
        }
        Ok(collected)
    }

    /// Bring the session back to a fresh prompt after a timed-out read.
    ///
    /// Late output of the timed-out command is discarded, and a device left
    /// in configuration mode is taken back to exec mode.
    async fn resync(&mut self) -> SessionResult<()> {
        if !self.desynced {
            return Ok(());
        }
        tracing::warn!(
            device_type = self.profile.device_type,
            "discarding late output after timeout"
        );

        self.write_line("").await?;
        let text = prompt::normalize(&self.drain_to_prompt().await.map_err(stalled)?);
        let in_config = match prompt::trailing_prompt(&text) {
            Some(current) => prompt::is_config_prompt(current),
            None => {
                return Err(SessionError::Unresponsive(
                    "output did not end at a prompt".into(),
                ));
            }
        };

        if in_config {
            let exit = self.profile.config_exit;
            self.write_line(exit).await?;
            self.drain_to_prompt().await.map_err(stalled)?;
        }
        self.desynced = false;
        Ok(())
    }

    async fn log_transcript(&mut self, text: &str) {
        if let Some(file) = self.transcript.as_mut() {
            if let Err(e) = file.write_all(text.as_bytes()).await {
                tracing::warn!(error = %e, "session log write failed, disabling transcript");
                self.transcript = None;
            }
        }
    }

    fn timed_out(&mut self) -> SessionError {
        self.desynced = true;
        SessionError::Timeout {
            timeout_secs: self.read_timeout.as_secs(),
        }
    }

    /// Send each configuration line, stopping at the first rejected one.
    async fn apply_config_lines(
        &mut self,
        commands: &[String],
        transcript: &mut String,
    ) -> SessionResult<()> {
        for command in commands {
            self.write_line(command).await?;
            let raw = self.read_until_prompt(false).await?;
            transcript.push_str(&prompt::normalize(&raw));

            let response = prompt::clean_output(&raw, command);
            if let Some(line) = prompt::detect_error(&response) {
                return Err(SessionError::CommandRejected {
                    command: command.clone(),
                    output: line.to_string(),
                });
            }
        }
        Ok(())
    }
}

fn io_error(e: std::io::Error) -> SessionError {
    if e.kind() == std::io::ErrorKind::BrokenPipe {
        SessionError::Disconnected("ssh stdin closed".into())
    } else {
        SessionError::Io(e.to_string())
    }
}

/// A timeout while resynchronizing means the device is gone for good.
fn stalled(e: SessionError) -> SessionError {
    match e {
        SessionError::Timeout { timeout_secs } => SessionError::Unresponsive(format!(
            "no prompt within {timeout_secs}s after a timed-out command"
        )),
        other => other,
    }
}

#[async_trait]
impl DeviceSession for SshSession {
    async fn send_command(&mut self, command: &str) -> SessionResult<String> {
        self.resync().await?;
        self.write_line(command).await?;
        let raw = self.read_until_prompt(false).await?;
        let output = prompt::clean_output(&raw, command);

        if let Some(line) = prompt::detect_error(&output) {
            return Err(SessionError::CommandRejected {
                command: command.to_string(),
                output: line.to_string(),
            });
        }
        Ok(output)
    }

    async fn send_config_set(&mut self, commands: &[String]) -> SessionResult<String> {
        self.resync().await?;
        let enter = self.profile.config_enter;
        let exit = self.profile.config_exit;
        let mut transcript = String::new();

        self.write_line(enter).await?;
        let raw = self.read_until_prompt(false).await?;
        let text = prompt::normalize(&raw);
        transcript.push_str(&text);
        if !prompt::trailing_prompt(&text).is_some_and(prompt::is_config_prompt) {
            return Err(SessionError::Command {
                command: enter.to_string(),
                cause: "device did not enter configuration mode".into(),
            });
        }

        match self.apply_config_lines(commands, &mut transcript).await {
            Err(e) if e.is_fatal() => Err(e),
            applied => {
                // Leave configuration mode even when a line was rejected.
                // After a timeout, resync does that once the device answers.
                if self.desynced {
                    self.resync().await?;
                } else {
                    self.write_line(exit).await?;
                    let raw = self.read_until_prompt(false).await?;
                    transcript.push_str(&prompt::normalize(&raw));
                }

                applied.map(|()| transcript.trim_end().to_string())
            }
        }
    }

    async fn save_config(&mut self) -> SessionResult<String> {
        self.resync().await?;
        let command = self.profile.save_command;
        self.write_line(command).await?;
        let raw = self.read_until_prompt(true).await?;
        let output = prompt::clean_output(&raw, command);

        if let Some(line) = prompt::detect_error(&output) {
            return Err(SessionError::CommandRejected {
                command: command.to_string(),
                output: line.to_string(),
            });
        }
        Ok(output)
    }

    fn save_command(&self) -> &str {
        self.profile.save_command
    }

    async fn close(&mut self) -> SessionResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        // Best effort: the device may already be gone.
        let _ = self.write_line("exit").await;

        if let Some(file) = self.transcript.as_mut() {
            let _ = file.flush().await;
        }

        match tokio::time::timeout(CLOSE_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(%status, "ssh exited");
                Ok(())
            }
            Ok(Err(e)) => Err(SessionError::Io(e.to_string())),
            Err(_) => {
                tracing::debug!("ssh still running after exit, killing");
                self.child
                    .kill()
                    .await
                    .map_err(|e| SessionError::Io(e.to_string()))
            }
        }
    }
}
