//! Device session error types.

use thiserror::Error;

/// Errors raised by a device session.
///
/// Split into two granularities: fatal errors end the session (nothing sent
/// afterwards can succeed), the rest concern a single command or batch.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("unsupported device type: {0}")]
    UnsupportedPlatform(String),

    #[error("session closed by device: {0}")]
    Disconnected(String),

    #[error("I/O error: {0}")]
    Io(String),

    /// The device never came back to a prompt after a timed-out command.
    #[error("device stopped responding: {0}")]
    Unresponsive(String),

    #[error("timed out after {timeout_secs}s waiting for device prompt")]
    Timeout { timeout_secs: u64 },

    #[error("device rejected '{command}': {output}")]
    CommandRejected { command: String, output: String },

    #[error("command '{command}' failed: {cause}")]
    Command { command: String, cause: String },
}

impl SessionError {
    /// Whether the session is unusable after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Connect(_)
                | Self::Auth(_)
                | Self::UnsupportedPlatform(_)
                | Self::Disconnected(_)
                | Self::Io(_)
                | Self::Unresponsive(_)
        )
    }
}

/// Convenience alias for session results.
pub type SessionResult<T> = Result<T, SessionError>;
