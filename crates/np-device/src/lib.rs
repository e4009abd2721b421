//! Device sessions for NetPilot.
//!
//! `SessionConnector` / `DeviceSession` are the seam the executor talks
//! through. `SshConnector` reaches real devices via the system OpenSSH
//! client; `MockConnector` serves scripted replies in tests.

pub mod askpass;
pub mod error;
pub mod mock;
pub mod platform;
pub mod prompt;
pub mod session;
pub mod ssh;

pub use error::{SessionError, SessionResult};
pub use mock::{MockConnector, MockReply, MockSession};
pub use platform::PlatformProfile;
pub use session::{DeviceConfig, DeviceSession, SessionConnector};
pub use ssh::{SshConnector, SshSession};
