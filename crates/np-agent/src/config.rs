//! NetPilot configuration, loadable from TOML with environment overrides.
//!
//! The core never reads the environment itself: binaries call
//! [`AgentConfig::load`] once at startup and hand the resolved
//! [`DeviceConfig`] / [`LlmConfig`] to the pipeline.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Context;
use np_device::DeviceConfig;
use np_device::platform::DEFAULT_DEVICE_TYPE;
use serde::Deserialize;

use crate::inference::LlmConfig;

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "netpilot.toml";

/// Append-only event log written next to the working directory by default.
pub const DEFAULT_LOG_FILE: &str = "network_automation.log";

/// A credential that never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(********)")
    }
}

/// Top-level configuration for the agent and the API server.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub device: DeviceSection,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[device]` table. Credentials are optional here so they can come from
/// the environment instead.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceSection {
    #[serde(default = "default_device_type")]
    pub device_type: String,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<Secret>,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_device_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_fast_cli")]
    pub fast_cli: bool,
    /// Directory for per-run session transcripts.
    #[serde(default)]
    pub session_log_dir: Option<PathBuf>,
    /// Extra `ssh` arguments, shell-quoted (e.g. "-o KexAlgorithms=+diffie-hellman-group14-sha1").
    #[serde(default)]
    pub ssh_options: Option<String>,
}

fn default_device_type() -> String {
    DEFAULT_DEVICE_TYPE.to_string()
}

fn default_port() -> u16 {
    22
}

fn default_device_timeout() -> u64 {
    60
}

fn default_fast_cli() -> bool {
    true
}

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            device_type: default_device_type(),
            host: None,
            username: None,
            password: None,
            port: default_port(),
            timeout_secs: default_device_timeout(),
            fast_cli: default_fast_cli(),
            session_log_dir: None,
            ssh_options: None,
        }
    }
}

/// `[logging]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log file to append to. An empty path disables the file layer.
    #[serde(default = "default_log_file")]
    pub file: PathBuf,
    /// Emit JSON lines instead of human-readable text.
    #[serde(default)]
    pub json: bool,
}

fn default_log_file() -> PathBuf {
    PathBuf::from(DEFAULT_LOG_FILE)
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: default_log_file(),
            json: false,
        }
    }
}

impl LoggingConfig {
    pub fn file_path(&self) -> Option<&Path> {
        if self.file.as_os_str().is_empty() {
            None
        } else {
            Some(&self.file)
        }
    }
}

impl AgentConfig {
    /// Load config from a TOML file path.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }

    /// Load from `path`, or from `netpilot.toml` when it exists, or defaults;
    /// then apply process environment overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_file(DEFAULT_CONFIG_FILE)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overlay environment settings. `lookup` maps a variable name to its
    /// value; empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("DEVICE_TYPE") {
            self.device.device_type = v;
        }
        if let Some(v) = get("DEVICE_HOST") {
            self.device.host = Some(v);
        }
        if let Some(v) = get("DEVICE_USERNAME") {
            self.device.username = Some(v);
        }
        if let Some(v) = get("DEVICE_PASSWORD") {
            self.device.password = Some(Secret::new(v));
        }
        if let Some(v) = get("OPENAI_API_KEY") {
            self.llm.api_key = Some(Secret::new(v));
        }
        if let Some(v) = get("NETPILOT_LLM_BACKEND") {
            self.llm.backend = v.parse().map_err(anyhow::Error::msg)?;
        }
        if let Some(v) = get("NETPILOT_LLM_MODEL") {
            self.llm.model = Some(v);
        }
        if let Some(v) = get("NETPILOT_LLM_URL") {
            self.llm.base_url = Some(v);
        }
        Ok(())
    }

    /// Resolve the device parameters. Fails naming every missing credential.
    pub fn device_config(&self) -> anyhow::Result<DeviceConfig> {
        let d = &self.device;
        let mut missing = Vec::new();
        if d.host.is_none() {
            missing.push("device.host (DEVICE_HOST)");
        }
        if d.username.is_none() {
            missing.push("device.username (DEVICE_USERNAME)");
        }
        if d.password.is_none() {
            missing.push("device.password (DEVICE_PASSWORD)");
        }
        let (Some(host), Some(username), Some(password)) = (&d.host, &d.username, &d.password)
        else {
            anyhow::bail!("missing device settings: {}", missing.join(", "));
        };

        let ssh_args = match &d.ssh_options {
            Some(opts) => shell_words::split(opts)
                .with_context(|| format!("invalid device.ssh_options: {opts}"))?,
            None => Vec::new(),
        };

        Ok(DeviceConfig {
            device_type: d.device_type.clone(),
            host: host.clone(),
            username: username.clone(),
            password: password.expose().to_string(),
            port: d.port,
            timeout_secs: d.timeout_secs,
            fast_cli: d.fast_cli,
            session_log_dir: d.session_log_dir.clone(),
            ssh_args,
        })
    }
}
