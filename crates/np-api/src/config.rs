//! API server configuration.

use std::path::PathBuf;

use anyhow::Context;

/// Top-level API server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Listen address (e.g., "0.0.0.0").
    pub host: String,
    /// Listen port.
    pub port: u16,
    /// Agent config file (`NETPILOT_CONFIG`). None falls back to
    /// `./netpilot.toml` when present.
    pub agent_config: Option<PathBuf>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl ApiConfig {
    /// Load config from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load config through `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();
        if let Some(host) = get("NETPILOT_API_HOST") {
            config.host = host;
        }
        if let Some(port) = get("NETPILOT_API_PORT") {
            config.port = port
                .trim()
                .parse()
                .with_context(|| format!("invalid NETPILOT_API_PORT: {port}"))?;
        }
        config.agent_config = get("NETPILOT_CONFIG").map(PathBuf::from);
        Ok(config)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            agent_config: None,
        }
    }
}
