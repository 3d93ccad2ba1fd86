//! Client configuration

use crate::correlator::ConfirmationMode;
use anyhow::Result;
use hidguard_transport::DEFAULT_ENDPOINT;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Client configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientConfig {
    /// Gatekeeper connection
    #[serde(default)]
    pub server: ServerConfig,

    /// Local identity and whitelist
    #[serde(default)]
    pub client: IdentityConfig,

    /// Request lifecycle tracking
    #[serde(default)]
    pub correlator: CorrelatorConfig,
}

impl ClientConfig {
    /// Load configuration from file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: ClientConfig = toml::from_str(content)?;
        Ok(config)
    }
}

/// Gatekeeper connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// WebSocket endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Connection timeout (seconds)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

/// Local identity configuration
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    /// Process whose device access this client decides; defaults to our own
    #[serde(default)]
    pub process_id: Option<u32>,

    /// Initial whitelist
    #[serde(default)]
    pub hardware_ids: Vec<String>,

    /// Ask the gatekeeper to remember decisions for the device attachment
    #[serde(default = "default_true")]
    pub permanent: bool,
}

fn default_true() -> bool {
    true
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            process_id: None,
            hardware_ids: Vec::new(),
            permanent: default_true(),
        }
    }
}

impl IdentityConfig {
    pub fn process_id(&self) -> u32 {
        self.process_id.unwrap_or_else(std::process::id)
    }
}

/// Correlator configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CorrelatorConfig {
    /// Which requests a confirmation may update
    #[serde(default)]
    pub confirmation: ConfirmationMode,

    /// Evict finished requests after this many seconds (0 keeps them forever)
    #[serde(default)]
    pub retention_secs: u64,

    /// Eviction sweep interval (seconds)
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_sweep_interval() -> u64 {
    60
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            confirmation: ConfirmationMode::default(),
            retention_secs: 0,
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl CorrelatorConfig {
    pub fn retention(&self) -> Option<Duration> {
        (self.retention_secs > 0).then(|| Duration::from_secs(self.retention_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.server.endpoint, "ws://127.0.0.1:22408");
        assert_eq!(config.server.connect_timeout, 10);
        assert!(config.client.permanent);
        assert!(config.client.hardware_ids.is_empty());
        assert_eq!(config.client.process_id(), std::process::id());
        assert_eq!(config.correlator.confirmation, ConfirmationMode::UntrackedOnly);
        assert_eq!(config.correlator.retention(), None);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = ClientConfig::parse("").unwrap();
        assert_eq!(config.server.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.correlator.sweep_interval_secs, 60);
    }

    #[test]
    fn test_parse_full() {
        let config = ClientConfig::parse(
            r#"
[server]
endpoint = "ws://10.0.0.5:9000"
connect_timeout = 3

[client]
process_id = 1234
hardware_ids = ["HID\\VID_054C&PID_05C4", "VID_1_PID_1"]
permanent = false

[correlator]
confirmation = "tracked"
retention_secs = 600
"#,
        )
        .unwrap();

        assert_eq!(config.server.endpoint, "ws://10.0.0.5:9000");
        assert_eq!(config.server.connect_timeout, 3);
        assert_eq!(config.client.process_id(), 1234);
        assert_eq!(config.client.hardware_ids[0], "HID\\VID_054C&PID_05C4");
        assert!(!config.client.permanent);
        assert_eq!(config.correlator.confirmation, ConfirmationMode::Tracked);
        assert_eq!(config.correlator.retention(), Some(Duration::from_secs(600)));
    }

    #[test]
    fn test_unknown_confirmation_mode() {
        let result = ClientConfig::parse("[correlator]\nconfirmation = \"always\"\n");
        assert!(result.is_err());
    }
}
