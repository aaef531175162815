//! Node configuration file (TOML)
//!
//! Example:
//!
//! ```toml
//! protocol_settings = "/etc/halflife/settings.json"
//!
//! [host]
//! ip = "89.82.76.241"
//! port = 8106
//!
//! [network]
//! max_outbounds_count = 8
//! seeds = ["89.82.76.241:8106"]
//! synchronization_interval_in_seconds = 60
//!
//! [validator]
//! private_key = "..."
//!
//! [log]
//! level = "info"
//! ```

use halflife_core::{ProtocolSettings, SettingsError};
use halflife_crypto::CryptoError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unable to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("unable to parse configuration file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("unable to load protocol settings: {0}")]
    Settings(#[from] SettingsError),

    #[error("invalid validator private key: {0}")]
    PrivateKey(#[from] CryptoError),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// JSON protocol settings, the defaults are used when absent
    #[serde(default)]
    pub protocol_settings: Option<PathBuf>,

    #[serde(default)]
    pub host: HostConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub validator: ValidatorConfig,

    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub ip: String,
    pub port: u16,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            ip: "127.0.0.1".to_string(),
            port: 8106,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub max_outbounds_count: usize,
    /// Targets used while no other peer is known
    pub seeds: Vec<String>,
    pub synchronization_interval_in_seconds: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            max_outbounds_count: 8,
            seeds: Vec::new(),
            synchronization_interval_in_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Hex ed25519 seed, an ephemeral key is generated when absent
    pub private_key: Option<String>,
    /// Allowlist of the built-in humanity registry, open when absent
    pub registered_addresses: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl NodeConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: NodeConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.ip.trim().is_empty() {
            return Err(ConfigError::Invalid("host ip is empty".to_string()));
        }
        if self.network.synchronization_interval_in_seconds == 0 {
            return Err(ConfigError::Invalid(
                "synchronization interval must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Protocol settings from the configured file, or the defaults
    pub fn load_protocol_settings(&self) -> Result<ProtocolSettings, ConfigError> {
        match &self.protocol_settings {
            Some(path) => Ok(ProtocolSettings::load(path)?),
            None => Ok(ProtocolSettings::default()),
        }
    }

    pub fn synchronization_timer(&self) -> Duration {
        Duration::from_secs(self.network.synchronization_interval_in_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let file = write_config("");

        let config = NodeConfig::load(file.path()).unwrap();

        assert_eq!(config, NodeConfig::default());
        assert_eq!(config.host.port, 8106);
        assert_eq!(config.network.max_outbounds_count, 8);
        assert_eq!(config.log.level, "info");
        assert!(config.validator.private_key.is_none());
    }

    #[test]
    fn test_load_full_config() {
        let file = write_config(
            r#"
protocol_settings = "/etc/halflife/settings.json"

[host]
ip = "89.82.76.241"
port = 9000

[network]
max_outbounds_count = 3
seeds = ["10.0.0.1:8106", "10.0.0.2:8106"]
synchronization_interval_in_seconds = 30

[validator]
registered_addresses = ["0xa"]

[log]
level = "debug"
"#,
        );

        let config = NodeConfig::load(file.path()).unwrap();

        assert_eq!(
            config.protocol_settings,
            Some(PathBuf::from("/etc/halflife/settings.json"))
        );
        assert_eq!(config.host.ip, "89.82.76.241");
        assert_eq!(config.host.port, 9000);
        assert_eq!(config.network.max_outbounds_count, 3);
        assert_eq!(config.network.seeds.len(), 2);
        assert_eq!(config.synchronization_timer(), Duration::from_secs(30));
        assert_eq!(
            config.validator.registered_addresses,
            Some(vec!["0xa".to_string()])
        );
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn test_partial_table_keeps_other_defaults() {
        let file = write_config("[host]\nport = 9001\n");

        let config = NodeConfig::load(file.path()).unwrap();

        assert_eq!(config.host.ip, "127.0.0.1");
        assert_eq!(config.host.port, 9001);
    }

    #[test]
    fn test_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();

        let error = NodeConfig::load(dir.path().join("node.toml")).unwrap_err();

        assert!(matches!(error, ConfigError::Io(_)));
    }

    #[test]
    fn test_malformed_file_fails() {
        let file = write_config("[host]\nport = \"eighty\"\n");

        assert!(matches!(
            NodeConfig::load(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_zero_synchronization_interval_is_rejected() {
        let file = write_config("[network]\nsynchronization_interval_in_seconds = 0\n");

        assert!(matches!(
            NodeConfig::load(file.path()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_protocol_settings_default_when_absent() {
        let config = NodeConfig::default();

        assert_eq!(
            config.load_protocol_settings().unwrap(),
            ProtocolSettings::default()
        );
    }

    #[test]
    fn test_protocol_settings_loaded_from_file() {
        let settings = ProtocolSettings {
            genesis_amount: 42,
            ..Default::default()
        };
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&settings.to_bytes().unwrap()).unwrap();
        let config = NodeConfig {
            protocol_settings: Some(file.path().to_path_buf()),
            ..Default::default()
        };

        assert_eq!(config.load_protocol_settings().unwrap(), settings);
    }
}
