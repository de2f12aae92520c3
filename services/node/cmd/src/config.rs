//! Service configuration for the node simulator.
//!
//! Settings come from a YAML file, then `LSS_*` environment variables, then
//! command-line flags (applied by the caller).

use anyhow::{Context, Result};
use lss_command::FactoryResetMode;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Where the node keeps its persisted configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    /// Lost on process exit
    Memory,
    /// JSON file at `storage.path`
    File,
}

/// Storage settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Backend holding the node configuration
    pub mode: StorageKind,
    /// JSON document used by the file backend
    pub path: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            mode: StorageKind::File,
            path: PathBuf::from("./lssdata/node.json"),
        }
    }
}

/// UDP socket standing in for the LoRa medium
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioSettings {
    /// Local address frames are received on
    pub bind: SocketAddr,
    /// Addresses every transmitted frame is sent to
    pub peers: Vec<SocketAddr>,
}

impl Default for RadioSettings {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 47000)),
            peers: Vec::new(),
        }
    }
}

/// Simulated sensor attached to the node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SensorSpec {
    /// NTC thermistor reading a fixed ADC value
    Thermistor {
        /// ADC reading, 1-4094
        raw: i32,
    },
    /// Soil probe reading a fixed ADC value
    SoilMoisture {
        /// ADC reading
        raw: i32,
        /// Reading in dry soil; needs `wet` too, else the default calibration
        #[serde(default)]
        dry: Option<i32>,
        /// Reading in saturated soil
        #[serde(default)]
        wet: Option<i32>,
    },
    /// Constant value of any kind tag
    Fixed {
        /// Driver name shown in logs
        name: String,
        /// Telemetry value tag (0-13; others are sent as-is)
        kind: u8,
        /// Reported value
        value: f32,
    },
}

/// Node simulator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeServiceConfig {
    /// Provisioned node id, written to the store at start-up when set
    pub node_id: Option<u8>,
    /// Provisioned network id, written to the store at start-up when set
    pub network_id: Option<u16>,
    /// Configuration store settings
    pub storage: StorageSettings,
    /// Simulated radio medium
    pub radio: RadioSettings,
    /// Control loop cadence
    #[serde(with = "duration_text")]
    pub poll_interval: Duration,
    /// Broadcast the enrolment frame on every start
    pub announce: bool,
    /// Relay frames addressed to other nodes
    pub relay: bool,
    /// Whether a factory-reset command wipes at once or at restart
    pub factory_reset_mode: FactoryResetMode,
    /// Simulated battery voltage
    pub battery_mv: f32,
    /// Sensors read into each telemetry record, in order
    pub sensors: Vec<SensorSpec>,
}

impl Default for NodeServiceConfig {
    fn default() -> Self {
        Self {
            node_id: None,
            network_id: None,
            storage: StorageSettings::default(),
            radio: RadioSettings::default(),
            poll_interval: Duration::from_millis(50),
            announce: true,
            relay: true,
            factory_reset_mode: FactoryResetMode::default(),
            battery_mv: 3900.0,
            sensors: vec![
                SensorSpec::Thermistor { raw: 2048 },
                SensorSpec::SoilMoisture {
                    raw: 2500,
                    dry: None,
                    wet: None,
                },
            ],
        }
    }
}

/// Root of the YAML file; node settings live under `node:`
#[derive(Debug, Default, Deserialize)]
struct RootConfig {
    node: Option<NodeServiceConfig>,
}

impl NodeServiceConfig {
    /// Load configuration from file and environment variables.
    ///
    /// A missing file means defaults; a file that does not parse is an error.
    pub fn load_from_file<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let path = config_path.as_ref();
        let mut config = match std::fs::read_to_string(path) {
            Ok(content) => {
                let root: RootConfig = serde_yaml::from_str(&content)
                    .with_context(|| format!("Failed to parse config file {:?}", path))?;
                info!("Loaded configuration from {:?}", path);
                root.node.unwrap_or_default()
            }
            Err(_) => {
                warn!("Config file {:?} not found, using defaults", path);
                Self::default()
            }
        };

        config.apply_environment_overrides(|key| std::env::var(key).ok())?;

        info!(
            "Final node configuration: node_id={:?}, bind={}, peers={}, storage={:?}",
            config.node_id,
            config.radio.bind,
            config.radio.peers.len(),
            config.storage.mode
        );
        Ok(config)
    }

    /// Apply `LSS_*` overrides read through `lookup`
    fn apply_environment_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("LSS_NODE_ID") {
            let id = value.parse::<u8>().context("LSS_NODE_ID")?;
            self.node_id = Some(id);
            info!("Node ID overridden by environment: {}", id);
        }

        if let Some(value) = lookup("LSS_NETWORK_ID") {
            let id = value.parse::<u16>().context("LSS_NETWORK_ID")?;
            self.network_id = Some(id);
            info!("Network ID overridden by environment: {}", id);
        }

        if let Some(value) = lookup("LSS_BIND") {
            self.radio.bind = value.parse().context("LSS_BIND")?;
            info!("Bind address overridden by environment: {}", self.radio.bind);
        }

        if let Some(value) = lookup("LSS_PEERS") {
            self.radio.peers = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.parse().with_context(|| format!("LSS_PEERS entry {:?}", s)))
                .collect::<Result<_>>()?;
            info!("Peers overridden by environment: {:?}", self.radio.peers);
        }

        if let Some(value) = lookup("LSS_STORAGE_PATH") {
            self.storage.mode = StorageKind::File;
            self.storage.path = PathBuf::from(value);
            info!("Storage path overridden by environment: {:?}", self.storage.path);
        }

        if let Some(value) = lookup("LSS_POLL_INTERVAL") {
            self.poll_interval = humantime::parse_duration(&value).context("LSS_POLL_INTERVAL")?;
            info!("Poll interval overridden by environment: {:?}", self.poll_interval);
        }

        Ok(())
    }
}

/// `Duration` as a humantime string (`50ms`, `1s`)
mod duration_text {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}
