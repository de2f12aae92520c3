//! Persistent node configuration with pluggable backends.
//!
//! This crate holds the configuration record a node keeps across restarts and
//! the [`ConfigStore`] seam the command processor mutates it through. Backends
//! are in-memory (tests, simulations) and a JSON file (host deployments).

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Stored data could not be interpreted
    #[error("Data corruption: {0}")]
    Corruption(String),
    /// Backend refused the operation
    #[error("Backend error: {0}")]
    Backend(String),
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Temperature alarm band, °C
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureThresholds {
    /// Alert below this temperature
    pub low: f32,
    /// Alert above this temperature
    pub high: f32,
}

/// Battery alarm levels, percent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatteryThresholds {
    /// Low-battery alert level
    pub low: f32,
    /// Critical alert level
    pub critical: f32,
}

/// LoRa radio parameters, applied at the next boot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadioParams {
    /// Carrier frequency, MHz
    pub frequency_mhz: f32,
    /// Spreading factor
    pub spreading_factor: u8,
    /// Transmit power, dBm
    pub tx_power_dbm: u8,
}

/// Everything a node persists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Node id, 1–254, unique in the network
    pub node_id: u8,
    /// Network id shared with the base station
    pub network_id: u16,
    /// Telemetry period in milliseconds
    pub telemetry_interval_ms: u32,
    /// Location label
    pub location: String,
    /// Zone label
    pub zone: String,
    /// Temperature alarm band
    pub temperature: TemperatureThresholds,
    /// Battery alarm levels
    pub battery: BatteryThresholds,
    /// Radio parameters
    pub radio: RadioParams,
    /// Participate in mesh routing
    pub mesh_enabled: bool,
    /// UTC offset in minutes
    pub tz_offset_minutes: i32,
    /// Unix epoch of the last time sync
    pub last_time_sync: u32,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: 1,
            network_id: 1,
            telemetry_interval_ms: 30_000,
            location: "Unknown".to_string(),
            zone: "default".to_string(),
            temperature: TemperatureThresholds {
                low: -20.0,
                high: 50.0,
            },
            battery: BatteryThresholds {
                low: 20.0,
                critical: 10.0,
            },
            radio: RadioParams {
                frequency_mhz: 915.0,
                spreading_factor: 10,
                tx_power_dbm: 20,
            },
            mesh_enabled: true,
            tz_offset_minutes: 0,
            last_time_sync: 0,
        }
    }
}

/// Access to the node's persisted configuration.
///
/// Mutate through [`config_mut`](ConfigStore::config_mut), then call
/// [`save`](ConfigStore::save) to make the change durable.
pub trait ConfigStore {
    /// Current in-memory configuration
    fn config(&self) -> &NodeConfig;

    /// Mutable in-memory configuration
    fn config_mut(&mut self) -> &mut NodeConfig;

    /// Persist the in-memory configuration
    fn save(&mut self) -> Result<(), StorageError>;

    /// Wipe persisted state, restore defaults and persist them
    fn factory_reset(&mut self) -> Result<(), StorageError>;
}

impl<S: ConfigStore + ?Sized> ConfigStore for Box<S> {
    fn config(&self) -> &NodeConfig {
        (**self).config()
    }

    fn config_mut(&mut self) -> &mut NodeConfig {
        (**self).config_mut()
    }

    fn save(&mut self) -> Result<(), StorageError> {
        (**self).save()
    }

    fn factory_reset(&mut self) -> Result<(), StorageError> {
        (**self).factory_reset()
    }
}

/// Storage backend selection
#[derive(Clone, Debug, Default)]
pub enum StoreMode {
    /// In-memory storage (dev/tests only)
    #[default]
    InMemory,
    /// JSON document on disk
    File {
        /// Path of the configuration file
        path: PathBuf,
    },
}

// Re-export backend implementations
pub use backend::file::FileConfigStore;
pub use backend::mem::MemoryConfigStore;

/// Open a configuration store for `mode`
pub fn open_store(mode: StoreMode) -> Result<Box<dyn ConfigStore + Send>, StorageError> {
    match mode {
        StoreMode::InMemory => Ok(Box::new(MemoryConfigStore::new())),
        StoreMode::File { path } => Ok(Box::new(FileConfigStore::open(path)?)),
    }
}
