//! Command processor: validate, apply, persist, acknowledge

use lss_routing::{Clock, MeshRouter};
use lss_storage::ConfigStore;
use lss_wire::{build_ack, AckKind, AckRecord, CommandRecord, COMMAND_RECORD_SIZE};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::CommandError;
use crate::request::NodeCommand;

/// Anything whose mesh participation can be switched on and off
pub trait MeshSwitch {
    /// Current mesh state
    fn mesh_enabled(&self) -> bool;

    /// Turn mesh participation on or off
    fn set_mesh_enabled(&mut self, enabled: bool);
}

impl<C: Clock> MeshSwitch for MeshRouter<C> {
    fn mesh_enabled(&self) -> bool {
        self.is_enabled()
    }

    fn set_mesh_enabled(&mut self, enabled: bool) {
        self.set_enabled(enabled);
    }
}

/// Order of operations for a factory reset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactoryResetMode {
    /// Ack first; the caller wipes persisted config and then restarts.
    /// A crash between ack and wipe leaves the old configuration.
    #[default]
    DeferredToRestart,
    /// Reset the configuration in place, then ack; no restart.
    /// A crash after the wipe leaves defaults.
    Immediate,
}

/// Process-level effect the caller must perform after sending the ack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SystemAction {
    /// Restart the node
    Restart,
    /// Wipe persisted configuration, then restart
    FactoryResetAndRestart,
}

/// Result of handling one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Reply to transmit
    pub ack: AckRecord,
    /// Effect to perform once the reply is out
    pub action: Option<SystemAction>,
}

impl CommandOutcome {
    /// Encoded reply
    pub fn ack_bytes(&self) -> [u8; COMMAND_RECORD_SIZE] {
        build_ack(
            self.ack.kind,
            self.ack.responder_id,
            self.ack.sequence,
            self.ack.status,
        )
    }

    /// Whether the command was applied
    pub fn is_success(&self) -> bool {
        self.ack.is_success()
    }
}

/// Validates commands and applies them to the node configuration
#[derive(Debug, Clone, Default)]
pub struct CommandProcessor {
    reset_mode: FactoryResetMode,
}

impl CommandProcessor {
    /// Create a processor using `reset_mode` for factory resets
    pub fn new(reset_mode: FactoryResetMode) -> Self {
        Self { reset_mode }
    }

    /// Configured factory-reset order
    pub fn reset_mode(&self) -> FactoryResetMode {
        self.reset_mode
    }

    /// Handle one decoded command.
    ///
    /// Always produces exactly one ack or nack echoing the command sequence.
    /// A rejected command, or one whose save fails, leaves the configuration
    /// as it was.
    pub fn handle_command<S, M>(
        &self,
        command: &CommandRecord,
        store: &mut S,
        mesh: &mut M,
    ) -> CommandOutcome
    where
        S: ConfigStore + ?Sized,
        M: MeshSwitch + ?Sized,
    {
        // the responder id is read before any reset can change it
        let node_id = store.config().node_id;
        let sequence = command.sequence;

        match self.execute(command, store, mesh) {
            Ok(action) => {
                debug!(code = command.code, sequence, "Command applied");
                CommandOutcome {
                    ack: AckRecord::ok(node_id, sequence),
                    action,
                }
            }
            Err(e) => {
                warn!(code = command.code, sequence, "Command rejected: {}", e);
                CommandOutcome {
                    ack: AckRecord::failed(node_id, sequence),
                    action: None,
                }
            }
        }
    }

    fn execute<S, M>(
        &self,
        record: &CommandRecord,
        store: &mut S,
        mesh: &mut M,
    ) -> Result<Option<SystemAction>, CommandError>
    where
        S: ConfigStore + ?Sized,
        M: MeshSwitch + ?Sized,
    {
        let command = NodeCommand::parse(record)?;
        let snapshot = store.config().clone();
        let mesh_before = mesh.mesh_enabled();

        let config = store.config_mut();
        match command {
            NodeCommand::Ping | NodeCommand::GetConfig => return Ok(None),
            NodeCommand::Restart => return Ok(Some(SystemAction::Restart)),
            NodeCommand::FactoryReset => return self.factory_reset(store),
            NodeCommand::SetInterval(ms) => {
                info!(interval_ms = ms, "Telemetry interval updated");
                config.telemetry_interval_ms = ms;
            }
            NodeCommand::SetLocation { location, zone } => {
                info!(%location, zone = ?zone, "Location updated");
                config.location = location;
                if let Some(zone) = zone {
                    config.zone = zone;
                }
            }
            NodeCommand::SetTempThresholds(thresholds) => {
                info!(low = thresholds.low, high = thresholds.high, "Temperature thresholds updated");
                config.temperature = thresholds;
            }
            NodeCommand::SetBatteryThresholds(thresholds) => {
                info!(
                    low = thresholds.low,
                    critical = thresholds.critical,
                    "Battery thresholds updated"
                );
                config.battery = thresholds;
            }
            NodeCommand::SetMesh(enabled) => {
                config.mesh_enabled = enabled;
                mesh.set_mesh_enabled(enabled);
            }
            NodeCommand::SetLoraParams(radio) => {
                info!(
                    frequency_mhz = radio.frequency_mhz,
                    spreading_factor = radio.spreading_factor,
                    tx_power_dbm = radio.tx_power_dbm,
                    "Radio parameters updated, effective next boot"
                );
                config.radio = radio;
            }
            NodeCommand::TimeSync {
                epoch,
                tz_offset_minutes,
            } => {
                info!(epoch, tz_offset_minutes, "Clock synchronised");
                config.last_time_sync = epoch;
                config.tz_offset_minutes = tz_offset_minutes as i32;
            }
        }

        if let Err(e) = store.save() {
            *store.config_mut() = snapshot;
            mesh.set_mesh_enabled(mesh_before);
            return Err(e.into());
        }
        Ok(None)
    }

    fn factory_reset<S>(&self, store: &mut S) -> Result<Option<SystemAction>, CommandError>
    where
        S: ConfigStore + ?Sized,
    {
        match self.reset_mode {
            FactoryResetMode::DeferredToRestart => {
                info!("Factory reset acknowledged, deferred to restart");
                Ok(Some(SystemAction::FactoryResetAndRestart))
            }
            FactoryResetMode::Immediate => {
                info!("Factory reset applied in place");
                store.factory_reset()?;
                Ok(None)
            }
        }
    }
}
