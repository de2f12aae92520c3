//! LSS sensor node simulator.
//!
//! Runs one node's control loop on a host, with a UDP socket standing in for
//! the LoRa medium. Several simulators pointed at each other form a mesh.

use anyhow::{bail, Context};
use clap::Parser;
use lss_command::SystemAction;
use lss_routing::MonotonicClock;
use lss_runtime::{
    FixedBattery, FixedInput, FixedSensor, Node, QueueRadio, RadioFlags, Sensor,
    SoilMoistureSensor, TelemetryAssembler, ThermistorSensor,
};
use lss_storage::{open_store, ConfigStore, StoreMode};
use lss_wire::{SensorValue, ValueKind, BROADCAST_ID};
use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};
use tokio::time::MissedTickBehavior;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[macro_use]
mod logging;
mod config;
mod link;

use config::{NodeServiceConfig, SensorSpec, StorageKind};
use link::UdpLink;
use logging::LssLogFormatter;

type SimNode = Node<Box<dyn ConfigStore + Send>, QueueRadio, MonotonicClock>;

/// LSS sensor node simulator
#[derive(Parser, Debug)]
#[command(name = "lss-node", version, about = "LSS sensor node simulator over UDP")]
struct Args {
    /// Configuration file path
    #[arg(long, default_value = "lss-node.yaml")]
    config: PathBuf,

    /// Node id to provision (1-254)
    #[arg(long)]
    node_id: Option<u8>,

    /// Network id to provision
    #[arg(long)]
    network_id: Option<u16>,

    /// Local UDP address, e.g. 127.0.0.1:47005
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Peer UDP address every frame is sent to (repeatable)
    #[arg(long)]
    peer: Vec<SocketAddr>,

    /// Storage mode: memory, file
    #[arg(long)]
    storage_mode: Option<String>,

    /// Configuration file for file storage
    #[arg(long)]
    storage_path: Option<PathBuf>,

    /// Control loop cadence, e.g. 50ms
    #[arg(long)]
    poll_interval: Option<humantime::Duration>,

    /// Do not broadcast the enrolment frame at start-up
    #[arg(long)]
    no_announce: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Disable ANSI colours in log output
    #[arg(long)]
    no_color: bool,
}

impl Args {
    /// Command-line flags override file and environment settings
    fn apply(&self, config: &mut NodeServiceConfig) -> anyhow::Result<()> {
        if let Some(id) = self.node_id {
            config.node_id = Some(id);
        }
        if let Some(id) = self.network_id {
            config.network_id = Some(id);
        }
        if let Some(bind) = self.bind {
            config.radio.bind = bind;
        }
        if !self.peer.is_empty() {
            config.radio.peers = self.peer.clone();
        }
        if let Some(mode) = &self.storage_mode {
            config.storage.mode = match mode.as_str() {
                "memory" => StorageKind::Memory,
                "file" => StorageKind::File,
                _ => bail!("Invalid storage mode: {}. Use 'memory' or 'file'", mode),
            };
        }
        if let Some(path) = &self.storage_path {
            config.storage.path = path.clone();
        }
        if let Some(interval) = self.poll_interval {
            config.poll_interval = Duration::from(interval);
        }
        if self.no_announce {
            config.announce = false;
        }
        Ok(())
    }
}

/// Why a node's run loop returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopExit {
    Shutdown,
    Restart,
    FactoryReset,
}

impl From<SystemAction> for LoopExit {
    fn from(action: SystemAction) -> Self {
        match action {
            SystemAction::Restart => LoopExit::Restart,
            SystemAction::FactoryResetAndRestart => LoopExit::FactoryReset,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut env_filter = EnvFilter::new("info");
    for krate in [
        "lss_node",
        "lss_wire",
        "lss_routing",
        "lss_storage",
        "lss_command",
        "lss_runtime",
    ] {
        env_filter = env_filter.add_directive(format!("{}={}", krate, args.log_level).parse()?);
    }

    let mut formatter = LssLogFormatter::new("node");
    if args.no_color {
        formatter = formatter.with_color(false);
    }

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .event_format(formatter)
        .init();

    info!("Starting LSS node simulator v{}", env!("CARGO_PKG_VERSION"));

    let mut config = NodeServiceConfig::load_from_file(&args.config)?;
    args.apply(&mut config)?;

    let store_mode = match config.storage.mode {
        StorageKind::Memory => StoreMode::InMemory,
        StorageKind::File => StoreMode::File {
            path: config.storage.path.clone(),
        },
    };
    let mut store = open_store(store_mode).context("Failed to open configuration store")?;
    provision(&mut store, &config)?;

    let link = UdpLink::bind(config.radio.bind, config.radio.peers.clone())
        .await
        .with_context(|| format!("Failed to bind {}", config.radio.bind))?;
    component_info!(
        "radio",
        "Listening on {} with {} peer(s)",
        link.local_addr()?,
        config.radio.peers.len()
    );

    let flags = Arc::new(RadioFlags::new());
    let mut radio = QueueRadio::new(Arc::clone(&flags));

    loop {
        let mut node = Node::new(
            store,
            radio,
            Arc::clone(&flags),
            MonotonicClock::new(),
            build_assembler(&config),
        )
        .with_reset_mode(config.factory_reset_mode)
        .with_relay(config.relay);

        if config.announce {
            node.announce()?;
        }

        let exit = run(&mut node, &link, config.poll_interval).await?;
        component_info!("node", "Run loop finished: {:?}", node.stats());
        (store, radio) = node.into_parts();

        match exit {
            LoopExit::Shutdown => break,
            LoopExit::Restart => {
                component_info!("lifecycle", "Restarting node");
            }
            LoopExit::FactoryReset => {
                component_warn!("lifecycle", "Wiping configuration before restart");
                store.factory_reset()?;
                provision(&mut store, &config)?;
            }
        }
    }

    info!("LSS node simulator shutdown complete");
    Ok(())
}

/// Drive `node` until shutdown or a restart request
async fn run(node: &mut SimNode, link: &UdpLink, period: Duration) -> anyhow::Result<LoopExit> {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Received SIGINT, shutting down");
                return Ok(LoopExit::Shutdown);
            }

            received = link.recv() => {
                match received {
                    Ok((frame, from)) => {
                        component_debug!("radio", len = frame.len(), %from, "Frame received");
                        node.radio_mut().deliver(frame);
                    }
                    Err(e) => component_warn!("radio", "Receive failed: {}", e),
                }
            }

            _ = ticker.tick() => {
                let outcome = node.poll();
                // acks queued before a failure still go out
                link.flush(node.radio_mut()).await?;
                match outcome {
                    Ok(outcome) => {
                        if outcome.telemetry_sent {
                            component_debug!("node", "Telemetry sent");
                        }
                        if let Some(action) = outcome.action {
                            component_info!("node", "Command requested {:?}", action);
                            return Ok(action.into());
                        }
                    }
                    Err(e) => component_error!("node", "Control loop error: {}", e),
                }
            }
        }
    }
}

/// Write provisioned identity into the store when it differs
fn provision<S>(store: &mut S, config: &NodeServiceConfig) -> anyhow::Result<()>
where
    S: ConfigStore + ?Sized,
{
    let mut changed = false;

    if let Some(id) = config.node_id {
        if id == 0 || id == BROADCAST_ID {
            bail!("Node id {} is reserved; use 1-254", id);
        }
        if store.config().node_id != id {
            store.config_mut().node_id = id;
            changed = true;
        }
    }

    if let Some(id) = config.network_id {
        if store.config().network_id != id {
            store.config_mut().network_id = id;
            changed = true;
        }
    }

    if changed {
        store.save()?;
        component_info!(
            "storage",
            "Provisioned node {} on network {}",
            store.config().node_id,
            store.config().network_id
        );
    }
    Ok(())
}

fn build_assembler(config: &NodeServiceConfig) -> TelemetryAssembler {
    let sensors = config
        .sensors
        .iter()
        .map(|spec| -> Box<dyn Sensor> {
            match spec {
                SensorSpec::Thermistor { raw } => Box::new(ThermistorSensor::new(FixedInput(*raw))),
                SensorSpec::SoilMoisture {
                    raw,
                    dry: Some(dry),
                    wet: Some(wet),
                } => Box::new(SoilMoistureSensor::with_calibration(
                    FixedInput(*raw),
                    *dry,
                    *wet,
                )),
                SensorSpec::SoilMoisture { raw, .. } => {
                    Box::new(SoilMoistureSensor::new(FixedInput(*raw)))
                }
                SensorSpec::Fixed { name, kind, value } => Box::new(FixedSensor::new(
                    name.clone(),
                    vec![SensorValue::new(ValueKind::from(*kind), *value)],
                )),
            }
        })
        .collect();

    TelemetryAssembler::new(sensors, Box::new(FixedBattery(config.battery_mv)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lss_storage::{MemoryConfigStore, NodeConfig};

    #[test]
    fn test_provision_writes_identity_once() {
        let mut store = MemoryConfigStore::new();
        let config = NodeServiceConfig {
            node_id: Some(9),
            network_id: Some(4),
            ..NodeServiceConfig::default()
        };

        provision(&mut store, &config).unwrap();
        assert_eq!(store.config().node_id, 9);
        assert_eq!(store.config().network_id, 4);
        assert_eq!(store.save_count(), 1);

        provision(&mut store, &config).unwrap();
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn test_provision_rejects_reserved_ids() {
        let mut store = MemoryConfigStore::new();
        for id in [0, BROADCAST_ID] {
            let config = NodeServiceConfig {
                node_id: Some(id),
                ..NodeServiceConfig::default()
            };
            assert!(provision(&mut store, &config).is_err());
        }
        assert_eq!(store.config(), &NodeConfig::default());
    }

    #[test]
    fn test_args_override_config() {
        let args = Args::parse_from([
            "lss-node",
            "--node-id",
            "3",
            "--peer",
            "127.0.0.1:47001",
            "--storage-mode",
            "memory",
            "--poll-interval",
            "10ms",
            "--no-announce",
        ]);
        let mut config = NodeServiceConfig::default();
        args.apply(&mut config).unwrap();

        assert_eq!(config.node_id, Some(3));
        assert_eq!(config.radio.peers.len(), 1);
        assert_eq!(config.storage.mode, StorageKind::Memory);
        assert_eq!(config.poll_interval, Duration::from_millis(10));
        assert!(!config.announce);
    }

    #[test]
    fn test_bad_storage_mode() {
        let args = Args::parse_from(["lss-node", "--storage-mode", "flash"]);
        assert!(args.apply(&mut NodeServiceConfig::default()).is_err());
    }

    #[test]
    fn test_exit_from_action() {
        assert_eq!(LoopExit::from(SystemAction::Restart), LoopExit::Restart);
        assert_eq!(
            LoopExit::from(SystemAction::FactoryResetAndRestart),
            LoopExit::FactoryReset
        );
    }

    #[test]
    fn test_assembler_from_specs() {
        let mut assembler = build_assembler(&NodeServiceConfig::default());
        assert_eq!(assembler.sensor_count(), 2);
        assert_eq!(assembler.begin_all(), 2);
        let record = assembler.assemble(&NodeConfig::default(), 0, 0);
        assert_eq!(record.values.len(), 2);
        assert_eq!(record.values[1].kind, ValueKind::Moisture);
    }

    #[test]
    fn test_restart_keeps_store_and_radio() {
        let flags = Arc::new(RadioFlags::new());
        let store: Box<dyn ConfigStore + Send> = Box::new(MemoryConfigStore::new());
        let node: SimNode = Node::new(
            store,
            QueueRadio::new(Arc::clone(&flags)),
            Arc::clone(&flags),
            MonotonicClock::new(),
            build_assembler(&NodeServiceConfig::default()),
        );
        let (mut store, mut radio) = node.into_parts();
        store.config_mut().location = "Barn".to_string();
        radio.enqueue(vec![1, 2, 3]);

        let node: SimNode = Node::new(
            store,
            radio,
            flags,
            MonotonicClock::new(),
            build_assembler(&NodeServiceConfig::default()),
        );
        assert_eq!(node.store().config().location, "Barn");
        assert_eq!(node.radio().pending(), 1);
    }
}
