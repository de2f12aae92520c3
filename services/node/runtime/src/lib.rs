//! Control loop and collaborators for LSS sensor nodes.
//!
//! A [`Node`] owns the configuration store, mesh router and radio, and is
//! driven by repeated calls to [`Node::poll`]:
//!
//! ```text
//! radio ISR ──▶ RadioFlags ──▶ poll ─┬─▶ receive: router ─▶ codec ─▶ processor ─▶ ack
//!                                    ├─▶ transmit-complete bookkeeping
//!                                    ├─▶ telemetry (sensors + battery), when due
//!                                    └─▶ router tick (beacon), when mesh is on
//! ```
//!
//! Nothing here blocks. The only state shared with interrupt context is the
//! pair of flags in [`RadioFlags`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod flags;
pub mod node;
pub mod radio;
pub mod sensor;
pub mod telemetry;

pub use error::{RadioError, RuntimeError, SensorError};
pub use flags::RadioFlags;
pub use node::{Node, NodeStats, PollOutcome, BASE_STATION_ID};
pub use radio::{QueueRadio, Radio, MAX_FRAME_LEN};
pub use sensor::{
    battery_percent, AdcBattery, AnalogInput, BatteryMonitor, FixedBattery, FixedInput,
    FixedSensor, Sensor, SoilMoistureSensor, ThermistorSensor,
};
pub use telemetry::TelemetryAssembler;
