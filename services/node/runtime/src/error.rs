//! Runtime error types.

use lss_routing::RoutingError;
use lss_storage::StorageError;
use lss_wire::WireError;
use thiserror::Error;

/// Radio transport errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RadioError {
    /// Frame longer than the radio can send
    #[error("frame of {len} bytes exceeds radio limit of {max}")]
    TooLarge {
        /// Frame length
        len: usize,
        /// Radio limit
        max: usize,
    },
    /// Driver-specific failure
    #[error("radio error: {0}")]
    Backend(String),
}

/// Sensor driver errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SensorError {
    /// `begin` has not succeeded
    #[error("sensor not ready")]
    NotReady,
    /// Raw reading cannot be converted
    #[error("invalid raw reading {0}")]
    InvalidReading(i32),
    /// Driver-specific failure
    #[error("sensor error: {0}")]
    Backend(String),
}

/// Errors surfaced by the control loop
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Radio failure
    #[error(transparent)]
    Radio(#[from] RadioError),
    /// Encoding failure
    #[error(transparent)]
    Wire(#[from] WireError),
    /// Envelope construction failure
    #[error(transparent)]
    Routing(#[from] RoutingError),
    /// Configuration store failure
    #[error(transparent)]
    Storage(#[from] StorageError),
}
