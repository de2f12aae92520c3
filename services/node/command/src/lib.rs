//! Command handling for LSS sensor nodes.
//!
//! Commands arrive from the base station as fixed-size records. The
//! processor validates each one completely before touching the
//! configuration, persists accepted changes, and always answers with exactly
//! one ack or nack echoing the command's sequence number. Restarts and
//! factory resets are returned to the caller as [`SystemAction`]s instead of
//! being performed here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod processor;
pub mod request;

pub use error::CommandError;
pub use processor::{CommandOutcome, CommandProcessor, FactoryResetMode, MeshSwitch, SystemAction};
pub use request::{NodeCommand, MAX_INTERVAL_MS, MIN_INTERVAL_MS};
