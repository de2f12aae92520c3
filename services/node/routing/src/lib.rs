//! Mesh routing for LSS sensor nodes.
//!
//! This crate provides the AODV-inspired router that sits between the radio
//! and the application codec. Each inbound frame is a single-step decision
//! (deliver, not mine, or drop) against a fixed-capacity route table learned
//! from overheard traffic and neighbour beacons.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod error;
pub mod recent;
pub mod router;
pub mod table;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use error::RoutingError;
pub use recent::{RecentFrames, RECENT_FRAMES_CAPACITY, RECENT_FRAME_TTL_MS};
pub use router::*;
pub use table::*;
