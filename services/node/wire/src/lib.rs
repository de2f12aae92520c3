//! Wire formats for the LSS sensor node.
//!
//! This crate implements the byte-exact records exchanged between nodes and
//! the base station: the mesh envelope, multi-value telemetry, the fixed-size
//! command/ack family, read-only legacy telemetry, and the CRC-16 that guards
//! the application records. Everything is little-endian and encoded field by
//! field; no host structure layout is relied on.
//!
//! ## Wire Format
//!
//! ```text
//! Mesh envelope (9B)
//! +------+-----+------+------+------+-----+-----+----------+
//! | kind | src | dest | next | prev | hop | ttl | seq u16  |
//! +------+-----+------+------+------+-----+-----+----------+
//!
//! Telemetry (60B header + 5B x count + 2B crc)
//! +-------------+--------+-----+--------+-------+------+-------+
//! | sync 0xABCD | net u16| tag | sender | count | batt | power |
//! +-------------+--------+-----+--------+-------+------+-------+
//! | last seq | ack status | 0 | location[32] | zone[16]        |
//! +----------+------------+---+--------------+-----------------+
//! | kind f32 | kind f32 | ... | crc16                          |
//! +----------+----------+-----+--------------------------------+
//!
//! Command / ack (200B)
//! +-------------+------+----+-----+---------+---------+-----------+-------+
//! | sync 0xCDEF | code | id | seq | byte 5  | byte 6  | data[192] | crc16 |
//! +-------------+------+----+-----+---------+---------+-----------+-------+
//!   command: byte 5 = data length, byte 6 = 0
//!   ack:     byte 5 = status,      byte 6 = data length
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ack;
pub mod codec;
pub mod command;
pub mod crc;
pub mod error;
pub mod header;
pub mod legacy;
pub mod telemetry;

// Re-export main types
pub use ack::{AckKind, AckRecord, STATUS_FAILED, STATUS_OK};
pub use codec::{build_ack, build_announce, detect, locate, PacketType, FOREIGN_HEADER_LEN};
pub use command::{
    CommandCode, CommandRecord, COMMAND_DATA_LEN, COMMAND_RECORD_SIZE, COMMAND_SYNC,
};
pub use crc::{crc16, Crc16};
pub use error::WireError;
pub use header::{MeshHeader, MeshKind, BROADCAST_ID, MESH_HEADER_SIZE};
pub use legacy::{LegacyTelemetry, LEGACY_RECORD_SIZE, LEGACY_SYNC};
pub use telemetry::{
    size_of_telemetry, PowerState, SensorValue, TelemetryHeader, TelemetryRecord, ValueKind,
    LOCATION_LEN, MAX_VALUES, TELEMETRY_HEADER_SIZE, TELEMETRY_SYNC, VALUE_ENTRY_SIZE, ZONE_LEN,
};
