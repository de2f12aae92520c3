//! Multi-value telemetry record.
//!
//! A 60-byte header, up to [`MAX_VALUES`] typed value entries of 5 bytes
//! each, then a CRC-16 over header and values.

use bitflags::bitflags;
use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::crc::crc16;
use crate::WireError;

/// Sync marker of the multi-value telemetry record
pub const TELEMETRY_SYNC: u16 = 0xABCD;

/// Packet-type tag carried in the telemetry header
pub const TELEMETRY_TYPE_TAG: u8 = 1;

/// Telemetry header size in bytes
pub const TELEMETRY_HEADER_SIZE: usize = 60;

/// Size of one value entry (tag + f32)
pub const VALUE_ENTRY_SIZE: usize = 5;

/// Maximum value entries per record
pub const MAX_VALUES: usize = 16;

/// Width of the null-padded location field
pub const LOCATION_LEN: usize = 32;

/// Width of the null-padded zone field
pub const ZONE_LEN: usize = 16;

/// Trailing checksum size
pub const CHECKSUM_SIZE: usize = 2;

/// Kind of measurement carried by a value entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    /// Air temperature, °C
    Temperature,
    /// Relative humidity, %
    Humidity,
    /// Barometric pressure, hPa
    Pressure,
    /// Illuminance, lux
    Light,
    /// Bus voltage, V
    Voltage,
    /// Current, mA
    Current,
    /// Power, mW
    Power,
    /// Energy, Wh
    Energy,
    /// Gas resistance, Ω
    GasResistance,
    /// Battery level, %
    Battery,
    /// Signal strength, dBm
    SignalStrength,
    /// Soil moisture, %
    Moisture,
    /// Unitless value
    Generic,
    /// Probe temperature from an NTC thermistor, °C
    ThermistorTemperature,
    /// Tag not known to this implementation, kept verbatim
    Other(u8),
}

impl From<u8> for ValueKind {
    fn from(tag: u8) -> Self {
        match tag {
            0 => ValueKind::Temperature,
            1 => ValueKind::Humidity,
            2 => ValueKind::Pressure,
            3 => ValueKind::Light,
            4 => ValueKind::Voltage,
            5 => ValueKind::Current,
            6 => ValueKind::Power,
            7 => ValueKind::Energy,
            8 => ValueKind::GasResistance,
            9 => ValueKind::Battery,
            10 => ValueKind::SignalStrength,
            11 => ValueKind::Moisture,
            12 => ValueKind::Generic,
            13 => ValueKind::ThermistorTemperature,
            other => ValueKind::Other(other),
        }
    }
}

impl From<ValueKind> for u8 {
    fn from(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Temperature => 0,
            ValueKind::Humidity => 1,
            ValueKind::Pressure => 2,
            ValueKind::Light => 3,
            ValueKind::Voltage => 4,
            ValueKind::Current => 5,
            ValueKind::Power => 6,
            ValueKind::Energy => 7,
            ValueKind::GasResistance => 8,
            ValueKind::Battery => 9,
            ValueKind::SignalStrength => 10,
            ValueKind::Moisture => 11,
            ValueKind::Generic => 12,
            ValueKind::ThermistorTemperature => 13,
            ValueKind::Other(tag) => tag,
        }
    }
}

bitflags! {
    /// Power-state byte of the telemetry header
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct PowerState: u8 {
        /// Battery is being charged
        const CHARGING = 1 << 0;
    }
}

/// One typed measurement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorValue {
    /// Measurement kind
    pub kind: ValueKind,
    /// Measured value
    pub value: f32,
}

impl SensorValue {
    /// Create a value entry
    pub fn new(kind: ValueKind, value: f32) -> Self {
        Self { kind, value }
    }
}

/// Telemetry header fields (sync marker and type tag are implied)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TelemetryHeader {
    /// Network the sender belongs to
    pub network_id: u16,
    /// Sending node id
    pub sender_id: u8,
    /// Battery level, 0–100
    pub battery_percent: u8,
    /// Charging state
    pub power_state: PowerState,
    /// Sequence of the last command this node applied
    pub last_command_seq: u8,
    /// Status of that command (0 = success)
    pub ack_status: u8,
    /// Location label, at most 31 bytes on the wire
    pub location: String,
    /// Zone label, at most 15 bytes on the wire
    pub zone: String,
}

impl Default for PowerState {
    fn default() -> Self {
        PowerState::empty()
    }
}

/// Complete telemetry record.
///
/// Equality covers header and values only: `checksum` is derived from them
/// and is only meaningful on a decoded record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// Header fields
    pub header: TelemetryHeader,
    /// Value entries, in transmission order
    pub values: SmallVec<[SensorValue; MAX_VALUES]>,
    /// Checksum as received; set by decode, ignored by encode
    pub checksum: u16,
}

impl PartialEq for TelemetryRecord {
    fn eq(&self, other: &Self) -> bool {
        self.header == other.header && self.values == other.values
    }
}

impl TelemetryRecord {
    /// Create an empty record for `header`
    pub fn new(header: TelemetryHeader) -> Self {
        Self {
            header,
            values: SmallVec::new(),
            checksum: 0,
        }
    }

    /// Append a value entry, refusing past [`MAX_VALUES`]
    pub fn push(&mut self, value: SensorValue) -> Result<(), WireError> {
        if self.values.len() >= MAX_VALUES {
            return Err(WireError::Count(self.values.len() + 1));
        }
        self.values.push(value);
        Ok(())
    }

    /// Encoded size implied by the value count
    pub fn encoded_size(&self) -> usize {
        size_of_telemetry(self.values.len())
    }

    /// Encode into `buf`, returning the number of bytes written
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, WireError> {
        let count = self.values.len();
        if count > MAX_VALUES {
            return Err(WireError::Count(count));
        }

        let needed = self.encoded_size();
        if buf.len() < needed {
            return Err(WireError::BufferTooSmall {
                need: needed,
                have: buf.len(),
            });
        }

        let body_len = needed - CHECKSUM_SIZE;
        {
            let mut out = &mut buf[..body_len];
            out.put_u16_le(TELEMETRY_SYNC);
            out.put_u16_le(self.header.network_id);
            out.put_u8(TELEMETRY_TYPE_TAG);
            out.put_u8(self.header.sender_id);
            out.put_u8(count as u8);
            out.put_u8(self.header.battery_percent);
            out.put_u8(self.header.power_state.bits());
            out.put_u8(self.header.last_command_seq);
            out.put_u8(self.header.ack_status);
            out.put_u8(0); // reserved
            put_fixed_str(&mut out, &self.header.location, LOCATION_LEN);
            put_fixed_str(&mut out, &self.header.zone, ZONE_LEN);

            for entry in &self.values {
                out.put_u8(entry.kind.into());
                out.put_f32_le(entry.value);
            }
        }

        let checksum = crc16(&buf[..body_len]);
        buf[body_len..needed].copy_from_slice(&checksum.to_le_bytes());
        Ok(needed)
    }

    /// Encode into a freshly allocated vector
    pub fn to_vec(&self) -> Result<Vec<u8>, WireError> {
        let mut buf = vec![0u8; self.encoded_size()];
        self.encode(&mut buf)?;
        Ok(buf)
    }

    /// Decode and verify a record from `buf`
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        let minimum = TELEMETRY_HEADER_SIZE + CHECKSUM_SIZE;
        if buf.len() < minimum {
            return Err(WireError::Incomplete {
                need: minimum,
                have: buf.len(),
            });
        }

        let mut cur = buf;
        let sync = cur.get_u16_le();
        if sync != TELEMETRY_SYNC {
            return Err(WireError::Sync(sync));
        }

        let network_id = cur.get_u16_le();
        let _type_tag = cur.get_u8();
        let sender_id = cur.get_u8();
        let count = cur.get_u8() as usize;
        let battery_percent = cur.get_u8();
        let power_state = PowerState::from_bits_retain(cur.get_u8());
        let last_command_seq = cur.get_u8();
        let ack_status = cur.get_u8();
        let _reserved = cur.get_u8();
        let location = get_fixed_str(&mut cur, LOCATION_LEN);
        let zone = get_fixed_str(&mut cur, ZONE_LEN);

        if count > MAX_VALUES {
            return Err(WireError::Count(count));
        }

        let body_len = TELEMETRY_HEADER_SIZE + count * VALUE_ENTRY_SIZE;
        if buf.len() < body_len + CHECKSUM_SIZE {
            return Err(WireError::Incomplete {
                need: body_len + CHECKSUM_SIZE,
                have: buf.len(),
            });
        }

        let received = u16::from_le_bytes([buf[body_len], buf[body_len + 1]]);
        let computed = crc16(&buf[..body_len]);
        if received != computed {
            return Err(WireError::Checksum { received, computed });
        }

        let values = (0..count)
            .map(|_| {
                let kind = ValueKind::from(cur.get_u8());
                SensorValue::new(kind, cur.get_f32_le())
            })
            .collect();

        Ok(Self {
            header: TelemetryHeader {
                network_id,
                sender_id,
                battery_percent,
                power_state,
                last_command_seq,
                ack_status,
                location,
                zone,
            },
            values,
            checksum: received,
        })
    }
}

/// Encoded telemetry size for `value_count` entries
pub fn size_of_telemetry(value_count: usize) -> usize {
    TELEMETRY_HEADER_SIZE + value_count * VALUE_ENTRY_SIZE + CHECKSUM_SIZE
}

/// Write `s` into a `width`-byte field, always leaving a terminating zero.
fn put_fixed_str<B: BufMut>(buf: &mut B, s: &str, width: usize) {
    let mut len = s.len().min(width - 1);
    while !s.is_char_boundary(len) {
        len -= 1;
    }
    buf.put_slice(&s.as_bytes()[..len]);
    buf.put_bytes(0, width - len);
}

fn get_fixed_str<B: Buf>(buf: &mut B, width: usize) -> String {
    let mut raw = vec![0u8; width];
    buf.copy_to_slice(&mut raw);
    let end = raw.iter().position(|&b| b == 0).unwrap_or(width);
    String::from_utf8_lossy(&raw[..end]).into_owned()
}
