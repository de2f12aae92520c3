//! Fixed-size command record and the shared 200-byte record layout.
//!
//! Commands and acknowledgments share one layout: sync marker, code, node id,
//! sequence, two control bytes, a 192-byte data region and a trailing CRC-16.
//! The record is always exactly [`COMMAND_RECORD_SIZE`] bytes.

use bytes::{Buf, BufMut, Bytes};
use serde::{Deserialize, Serialize};

use crate::crc::crc16;
use crate::WireError;

/// Sync marker of the command/ack family
pub const COMMAND_SYNC: u16 = 0xCDEF;

/// Total size of a command or ack record
pub const COMMAND_RECORD_SIZE: usize = 200;

/// Capacity of the data region
pub const COMMAND_DATA_LEN: usize = 192;

const DATA_OFFSET: usize = 7;
const CHECKSUM_OFFSET: usize = DATA_OFFSET + COMMAND_DATA_LEN;

/// Command codes of the node protocol
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandCode {
    /// Liveness check
    Ping = 0x00,
    /// Request the current configuration
    GetConfig = 0x01,
    /// Set the telemetry interval (u32 ms)
    SetInterval = 0x02,
    /// Set location and optional zone labels
    SetLocation = 0x03,
    /// Set temperature alarm thresholds (f32 low, f32 high)
    SetTempThresholds = 0x04,
    /// Set battery alarm thresholds (f32 low, f32 critical)
    SetBatteryThresholds = 0x05,
    /// Enable or disable mesh mode
    SetMeshConfig = 0x06,
    /// Restart the node
    Restart = 0x07,
    /// Restore default configuration
    FactoryReset = 0x08,
    /// Set radio parameters, effective next boot
    SetLoraParams = 0x09,
    /// Clock synchronisation (u32 epoch, i16 tz minutes)
    TimeSync = 0x0A,
    /// Node enrolment broadcast at start-up
    SensorAnnounce = 0x0B,
    /// Base station greeting; carries the same payload as time sync
    BaseWelcome = 0x0C,
    /// Positive acknowledgment
    Ack = 0xA0,
    /// Negative acknowledgment
    Nack = 0xA1,
}

impl CommandCode {
    /// Whether the code belongs to the reply range (ack/nack)
    pub fn is_reply(self) -> bool {
        matches!(self, CommandCode::Ack | CommandCode::Nack)
    }
}

impl TryFrom<u8> for CommandCode {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(CommandCode::Ping),
            0x01 => Ok(CommandCode::GetConfig),
            0x02 => Ok(CommandCode::SetInterval),
            0x03 => Ok(CommandCode::SetLocation),
            0x04 => Ok(CommandCode::SetTempThresholds),
            0x05 => Ok(CommandCode::SetBatteryThresholds),
            0x06 => Ok(CommandCode::SetMeshConfig),
            0x07 => Ok(CommandCode::Restart),
            0x08 => Ok(CommandCode::FactoryReset),
            0x09 => Ok(CommandCode::SetLoraParams),
            0x0A => Ok(CommandCode::TimeSync),
            0x0B => Ok(CommandCode::SensorAnnounce),
            0x0C => Ok(CommandCode::BaseWelcome),
            0xA0 => Ok(CommandCode::Ack),
            0xA1 => Ok(CommandCode::Nack),
            _ => Err(WireError::Code(value)),
        }
    }
}

/// Raw fields of a 200-byte record, borrowed from the input buffer.
pub(crate) struct FixedFields<'a> {
    pub code: u8,
    pub node_id: u8,
    pub sequence: u8,
    pub control: [u8; 2],
    pub data: &'a [u8],
}

/// Write a record into `out`. `data` must fit the data region.
pub(crate) fn write_fixed(
    out: &mut [u8; COMMAND_RECORD_SIZE],
    code: u8,
    node_id: u8,
    sequence: u8,
    control: [u8; 2],
    data: &[u8],
) {
    debug_assert!(data.len() <= COMMAND_DATA_LEN);
    out.fill(0);
    {
        let mut cur = &mut out[..DATA_OFFSET];
        cur.put_u16_le(COMMAND_SYNC);
        cur.put_u8(code);
        cur.put_u8(node_id);
        cur.put_u8(sequence);
        cur.put_slice(&control);
    }
    out[DATA_OFFSET..DATA_OFFSET + data.len()].copy_from_slice(data);

    let checksum = crc16(&out[..CHECKSUM_OFFSET]);
    out[CHECKSUM_OFFSET..].copy_from_slice(&checksum.to_le_bytes());
}

/// Check length, sync marker and checksum, then split out the raw fields.
pub(crate) fn read_fixed(buf: &[u8]) -> Result<FixedFields<'_>, WireError> {
    if buf.len() != COMMAND_RECORD_SIZE {
        return Err(WireError::Length {
            expected: COMMAND_RECORD_SIZE,
            actual: buf.len(),
        });
    }

    let mut cur = buf;
    let sync = cur.get_u16_le();
    if sync != COMMAND_SYNC {
        return Err(WireError::Sync(sync));
    }

    let received = u16::from_le_bytes([buf[CHECKSUM_OFFSET], buf[CHECKSUM_OFFSET + 1]]);
    let computed = crc16(&buf[..CHECKSUM_OFFSET]);
    if received != computed {
        return Err(WireError::Checksum { received, computed });
    }

    Ok(FixedFields {
        code: cur.get_u8(),
        node_id: cur.get_u8(),
        sequence: cur.get_u8(),
        control: [cur.get_u8(), cur.get_u8()],
        data: &buf[DATA_OFFSET..CHECKSUM_OFFSET],
    })
}

/// Command sent from the base station to a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRecord {
    /// Raw command code; unknown codes survive decoding so they can be NACKed
    pub code: u8,
    /// Addressed node (255 = broadcast)
    pub target_id: u8,
    /// Sequence echoed by the reply
    pub sequence: u8,
    /// Command payload, at most [`COMMAND_DATA_LEN`] bytes
    pub payload: Bytes,
}

impl CommandRecord {
    /// Build a command, rejecting payloads that do not fit the data region
    pub fn new(
        code: CommandCode,
        target_id: u8,
        sequence: u8,
        payload: impl Into<Bytes>,
    ) -> Result<Self, WireError> {
        let payload = payload.into();
        if payload.len() > COMMAND_DATA_LEN {
            return Err(WireError::PayloadLength(payload.len()));
        }
        Ok(Self {
            code: code as u8,
            target_id,
            sequence,
            payload,
        })
    }

    /// Typed command code
    pub fn command(&self) -> Result<CommandCode, WireError> {
        CommandCode::try_from(self.code)
    }

    /// Encode into the front of `buf`, returning the bytes written
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, WireError> {
        if buf.len() < COMMAND_RECORD_SIZE {
            return Err(WireError::BufferTooSmall {
                need: COMMAND_RECORD_SIZE,
                have: buf.len(),
            });
        }
        let record = self.to_bytes()?;
        buf[..COMMAND_RECORD_SIZE].copy_from_slice(&record);
        Ok(COMMAND_RECORD_SIZE)
    }

    /// Encode into a fixed array
    pub fn to_bytes(&self) -> Result<[u8; COMMAND_RECORD_SIZE], WireError> {
        if self.payload.len() > COMMAND_DATA_LEN {
            return Err(WireError::PayloadLength(self.payload.len()));
        }
        let mut out = [0u8; COMMAND_RECORD_SIZE];
        write_fixed(
            &mut out,
            self.code,
            self.target_id,
            self.sequence,
            [self.payload.len() as u8, 0],
            &self.payload,
        );
        Ok(out)
    }

    /// Decode an exact 200-byte command record
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        let fields = read_fixed(buf)?;
        let data_len = fields.control[0] as usize;
        if data_len > COMMAND_DATA_LEN {
            return Err(WireError::PayloadLength(data_len));
        }

        Ok(Self {
            code: fields.code,
            target_id: fields.node_id,
            sequence: fields.sequence,
            payload: Bytes::copy_from_slice(&fields.data[..data_len]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interval_command(ms: u32) -> CommandRecord {
        CommandRecord::new(CommandCode::SetInterval, 5, 42, ms.to_le_bytes().to_vec()).unwrap()
    }

    #[test]
    fn test_command_code_conversion() {
        assert_eq!(CommandCode::try_from(0x0A).unwrap(), CommandCode::TimeSync);
        assert_eq!(CommandCode::try_from(0xA1).unwrap(), CommandCode::Nack);
        assert_eq!(CommandCode::try_from(0x0D), Err(WireError::Code(0x0D)));
        assert!(CommandCode::Ack.is_reply());
        assert!(!CommandCode::Restart.is_reply());
    }

    #[test]
    fn test_layout() {
        let bytes = interval_command(15000).to_bytes().unwrap();
        assert_eq!(bytes.len(), COMMAND_RECORD_SIZE);
        assert_eq!(&bytes[0..2], &[0xEF, 0xCD]);
        assert_eq!(bytes[2], 0x02);
        assert_eq!(bytes[3], 5);
        assert_eq!(bytes[4], 42);
        assert_eq!(bytes[5], 4);
        assert_eq!(bytes[6], 0);
        assert_eq!(&bytes[7..11], &15000u32.to_le_bytes());
        assert!(bytes[11..198].iter().all(|&b| b == 0));

        let checksum = crc16(&bytes[..198]);
        assert_eq!(&bytes[198..], &checksum.to_le_bytes());
    }

    #[test]
    fn test_round_trip() {
        let command = interval_command(15000);
        let decoded = CommandRecord::decode(&command.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, command);
        assert_eq!(decoded.command().unwrap(), CommandCode::SetInterval);
    }

    #[test]
    fn test_exact_length_required() {
        let bytes = interval_command(1000).to_bytes().unwrap();
        let mut longer = bytes.to_vec();
        longer.push(0);

        assert_eq!(
            CommandRecord::decode(&longer),
            Err(WireError::Length {
                expected: 200,
                actual: 201
            })
        );
        assert!(matches!(
            CommandRecord::decode(&bytes[..199]),
            Err(WireError::Length { .. })
        ));
    }

    #[test]
    fn test_checksum_and_sync_checked() {
        let mut bytes = interval_command(1000).to_bytes().unwrap();
        bytes[100] = 0x55;
        assert!(matches!(
            CommandRecord::decode(&bytes),
            Err(WireError::Checksum { .. })
        ));

        let mut bytes = interval_command(1000).to_bytes().unwrap();
        bytes[1] = 0xAB;
        assert_eq!(CommandRecord::decode(&bytes), Err(WireError::Sync(0xABEF)));
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let err = CommandRecord::new(CommandCode::Ping, 1, 1, vec![0u8; 193]).unwrap_err();
        assert_eq!(err, WireError::PayloadLength(193));

        let full = CommandRecord::new(CommandCode::Ping, 1, 1, vec![7u8; 192]).unwrap();
        let decoded = CommandRecord::decode(&full.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded.payload.len(), 192);
    }

    #[test]
    fn test_declared_length_over_capacity_rejected() {
        let mut out = [0u8; COMMAND_RECORD_SIZE];
        write_fixed(&mut out, 0x00, 1, 1, [193, 0], &[]);
        assert_eq!(
            CommandRecord::decode(&out),
            Err(WireError::PayloadLength(193))
        );
    }

    #[test]
    fn test_unknown_code_survives_decode() {
        let mut out = [0u8; COMMAND_RECORD_SIZE];
        write_fixed(&mut out, 0x42, 1, 9, [0, 0], &[]);
        let decoded = CommandRecord::decode(&out).unwrap();
        assert_eq!(decoded.code, 0x42);
        assert_eq!(decoded.command(), Err(WireError::Code(0x42)));
    }

    #[test]
    fn test_encode_into_small_buffer() {
        let mut buf = [0u8; 100];
        assert_eq!(
            interval_command(1000).encode(&mut buf),
            Err(WireError::BufferTooSmall {
                need: 200,
                have: 100
            })
        );
    }
}
