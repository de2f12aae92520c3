//! Acknowledgment record.
//!
//! Same 200-byte layout as a command; byte 5 carries the status code and
//! byte 6 the payload length.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::command::{read_fixed, write_fixed, CommandCode, COMMAND_DATA_LEN, COMMAND_RECORD_SIZE};
use crate::WireError;

/// Status code for a successfully applied command
pub const STATUS_OK: u8 = 0;

/// Status code for a rejected or failed command
pub const STATUS_FAILED: u8 = 1;

/// Ack or nack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AckKind {
    /// Command applied
    Ack,
    /// Command rejected
    Nack,
}

impl AckKind {
    /// Wire code of this reply
    pub fn code(self) -> u8 {
        match self {
            AckKind::Ack => CommandCode::Ack as u8,
            AckKind::Nack => CommandCode::Nack as u8,
        }
    }
}

impl TryFrom<u8> for AckKind {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match CommandCode::try_from(value)? {
            CommandCode::Ack => Ok(AckKind::Ack),
            CommandCode::Nack => Ok(AckKind::Nack),
            _ => Err(WireError::Code(value)),
        }
    }
}

/// Reply from a node to a command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckRecord {
    /// Ack or nack
    pub kind: AckKind,
    /// Node that answered
    pub responder_id: u8,
    /// Sequence of the command being answered
    pub sequence: u8,
    /// 0 = success, 1 = failure
    pub status: u8,
    /// Optional reply data, at most [`COMMAND_DATA_LEN`] bytes
    pub payload: Bytes,
}

impl AckRecord {
    /// Reply without payload
    pub fn new(kind: AckKind, responder_id: u8, sequence: u8, status: u8) -> Self {
        Self {
            kind,
            responder_id,
            sequence,
            status,
            payload: Bytes::new(),
        }
    }

    /// Positive reply with status 0
    pub fn ok(responder_id: u8, sequence: u8) -> Self {
        Self::new(AckKind::Ack, responder_id, sequence, STATUS_OK)
    }

    /// Negative reply with status 1
    pub fn failed(responder_id: u8, sequence: u8) -> Self {
        Self::new(AckKind::Nack, responder_id, sequence, STATUS_FAILED)
    }

    /// Whether the reply reports success
    pub fn is_success(&self) -> bool {
        self.kind == AckKind::Ack && self.status == STATUS_OK
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
            self.kind.code(),
            self.responder_id,
            self.sequence,
            [self.status, self.payload.len() as u8],
            &self.payload,
        );
        Ok(out)
    }

    /// Decode an exact 200-byte ack record
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        let fields = read_fixed(buf)?;
        let kind = AckKind::try_from(fields.code)?;
        let [status, data_len] = fields.control;
        let data_len = data_len as usize;
        if data_len > COMMAND_DATA_LEN {
            return Err(WireError::PayloadLength(data_len));
        }

        Ok(Self {
            kind,
            responder_id: fields.node_id,
            sequence: fields.sequence,
            status,
            payload: Bytes::copy_from_slice(&fields.data[..data_len]),
        })
    }
}
