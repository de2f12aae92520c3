//! Wire protocol error types.

use thiserror::Error;

/// Wire protocol errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Input shorter than the record requires
    #[error("incomplete frame: need {need} bytes, have {have}")]
    Incomplete {
        /// Bytes required
        need: usize,
        /// Bytes available
        have: usize,
    },

    /// Fixed-size record with trailing slack bytes
    #[error("unexpected length: expected exactly {expected} bytes, got {actual}")]
    Length {
        /// Exact record size
        expected: usize,
        /// Size of the offered buffer
        actual: usize,
    },

    /// Destination buffer cannot hold the encoded record
    #[error("buffer too small: need {need} bytes, have {have}")]
    BufferTooSmall {
        /// Bytes required
        need: usize,
        /// Bytes available
        have: usize,
    },

    /// Sync marker does not match the expected record family
    #[error("sync marker mismatch: 0x{0:04X}")]
    Sync(u16),

    /// No known sync marker at the inspected offset
    #[error("unrecognized frame")]
    Unrecognized,

    /// Declared value count exceeds the record capacity
    #[error("value count {0} exceeds maximum")]
    Count(usize),

    /// Declared payload length exceeds the record capacity
    #[error("payload length {0} exceeds maximum")]
    PayloadLength(usize),

    /// Trailing checksum does not match the recomputed one
    #[error("checksum mismatch: frame carries 0x{received:04X}, computed 0x{computed:04X}")]
    Checksum {
        /// Checksum carried by the frame
        received: u16,
        /// Checksum recomputed over the covered bytes
        computed: u16,
    },

    /// Unknown mesh envelope kind
    #[error("unknown mesh kind {0}")]
    Kind(u8),

    /// Unknown command code
    #[error("unknown command code 0x{0:02X}")]
    Code(u8),
}
