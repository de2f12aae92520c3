//! Command validation errors.

use lss_storage::StorageError;
use thiserror::Error;

/// Reasons a command is answered with a NACK
#[derive(Error, Debug)]
pub enum CommandError {
    /// Payload shorter than the command requires
    #[error("payload too short: need {need} bytes, have {have}")]
    PayloadTooShort {
        /// Bytes required
        need: usize,
        /// Bytes present
        have: usize,
    },

    /// Decoded value outside its accepted range
    #[error("{field} out of range: {value}")]
    OutOfRange {
        /// Field being validated
        field: &'static str,
        /// Rejected value
        value: i64,
    },

    /// String field without a terminator inside its width
    #[error("{field} is not null-terminated within {width} bytes")]
    Unterminated {
        /// Field being validated
        field: &'static str,
        /// Maximum width including the terminator
        width: usize,
    },

    /// Code not defined by the protocol
    #[error("unknown command code 0x{0:02X}")]
    UnknownCode(u8),

    /// Defined code that a node does not accept as a request
    #[error("command 0x{0:02X} is not accepted by nodes")]
    NotAccepted(u8),

    /// Persisting the change failed; the configuration was rolled back
    #[error("save failed: {0}")]
    Storage(#[from] StorageError),
}
