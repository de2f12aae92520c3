//! Routing error types.

use thiserror::Error;

/// Errors from building outbound mesh frames
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoutingError {
    /// Output buffer cannot hold envelope and payload
    #[error("buffer too small: need {need} bytes, have {have}")]
    BufferTooSmall {
        /// Bytes required
        need: usize,
        /// Bytes available
        have: usize,
    },

    /// Another hop would reach the hop ceiling
    #[error("hop limit reached after {hop_count} hops")]
    HopLimit {
        /// Hops already travelled
        hop_count: u8,
    },

    /// No hops remaining
    #[error("time-to-live exhausted")]
    TtlExhausted,
}
