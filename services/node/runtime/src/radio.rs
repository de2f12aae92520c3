//! Radio transport seam.

use std::collections::VecDeque;
use std::sync::Arc;
use tracing::trace;

use crate::error::RadioError;
use crate::flags::RadioFlags;

/// Largest frame the transceiver accepts
pub const MAX_FRAME_LEN: usize = 255;

/// Raw byte transport; the core never sees anything but byte buffers
pub trait Radio {
    /// Send one frame
    fn transmit(&mut self, frame: &[u8]) -> Result<(), RadioError>;

    /// Next received frame, if any
    fn receive(&mut self) -> Option<Vec<u8>>;
}

/// In-memory radio: frames injected by the host, transmissions collected.
///
/// Injection and transmission raise the shared [`RadioFlags`] the way a
/// transceiver interrupt would.
#[derive(Debug)]
pub struct QueueRadio {
    flags: Arc<RadioFlags>,
    inbound: VecDeque<Vec<u8>>,
    outbound: Vec<Vec<u8>>,
}

impl QueueRadio {
    /// Radio signalling through `flags`
    pub fn new(flags: Arc<RadioFlags>) -> Self {
        Self {
            flags,
            inbound: VecDeque::new(),
            outbound: Vec::new(),
        }
    }

    /// Queue a frame as if it came over the air and raise the receive flag
    pub fn deliver(&mut self, frame: impl Into<Vec<u8>>) {
        self.enqueue(frame);
        self.flags.raise_receive();
    }

    /// Queue a frame without raising the receive flag
    pub fn enqueue(&mut self, frame: impl Into<Vec<u8>>) {
        self.inbound.push_back(frame.into());
    }

    /// Frames waiting to be read
    pub fn pending(&self) -> usize {
        self.inbound.len()
    }

    /// Remove and return everything transmitted so far
    pub fn take_transmitted(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.outbound)
    }

    /// Everything transmitted so far
    pub fn transmitted(&self) -> &[Vec<u8>] {
        &self.outbound
    }
}

impl Radio for QueueRadio {
    fn transmit(&mut self, frame: &[u8]) -> Result<(), RadioError> {
        if frame.len() > MAX_FRAME_LEN {
            return Err(RadioError::TooLarge {
                len: frame.len(),
                max: MAX_FRAME_LEN,
            });
        }
        trace!(len = frame.len(), "Radio transmit");
        self.outbound.push(frame.to_vec());
        self.flags.raise_transmit_done();
        Ok(())
    }

    fn receive(&mut self) -> Option<Vec<u8>> {
        self.inbound.pop_front()
    }
}
