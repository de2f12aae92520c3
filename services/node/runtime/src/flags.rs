//! Interrupt-to-loop signalling.
//!
//! The radio driver raises a flag from interrupt context; the control loop
//! observes and clears it with a single swap, so each event is seen once.

use std::sync::atomic::{AtomicBool, Ordering};

/// Receive-complete and transmit-complete flags
#[derive(Debug, Default)]
pub struct RadioFlags {
    receive: AtomicBool,
    transmit_done: AtomicBool,
}

impl RadioFlags {
    /// Both flags clear
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal that a frame is waiting (interrupt side)
    pub fn raise_receive(&self) {
        self.receive.store(true, Ordering::Release);
    }

    /// Signal that a transmission finished (interrupt side)
    pub fn raise_transmit_done(&self) {
        self.transmit_done.store(true, Ordering::Release);
    }

    /// Observe and clear the receive flag
    pub fn take_receive(&self) -> bool {
        self.receive.swap(false, Ordering::AcqRel)
    }

    /// Observe and clear the transmit-complete flag
    pub fn take_transmit_done(&self) -> bool {
        self.transmit_done.swap(false, Ordering::AcqRel)
    }

    /// Peek at the receive flag without clearing it
    pub fn receive_pending(&self) -> bool {
        self.receive.load(Ordering::Acquire)
    }
}
