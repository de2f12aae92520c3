//! Recently relayed frames, keyed by `(source, sequence)`.
//!
//! A neighbour that relays a broadcast-next-hop frame will hear the same
//! frame echoed back by the next node. Remembering what was already relayed
//! keeps each node to one transmission per logical frame.

/// Number of remembered frames
pub const RECENT_FRAMES_CAPACITY: usize = 16;

/// How long a relayed frame is remembered
pub const RECENT_FRAME_TTL_MS: u32 = 60_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Seen {
    source: u8,
    sequence: u16,
    at: u32,
    valid: bool,
}

/// Ring of recently seen frame identities
#[derive(Debug, Clone, Default)]
pub struct RecentFrames {
    slots: [Seen; RECENT_FRAMES_CAPACITY],
    next: usize,
}

impl RecentFrames {
    /// Create an empty ring
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `(source, sequence)` was recorded within the last
    /// [`RECENT_FRAME_TTL_MS`]
    pub fn contains(&self, source: u8, sequence: u16, now: u32) -> bool {
        self.slots.iter().any(|slot| {
            slot.valid
                && slot.source == source
                && slot.sequence == sequence
                && now.wrapping_sub(slot.at) <= RECENT_FRAME_TTL_MS
        })
    }

    /// Record a frame, returning `false` if it was already present.
    ///
    /// The oldest slot is overwritten once the ring is full.
    pub fn insert(&mut self, source: u8, sequence: u16, now: u32) -> bool {
        if self.contains(source, sequence, now) {
            return false;
        }
        self.slots[self.next] = Seen {
            source,
            sequence,
            at: now,
            valid: true,
        };
        self.next = (self.next + 1) % RECENT_FRAMES_CAPACITY;
        true
    }

    /// Number of slots holding a frame seen within the ttl
    pub fn len(&self, now: u32) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.valid && now.wrapping_sub(slot.at) <= RECENT_FRAME_TTL_MS)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_insert_is_duplicate() {
        let mut recent = RecentFrames::new();
        assert!(recent.insert(3, 1, 0));
        assert!(!recent.insert(3, 1, 10));
        assert!(recent.insert(3, 2, 10));
        assert!(recent.insert(4, 1, 10));
        assert_eq!(recent.len(10), 3);
    }

    #[test]
    fn test_entry_expires_after_ttl() {
        let mut recent = RecentFrames::new();
        recent.insert(3, 1, 1_000);
        assert!(recent.contains(3, 1, 1_000 + RECENT_FRAME_TTL_MS));
        assert!(!recent.contains(3, 1, 1_001 + RECENT_FRAME_TTL_MS));
        assert!(recent.insert(3, 1, 1_001 + RECENT_FRAME_TTL_MS));
    }

    #[test]
    fn test_full_ring_overwrites_oldest() {
        let mut recent = RecentFrames::new();
        for sequence in 0..RECENT_FRAMES_CAPACITY as u16 {
            assert!(recent.insert(9, sequence, 0));
        }
        assert!(recent.insert(9, 100, 0));
        assert!(!recent.contains(9, 0, 0));
        assert!(recent.contains(9, 1, 0));
        assert_eq!(recent.len(0), RECENT_FRAMES_CAPACITY);
    }

    #[test]
    fn test_wrapping_clock() {
        let mut recent = RecentFrames::new();
        recent.insert(1, 7, u32::MAX - 5);
        assert!(recent.contains(1, 7, 10));
    }
}
