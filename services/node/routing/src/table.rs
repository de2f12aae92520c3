//! Fixed-capacity route table.
//!
//! The table is an arena of [`ROUTE_TABLE_CAPACITY`] slots scanned linearly.
//! Entries older than [`ROUTE_TIMEOUT_MS`] read as absent even before the
//! stale sweep marks them invalid.

use serde::{Deserialize, Serialize};

/// Number of route slots
pub const ROUTE_TABLE_CAPACITY: usize = 20;

/// Age after which a route is considered stale (10 minutes)
pub const ROUTE_TIMEOUT_MS: u32 = 600_000;

/// One slot of the route table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RouteEntry {
    /// Destination node
    pub dest: u8,
    /// Neighbour to hand frames for `dest` to
    pub next_hop: u8,
    /// Hops to `dest` when the route was learned
    pub hop_count: u8,
    /// Clock reading of the last refresh
    pub last_updated: u32,
    /// Slot in use
    pub valid: bool,
}

impl RouteEntry {
    /// Milliseconds since the last refresh
    pub fn age(&self, now: u32) -> u32 {
        now.wrapping_sub(self.last_updated)
    }

    /// Whether the entry is in use and not past the timeout
    pub fn is_live(&self, now: u32) -> bool {
        self.valid && self.age(now) <= ROUTE_TIMEOUT_MS
    }
}

/// Outcome of [`RouteTable::update`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteUpdate {
    /// An existing entry for the destination was refreshed
    Refreshed,
    /// A free slot was taken
    Inserted,
    /// The table was full; the entry for this destination was evicted
    Replaced(u8),
}

/// Arena of route entries keyed by destination
#[derive(Debug, Clone)]
pub struct RouteTable {
    entries: [RouteEntry; ROUTE_TABLE_CAPACITY],
}

impl RouteTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            entries: [RouteEntry::default(); ROUTE_TABLE_CAPACITY],
        }
    }

    /// Slot count; the table never holds more entries than this
    pub const fn capacity(&self) -> usize {
        ROUTE_TABLE_CAPACITY
    }

    /// Number of slots marked valid
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.valid).count()
    }

    /// Whether no slot is marked valid
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live route for `dest`
    pub fn lookup(&self, dest: u8, now: u32) -> Option<&RouteEntry> {
        self.entries
            .iter()
            .find(|e| e.valid && e.dest == dest)
            .filter(|e| e.is_live(now))
    }

    /// Insert or refresh the route for `dest`.
    ///
    /// A full table gives up an invalid slot first, then the least recently
    /// updated entry.
    pub fn update(&mut self, dest: u8, next_hop: u8, hop_count: u8, now: u32) -> RouteUpdate {
        let (index, outcome) = match self.find(dest) {
            Some(index) => (index, RouteUpdate::Refreshed),
            None => {
                let index = self.alloc_slot(now);
                let slot = &self.entries[index];
                if slot.valid {
                    (index, RouteUpdate::Replaced(slot.dest))
                } else {
                    (index, RouteUpdate::Inserted)
                }
            }
        };

        self.entries[index] = RouteEntry {
            dest,
            next_hop,
            hop_count,
            last_updated: now,
            valid: true,
        };
        outcome
    }

    /// Invalidate entries past the timeout, returning how many were swept
    pub fn evict_stale(&mut self, now: u32) -> usize {
        let mut evicted = 0;
        for entry in self.entries.iter_mut() {
            if entry.valid && entry.age(now) > ROUTE_TIMEOUT_MS {
                entry.valid = false;
                evicted += 1;
            }
        }
        evicted
    }

    /// Valid entries in slot order
    pub fn iter(&self) -> impl Iterator<Item = &RouteEntry> {
        self.entries.iter().filter(|e| e.valid)
    }

    fn find(&self, dest: u8) -> Option<usize> {
        self.entries.iter().position(|e| e.valid && e.dest == dest)
    }

    fn alloc_slot(&self, now: u32) -> usize {
        if let Some(index) = self.entries.iter().position(|e| !e.valid) {
            return index;
        }

        // oldest by wrapping age, so a counter rollover does not invert the order
        self.entries
            .iter()
            .enumerate()
            .max_by_key(|(_, e)| e.age(now))
            .map(|(index, _)| index)
            .unwrap_or(0)
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}
