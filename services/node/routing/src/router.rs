//! Mesh router: per-frame routing decisions, envelope wrapping and beacons

use lss_wire::{MeshHeader, MeshKind, WireError, BROADCAST_ID, MESH_HEADER_SIZE};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, trace};

use crate::clock::Clock;
use crate::error::RoutingError;
use crate::table::{RouteTable, RouteUpdate};

/// Hop ceiling; frames that travelled this far are dropped
pub const MAX_HOPS: u8 = 5;

/// Minimum spacing between beacons
pub const BEACON_INTERVAL_MS: u32 = 30_000;

/// Reserved previous-hop value meaning "unknown"
const UNKNOWN_HOP: u8 = 0;

/// Routing decision for one inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingDecision<'a> {
    /// Frame is for this node; `payload` is the bytes after the envelope
    Deliver {
        /// Decoded envelope
        header: MeshHeader,
        /// Application payload, unchanged
        payload: &'a [u8],
    },
    /// Valid frame for someone else; the caller may forward or re-flood it
    NotMine(MeshHeader),
    /// Frame discarded
    Drop(DropReason),
}

impl RoutingDecision<'_> {
    /// Whether the payload should go to the application layer
    pub fn is_deliver(&self) -> bool {
        matches!(self, RoutingDecision::Deliver { .. })
    }
}

/// Reason for dropping a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropReason {
    /// Shorter than the envelope
    TooShort,
    /// Hop count at or past the ceiling
    HopLimit,
    /// Envelope kind not defined by the protocol
    UnknownKind(u8),
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::TooShort => write!(f, "frame shorter than mesh header"),
            DropReason::HopLimit => write!(f, "hop limit reached"),
            DropReason::UnknownKind(kind) => write!(f, "unknown mesh kind {}", kind),
        }
    }
}

/// Router statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterStats {
    /// Frames delivered to the application layer
    pub delivered: u64,
    /// Valid frames addressed elsewhere
    pub not_mine: u64,
    /// Frames dropped
    pub dropped: u64,
    /// Beacons heard from neighbours
    pub beacons_received: u64,
    /// Beacons emitted by `tick`
    pub beacons_sent: u64,
    /// Frames re-encoded by `forward`
    pub forwarded: u64,
    /// New route entries (inserts and replacements)
    pub routes_learned: u64,
    /// Entries invalidated by the stale sweep
    pub routes_expired: u64,
}

/// AODV-style mesh router owning a bounded route table
#[derive(Debug)]
pub struct MeshRouter<C: Clock> {
    node_id: u8,
    enabled: bool,
    table: RouteTable,
    sequence: u16,
    last_beacon: u32,
    clock: C,
    stats: RouterStats,
}

impl<C: Clock> MeshRouter<C> {
    /// Create a router for `node_id`; the beacon timer starts now
    pub fn new(node_id: u8, enabled: bool, clock: C) -> Self {
        let last_beacon = clock.now_ms();
        Self {
            node_id,
            enabled,
            table: RouteTable::new(),
            sequence: 0,
            last_beacon,
            clock,
            stats: RouterStats::default(),
        }
    }

    /// This node's id
    pub fn node_id(&self) -> u8 {
        self.node_id
    }

    /// Whether mesh mode is on
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Turn mesh mode on or off
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            info!(node_id = self.node_id, enabled, "Mesh mode changed");
        }
        self.enabled = enabled;
    }

    /// Route table, for inspection
    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Counters since construction
    pub fn stats(&self) -> &RouterStats {
        &self.stats
    }

    /// Decide what to do with one inbound frame.
    ///
    /// Every accepted frame teaches a route back to its source through the
    /// previous hop. Beacons only teach a direct route and are never
    /// delivered.
    pub fn receive<'a>(&mut self, frame: &'a [u8]) -> RoutingDecision<'a> {
        let decision = self.classify(frame);
        match &decision {
            RoutingDecision::Deliver { header, payload } => {
                self.stats.delivered += 1;
                debug!(
                    source = header.source,
                    kind = ?header.kind,
                    len = payload.len(),
                    "Delivering mesh frame"
                );
            }
            RoutingDecision::NotMine(header) => {
                self.stats.not_mine += 1;
                trace!(source = header.source, dest = header.dest, "Frame not for this node");
            }
            RoutingDecision::Drop(reason) => {
                self.stats.dropped += 1;
                debug!(%reason, "Dropping mesh frame");
            }
        }
        decision
    }

    fn classify<'a>(&mut self, frame: &'a [u8]) -> RoutingDecision<'a> {
        if frame.len() < MESH_HEADER_SIZE {
            return RoutingDecision::Drop(DropReason::TooShort);
        }

        // hop count sits at a fixed offset, so it is checked before the kind
        if frame[5] >= MAX_HOPS {
            return RoutingDecision::Drop(DropReason::HopLimit);
        }

        let header = match MeshHeader::decode(frame) {
            Ok(header) => header,
            Err(WireError::Kind(kind)) => return RoutingDecision::Drop(DropReason::UnknownKind(kind)),
            Err(_) => return RoutingDecision::Drop(DropReason::TooShort),
        };

        if header.prev_hop != UNKNOWN_HOP && header.prev_hop != BROADCAST_ID {
            self.update_route(header.source, header.prev_hop, header.hop_count);
        }

        let for_me = match header.kind {
            MeshKind::Beacon => {
                self.stats.beacons_received += 1;
                self.update_route(header.source, header.source, 1);
                false
            }
            MeshKind::RouteRequest => header.dest == self.node_id,
            _ => header.dest == self.node_id || header.is_broadcast(),
        };

        if for_me {
            RoutingDecision::Deliver {
                header,
                payload: &frame[MESH_HEADER_SIZE..],
            }
        } else {
            RoutingDecision::NotMine(header)
        }
    }

    /// Wrap `payload` in a data envelope addressed to `dest`.
    ///
    /// Returns the number of bytes written to `out`.
    pub fn wrap(&mut self, dest: u8, payload: &[u8], out: &mut [u8]) -> Result<usize, RoutingError> {
        let total = MESH_HEADER_SIZE + payload.len();
        if out.len() < total {
            return Err(RoutingError::BufferTooSmall {
                need: total,
                have: out.len(),
            });
        }

        let next_hop = if dest == BROADCAST_ID {
            BROADCAST_ID
        } else {
            self.next_hop_for(dest)
        };

        let header = MeshHeader {
            kind: MeshKind::Data,
            source: self.node_id,
            dest,
            next_hop,
            prev_hop: self.node_id,
            hop_count: 0,
            ttl: MAX_HOPS,
            sequence: self.next_sequence(),
        };

        out[..MESH_HEADER_SIZE].copy_from_slice(&header.to_bytes());
        out[MESH_HEADER_SIZE..total].copy_from_slice(payload);
        Ok(total)
    }

    /// Wrap `payload` into a freshly allocated frame
    pub fn wrap_to_vec(&mut self, dest: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![0u8; MESH_HEADER_SIZE + payload.len()];
        // the buffer is sized for envelope plus payload, so wrap cannot fail
        let written = self.wrap(dest, payload, &mut out).unwrap_or(0);
        out.truncate(written);
        out
    }

    /// Re-encode a frame that was not for this node so it can be relayed.
    ///
    /// Refuses frames that would reach the hop ceiling or have no ttl left.
    pub fn forward(
        &mut self,
        header: &MeshHeader,
        payload: &[u8],
        out: &mut [u8],
    ) -> Result<usize, RoutingError> {
        let hop_count = header.hop_count.saturating_add(1);
        if hop_count >= MAX_HOPS {
            return Err(RoutingError::HopLimit {
                hop_count: header.hop_count,
            });
        }
        if header.ttl <= 1 {
            return Err(RoutingError::TtlExhausted);
        }

        let total = MESH_HEADER_SIZE + payload.len();
        if out.len() < total {
            return Err(RoutingError::BufferTooSmall {
                need: total,
                have: out.len(),
            });
        }

        let next_hop = if header.is_broadcast() {
            BROADCAST_ID
        } else {
            self.next_hop_for(header.dest)
        };

        let relayed = MeshHeader {
            next_hop,
            prev_hop: self.node_id,
            hop_count,
            ttl: header.ttl - 1,
            ..*header
        };

        out[..MESH_HEADER_SIZE].copy_from_slice(&relayed.to_bytes());
        out[MESH_HEADER_SIZE..total].copy_from_slice(payload);
        self.stats.forwarded += 1;
        debug!(
            source = header.source,
            dest = header.dest,
            next_hop,
            hop_count,
            "Forwarding mesh frame"
        );
        Ok(total)
    }

    /// Periodic maintenance: sweep stale routes, then beacon if due.
    ///
    /// Returns the beacon envelope, or `None` when the interval has not yet
    /// elapsed since the last beacon (or construction).
    pub fn tick(&mut self) -> Option<[u8; MESH_HEADER_SIZE]> {
        self.evict_stale_routes();

        let now = self.clock.now_ms();
        if now.wrapping_sub(self.last_beacon) < BEACON_INTERVAL_MS {
            return None;
        }
        self.last_beacon = now;

        let header = MeshHeader {
            kind: MeshKind::Beacon,
            source: self.node_id,
            dest: BROADCAST_ID,
            next_hop: BROADCAST_ID,
            prev_hop: self.node_id,
            hop_count: 0,
            ttl: 1,
            sequence: self.next_sequence(),
        };
        self.stats.beacons_sent += 1;
        debug!(node_id = self.node_id, sequence = header.sequence, "Sending beacon");
        Some(header.to_bytes())
    }

    /// Insert or refresh the route to `dest`
    pub fn update_route(&mut self, dest: u8, next_hop: u8, hop_count: u8) {
        let now = self.clock.now_ms();
        match self.table.update(dest, next_hop, hop_count, now) {
            RouteUpdate::Refreshed => {}
            RouteUpdate::Inserted => {
                self.stats.routes_learned += 1;
                debug!(dest, next_hop, hop_count, "Learned route");
            }
            RouteUpdate::Replaced(evicted) => {
                self.stats.routes_learned += 1;
                debug!(dest, next_hop, hop_count, evicted, "Route table full, replaced oldest entry");
            }
        }
    }

    /// Next hop toward `dest`, or the broadcast id when no live route exists
    pub fn next_hop_for(&self, dest: u8) -> u8 {
        self.table
            .lookup(dest, self.clock.now_ms())
            .map(|entry| entry.next_hop)
            .unwrap_or(BROADCAST_ID)
    }

    /// Invalidate routes past the timeout, returning how many were swept
    pub fn evict_stale_routes(&mut self) -> usize {
        let evicted = self.table.evict_stale(self.clock.now_ms());
        if evicted > 0 {
            self.stats.routes_expired += evicted as u64;
            debug!(evicted, "Evicted stale routes");
        }
        evicted
    }

    /// Current sequence number, then advance; the first frame carries 0
    fn next_sequence(&mut self) -> u16 {
        let sequence = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);
        sequence
    }
}
