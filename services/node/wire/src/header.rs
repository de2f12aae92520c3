//! Mesh envelope header.
//!
//! This module defines the 9-byte envelope prepended to every mesh-layer
//! frame. The router reads only this header; the application record that
//! follows it is opaque at this layer.

use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};

use crate::WireError;

/// Mesh envelope size in bytes
pub const MESH_HEADER_SIZE: usize = 9;

/// Destination id addressing every node in range
pub const BROADCAST_ID: u8 = 255;

/// Envelope kinds as defined in the mesh protocol
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeshKind {
    /// Application payload
    Data = 0,
    /// Route discovery request (flooded)
    RouteRequest = 1,
    /// Route discovery reply (unicast)
    RouteReply = 2,
    /// Broken link notification
    RouteError = 3,
    /// Single-hop neighbour beacon
    Beacon = 4,
}

impl TryFrom<u8> for MeshKind {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MeshKind::Data),
            1 => Ok(MeshKind::RouteRequest),
            2 => Ok(MeshKind::RouteReply),
            3 => Ok(MeshKind::RouteError),
            4 => Ok(MeshKind::Beacon),
            _ => Err(WireError::Kind(value)),
        }
    }
}

/// Mesh envelope (9 bytes, little-endian)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshHeader {
    /// Envelope kind
    pub kind: MeshKind,
    /// Originating node
    pub source: u8,
    /// Final destination (255 = broadcast)
    pub dest: u8,
    /// Node expected to relay this frame next
    pub next_hop: u8,
    /// Node that transmitted this copy of the frame
    pub prev_hop: u8,
    /// Hops travelled so far
    pub hop_count: u8,
    /// Hops remaining
    pub ttl: u8,
    /// Per-source sequence number
    pub sequence: u16,
}

impl MeshHeader {
    /// Create a header originating at `source` with no hops travelled
    pub fn new(kind: MeshKind, source: u8, dest: u8, sequence: u16) -> Self {
        Self {
            kind,
            source,
            dest,
            next_hop: BROADCAST_ID,
            prev_hop: source,
            hop_count: 0,
            ttl: 0,
            sequence,
        }
    }

    /// Whether the frame is addressed to every node
    pub fn is_broadcast(&self) -> bool {
        self.dest == BROADCAST_ID
    }

    /// Encode the header (little-endian)
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(self.kind as u8);
        buf.put_u8(self.source);
        buf.put_u8(self.dest);
        buf.put_u8(self.next_hop);
        buf.put_u8(self.prev_hop);
        buf.put_u8(self.hop_count);
        buf.put_u8(self.ttl);
        buf.put_u16_le(self.sequence);
    }

    /// Encode the header into a fixed array
    pub fn to_bytes(&self) -> [u8; MESH_HEADER_SIZE] {
        let mut out = [0u8; MESH_HEADER_SIZE];
        self.encode(&mut &mut out[..]);
        out
    }

    /// Decode the header from the front of `buf`
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < MESH_HEADER_SIZE {
            return Err(WireError::Incomplete {
                need: MESH_HEADER_SIZE,
                have: buf.len(),
            });
        }

        let mut buf = buf;
        let kind = MeshKind::try_from(buf.get_u8())?;

        Ok(Self {
            kind,
            source: buf.get_u8(),
            dest: buf.get_u8(),
            next_hop: buf.get_u8(),
            prev_hop: buf.get_u8(),
            hop_count: buf.get_u8(),
            ttl: buf.get_u8(),
            sequence: buf.get_u16_le(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mesh_kind_conversion() {
        assert_eq!(MeshKind::try_from(0).unwrap(), MeshKind::Data);
        assert_eq!(MeshKind::try_from(4).unwrap(), MeshKind::Beacon);
        assert_eq!(MeshKind::try_from(5), Err(WireError::Kind(5)));
    }

    #[test]
    fn test_header_layout() {
        let mut header = MeshHeader::new(MeshKind::RouteReply, 3, 7, 0x0201);
        header.next_hop = 4;
        header.hop_count = 2;
        header.ttl = 3;

        let bytes = header.to_bytes();
        assert_eq!(bytes, [2, 3, 7, 4, 3, 2, 3, 0x01, 0x02]);
        assert_eq!(MeshHeader::decode(&bytes).unwrap(), header);
    }

    #[test]
    fn test_decode_short_buffer() {
        let err = MeshHeader::decode(&[0u8; 8]).unwrap_err();
        assert_eq!(err, WireError::Incomplete { need: 9, have: 8 });
    }

    #[test]
    fn test_broadcast() {
        assert!(MeshHeader::new(MeshKind::Beacon, 1, BROADCAST_ID, 0).is_broadcast());
        assert!(!MeshHeader::new(MeshKind::Data, 1, 0, 0).is_broadcast());
    }
}
