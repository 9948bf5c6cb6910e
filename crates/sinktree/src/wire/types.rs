// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wire-level identifiers and the topology fact record

use core::fmt;

use crate::error::{Error, Result};

/// Link-layer node address (2 bytes)
///
/// Globally unique within one deployment. The all-zero value is the
/// "no address" sentinel; one well-known value designates the sink.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NodeId(pub [u8; 2]);

impl NodeId {
    /// Null address ("no parent", "unset")
    pub const NULL: Self = Self([0x00, 0x00]);

    /// Well-known sink address
    pub const SINK: Self = Self([0x01, 0x00]);

    /// Size of an address on the wire
    pub const SIZE: usize = 2;

    /// Create a new address
    pub const fn new(bytes: [u8; 2]) -> Self {
        Self(bytes)
    }

    /// Get raw bytes
    pub const fn as_bytes(&self) -> &[u8; 2] {
        &self.0
    }

    /// Check for the null sentinel
    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }

    /// Check for the well-known sink address
    pub fn is_sink(&self) -> bool {
        *self == Self::SINK
    }

    /// Decode an address from the start of a buffer
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::SIZE {
            return Err(Error::Malformed);
        }
        Ok(Self([buf[0], buf[1]]))
    }
}

impl From<[u8; 2]> for NodeId {
    fn from(bytes: [u8; 2]) -> Self {
        NodeId(bytes)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}:{:02x}", self.0[0], self.0[1])
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self)
    }
}

/// Unicast packet kind, carried as the first header byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    /// Upward application data, node to sink along the parent chain
    Data,
    /// Dedicated topology report, node to sink along the parent chain
    Report,
    /// Downward source-routed data, sink to one node
    SourceRouted,
}

impl PacketKind {
    /// Convert to the wire constant
    pub const fn to_wire(self) -> u8 {
        match self {
            PacketKind::Data => 0,
            PacketKind::Report => 2,
            PacketKind::SourceRouted => 3,
        }
    }

    /// Convert from the wire constant
    pub const fn from_wire(val: u8) -> Option<Self> {
        match val {
            0 => Some(PacketKind::Data),
            2 => Some(PacketKind::Report),
            3 => Some(PacketKind::SourceRouted),
            _ => None,
        }
    }
}

/// One node -> parent relation, the atomic unit of topology information
///
/// Produced whenever a node's parent changes (or by periodic refresh),
/// delivered to the sink by piggybacking or by dedicated reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopologyFact {
    /// The reporting node
    pub node: NodeId,
    /// That node's current parent
    pub parent: NodeId,
}

impl TopologyFact {
    /// Size of a fact on the wire
    pub const SIZE: usize = 4;

    /// Encode into a buffer, returning the bytes written
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.len() < Self::SIZE {
            return Err(Error::BufferTooSmall);
        }
        buf[0..2].copy_from_slice(self.node.as_bytes());
        buf[2..4].copy_from_slice(self.parent.as_bytes());
        Ok(Self::SIZE)
    }

    /// Decode from the start of a buffer
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::SIZE {
            return Err(Error::Malformed);
        }
        Ok(Self {
            node: NodeId([buf[0], buf[1]]),
            parent: NodeId([buf[2], buf[3]]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_sentinels() {
        assert!(NodeId::NULL.is_null());
        assert!(!NodeId::NULL.is_sink());
        assert!(NodeId::SINK.is_sink());
        assert!(!NodeId::SINK.is_null());
        assert_ne!(NodeId::NULL, NodeId::SINK);
    }

    #[test]
    fn test_node_id_decode_short() {
        assert_eq!(NodeId::decode(&[0x05]), Err(Error::Malformed));
        assert_eq!(NodeId::decode(&[0x05, 0x00]), Ok(NodeId([0x05, 0x00])));
    }

    #[test]
    fn test_packet_kind_wire_roundtrip() {
        for kind in [PacketKind::Data, PacketKind::Report, PacketKind::SourceRouted] {
            assert_eq!(PacketKind::from_wire(kind.to_wire()), Some(kind));
        }
        assert_eq!(PacketKind::from_wire(1), None);
        assert_eq!(PacketKind::from_wire(0xFF), None);
    }

    #[test]
    fn test_fact_encode_decode() {
        let fact = TopologyFact {
            node: NodeId([0x04, 0x00]),
            parent: NodeId([0x02, 0x00]),
        };
        let mut buf = [0u8; 8];
        assert_eq!(fact.encode(&mut buf).unwrap(), TopologyFact::SIZE);
        assert_eq!(TopologyFact::decode(&buf).unwrap(), fact);
    }

    #[test]
    fn test_fact_buffer_too_small() {
        let fact = TopologyFact {
            node: NodeId([0x04, 0x00]),
            parent: NodeId([0x02, 0x00]),
        };
        let mut buf = [0u8; 3];
        assert_eq!(fact.encode(&mut buf), Err(Error::BufferTooSmall));
    }
}
