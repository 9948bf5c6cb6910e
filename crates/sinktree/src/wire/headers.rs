// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Unicast packet headers
//!
//! All three unicast traffic patterns share the first header byte (the
//! packet kind) so a receiver can dispatch before parsing further. Fields
//! are packed, multi-byte integers big-endian.

use super::types::{NodeId, PacketKind};
use crate::error::{Error, Result};

/// Upward data packet header
///
/// ```text
/// +------+-------+-------+------+----------+
/// | Kind | SrcHi | SrcLo | Hops | PiggyLen |
/// |  1B  |  1B   |  1B   |  1B  |    1B    |
/// +------+-------+-------+------+----------+
/// ```
///
/// Followed by `piggy_len` topology facts, then the application payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataHeader {
    /// Originating node (not the last forwarder)
    pub source: NodeId,
    /// Hops traversed so far (0 at the originator)
    pub hops: u8,
    /// Number of topology facts between header and payload
    pub piggy_len: u8,
}

impl DataHeader {
    /// Size of the fixed part in bytes
    pub const SIZE: usize = 5;

    /// Encode into a buffer, returning the bytes written
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.len() < Self::SIZE {
            return Err(Error::BufferTooSmall);
        }
        buf[0] = PacketKind::Data.to_wire();
        buf[1..3].copy_from_slice(self.source.as_bytes());
        buf[3] = self.hops;
        buf[4] = self.piggy_len;
        Ok(Self::SIZE)
    }

    /// Decode from the start of a frame
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::SIZE {
            return Err(Error::Malformed);
        }
        if PacketKind::from_wire(buf[0]) != Some(PacketKind::Data) {
            return Err(Error::Malformed);
        }
        Ok(Self {
            source: NodeId([buf[1], buf[2]]),
            hops: buf[3],
            piggy_len: buf[4],
        })
    }
}

/// Dedicated topology report header
///
/// ```text
/// +------+-------+
/// | Kind | Count |
/// |  1B  |  1B   |
/// +------+-------+
/// ```
///
/// Followed by `count` topology facts. Reports carry no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportHeader {
    /// Number of facts in this report
    pub count: u8,
}

impl ReportHeader {
    /// Size of the fixed part in bytes
    pub const SIZE: usize = 2;

    /// Encode into a buffer, returning the bytes written
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.len() < Self::SIZE {
            return Err(Error::BufferTooSmall);
        }
        buf[0] = PacketKind::Report.to_wire();
        buf[1] = self.count;
        Ok(Self::SIZE)
    }

    /// Decode from the start of a frame
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::SIZE {
            return Err(Error::Malformed);
        }
        if PacketKind::from_wire(buf[0]) != Some(PacketKind::Report) {
            return Err(Error::Malformed);
        }
        Ok(Self { count: buf[1] })
    }
}

/// Downward source-routed packet header
///
/// ```text
/// +------+------+---------+----------------------+
/// | Kind | Hops | PathLen | PathLen x NodeId ... |
/// |  1B  |  1B  |   1B    |       2B each        |
/// +------+------+---------+----------------------+
/// ```
///
/// Path entries are ordered so the next hop is always first; each hop
/// strips its own entry before re-transmitting. Payload follows the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceRouteHeader {
    /// Hops traversed so far (0 at the sink)
    pub hops: u8,
    /// Remaining path entries, including the final destination
    pub path_len: u8,
}

impl SourceRouteHeader {
    /// Size of the fixed part in bytes (path entries excluded)
    pub const SIZE: usize = 3;

    /// Total header size for a given remaining path length
    pub const fn size_with_path(path_len: u8) -> usize {
        Self::SIZE + NodeId::SIZE * path_len as usize
    }

    /// Encode the fixed part into a buffer, returning the bytes written
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.len() < Self::SIZE {
            return Err(Error::BufferTooSmall);
        }
        buf[0] = PacketKind::SourceRouted.to_wire();
        buf[1] = self.hops;
        buf[2] = self.path_len;
        Ok(Self::SIZE)
    }

    /// Decode the fixed part from the start of a frame
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::SIZE {
            return Err(Error::Malformed);
        }
        if PacketKind::from_wire(buf[0]) != Some(PacketKind::SourceRouted) {
            return Err(Error::Malformed);
        }
        Ok(Self {
            hops: buf[1],
            path_len: buf[2],
        })
    }
}
