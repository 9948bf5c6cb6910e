// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for sinktree

use core::fmt;

/// Result type for sinktree operations
pub type Result<T> = core::result::Result<T, Error>;

/// Error type for sinktree
///
/// Nothing in the protocol core is fatal: every error is either a dropped
/// frame or a synchronous failure returned to the immediate caller.
/// Recovery relies on protocol repetition (beacons are periodic, the
/// application retries sends), never on internal retry loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// No parent (node side) or no reconstructable path (sink side)
    NoRoute,

    /// Downward send attempted on a node that is not the sink
    NotSink,

    /// Topology table at capacity while inserting a new node
    TableFull,

    /// Topology fact names the null or sink address as its node
    InvalidFact,

    /// Frame has wrong length or unrecognized packet kind
    Malformed,

    /// Packet buffer too small for the requested operation
    BufferTooSmall,

    /// Reconstructed path exceeds the routing header budget
    PathTooLong,

    /// Link layer refused the transmission
    SendFailed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NoRoute => write!(f, "No route to destination"),
            Error::NotSink => write!(f, "Operation requires the sink"),
            Error::TableFull => write!(f, "Topology table full"),
            Error::InvalidFact => write!(f, "Invalid topology fact"),
            Error::Malformed => write!(f, "Malformed frame"),
            Error::BufferTooSmall => write!(f, "Buffer too small"),
            Error::PathTooLong => write!(f, "Path exceeds header budget"),
            Error::SendFailed => write!(f, "Link layer send failed"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
