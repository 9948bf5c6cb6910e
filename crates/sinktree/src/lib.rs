// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # sinktree - collection tree + source routing for lossy radio meshes
//!
//! A `no_std` protocol core for wireless sensor networks: many
//! battery-powered nodes report data upward to one sink over a spanning
//! tree built from periodic beacons, and the sink addresses packets back
//! down to any node by embedding a source route computed from its
//! topology table.
//!
//! ## Design Constraints
//!
//! - **No heap allocations** (const generics for every table and path)
//! - **Single dispatch loop** - all logic runs inside event handlers,
//!   no locks, no blocking
//! - **Lossy medium** - frames may be dropped, duplicated, or reordered;
//!   recovery is protocol repetition, never internal retries
//! - **`no_std` compatible** (enable `std` for host tooling)
//!
//! ## Architecture
//!
//! ```text
//! +-----------------------------------------+
//! |  Application (payloads, callbacks)      |
//! +-----------------------------------------+
//!           v                    ^
//! +-----------------------------------------+
//! |  Node (dispatch, tree state, traffic)   |
//! |   - upward forwarding + piggybacking    |
//! |   - downward source routing             |
//! |   - report aggregation (hold window)    |
//! |   - topology table (sink only)          |
//! +-----------------------------------------+
//!           v                    ^
//! +-----------------------------------------+
//! |  Wire formats (beacon, headers, facts)  |
//! +-----------------------------------------+
//!           v                    ^
//! +-----------------------------------------+
//! |  Host platform (radio, timers, RNG)     |
//! +-----------------------------------------+
//! ```
//!
//! The host owns the radio and the clock: it feeds received frames and
//! expired timers into a [`Node`] and implements the [`platform`] traits
//! for transmission and scheduling.

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

#[cfg(test)]
extern crate std;

/// Shared transmit/rewrite packet buffer
pub mod buffer;

/// Protocol configuration
pub mod config;

/// Error types
pub mod error;

/// Host collaborator traits (link layer, timers, entropy, callbacks)
pub mod platform;

/// Sink-side topology table and path reconstruction
pub mod topology;

/// Tree state and beacon acceptance
pub mod tree;

/// Wire formats
pub mod wire;

mod downward;
mod node;
mod report;
mod upward;

// Re-exports for convenience
pub use crate::buffer::PacketBuf;
pub use crate::config::Config;
pub use crate::error::{Error, Result};
pub use crate::node::{Node, NodeStats, TrafficControl};
pub use crate::platform::{
    Callbacks, LinkLayer, NullCallbacks, NullLink, Platform, RandomSource, TimerId, TimerService,
};
pub use crate::report::ReportAggregator;
pub use crate::topology::TopologyTable;
pub use crate::tree::{BeaconVerdict, TreeState, METRIC_DISCONNECTED};
pub use crate::wire::{
    Beacon, DataHeader, NodeId, PacketKind, ReportHeader, SourceRouteHeader, TopologyFact,
};

/// Maximum frame size (radio MTU)
pub const MAX_FRAME: usize = 128;

/// Default topology table capacity
pub const MAX_NODES: usize = 30;

/// Default source-route path budget
pub const MAX_PATH_LENGTH: usize = 10;

/// Default report batch capacity
pub const MAX_REPORT_FACTS: usize = 16;

/// Version of sinktree
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
