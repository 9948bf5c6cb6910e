// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Collaborator traits: link layer, timers, entropy, application callbacks
//!
//! The protocol core never touches a radio or a clock directly. The host
//! supplies one object implementing the three collaborator traits; the
//! core drives it from inside its event handlers and the host feeds
//! received frames and expired timers back in. All protocol logic runs to
//! completion inside those handlers on a single dispatch loop.

use crate::error::Result;
use crate::wire::NodeId;

/// One-shot protocol timers
///
/// Each variant is armed by the core via [`TimerService::schedule_once`];
/// the host calls `Node::on_timer` with the same variant when it expires.
/// Re-arming an already-armed timer replaces the outstanding one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerId {
    /// Sink's periodic beacon origination
    Beacon,
    /// Node's jittered beacon re-broadcast
    BeaconForward,
    /// Topology report hold window
    ReportHold,
    /// Periodic topology report refresh
    ReportRefresh,
    /// Send-rate sampling interval
    RateSample,
}

/// Broadcast/unicast transmit primitives
///
/// Sends are fire-and-forget: the link layer may drop, duplicate, or
/// reorder frames and the protocol tolerates all three.
pub trait LinkLayer {
    /// Broadcast a frame to all radio neighbors
    fn broadcast(&mut self, frame: &[u8]) -> Result<()>;

    /// Unicast a frame to one neighbor
    fn unicast(&mut self, frame: &[u8], dest: NodeId) -> Result<()>;
}

/// One-shot delayed-callback scheduling
pub trait TimerService {
    /// Arm `id` to fire once after `delay_ms` milliseconds
    fn schedule_once(&mut self, id: TimerId, delay_ms: u32);

    /// Stop an outstanding timer; a no-op if `id` is not armed
    fn cancel(&mut self, id: TimerId);
}

/// 16-bit random number source (beacon jitter, refresh spreading)
pub trait RandomSource {
    /// Next random value
    fn random_u16(&mut self) -> u16;
}

/// Everything the core needs from the host, as one object
pub trait Platform: LinkLayer + TimerService + RandomSource {}

impl<T: LinkLayer + TimerService + RandomSource> Platform for T {}

/// Application-layer delivery callbacks
pub trait Callbacks {
    /// Upward data arrived at the sink
    fn recv(&mut self, source: NodeId, hops: u8, payload: &[u8]);

    /// Downward source-routed data arrived at this node
    fn sr_recv(&mut self, hops: u8, payload: &[u8]);
}

/// Null platform (for testing)
///
/// Discards every frame, never schedules anything, and produces a fixed
/// pseudo-random stream.
pub struct NullLink {
    state: u16,
}

impl NullLink {
    /// Create a null platform
    pub const fn new() -> Self {
        Self { state: 0xACE1 }
    }
}

impl Default for NullLink {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkLayer for NullLink {
    fn broadcast(&mut self, _frame: &[u8]) -> Result<()> {
        Ok(())
    }

    fn unicast(&mut self, _frame: &[u8], _dest: NodeId) -> Result<()> {
        Ok(())
    }
}

impl TimerService for NullLink {
    fn schedule_once(&mut self, _id: TimerId, _delay_ms: u32) {}

    fn cancel(&mut self, _id: TimerId) {}
}

impl RandomSource for NullLink {
    fn random_u16(&mut self) -> u16 {
        // 16-bit Galois LFSR, good enough for jitter
        let lsb = self.state & 1;
        self.state >>= 1;
        if lsb != 0 {
            self.state ^= 0xB400;
        }
        self.state
    }
}

/// Silently drops all deliveries (forwarder-only nodes)
pub struct NullCallbacks;

impl Callbacks for NullCallbacks {
    fn recv(&mut self, _source: NodeId, _hops: u8, _payload: &[u8]) {}

    fn sr_recv(&mut self, _hops: u8, _payload: &[u8]) {}
}

#[cfg(test)]
pub(crate) mod testutil {
    //! Recording doubles shared by the unit tests
    extern crate std;

    use std::vec::Vec;

    use super::*;

    /// Records every transmission, timer operation, and delivery
    #[derive(Default)]
    pub struct RecordingPlatform {
        pub broadcasts: Vec<Vec<u8>>,
        pub unicasts: Vec<(NodeId, Vec<u8>)>,
        pub scheduled: Vec<(TimerId, u32)>,
        pub cancelled: Vec<TimerId>,
        pub fail_sends: bool,
        rng: u16,
    }

    impl RecordingPlatform {
        pub fn new() -> Self {
            Self {
                rng: 7,
                ..Self::default()
            }
        }
    }

    impl LinkLayer for RecordingPlatform {
        fn broadcast(&mut self, frame: &[u8]) -> Result<()> {
            if self.fail_sends {
                return Err(crate::Error::SendFailed);
            }
            self.broadcasts.push(frame.to_vec());
            Ok(())
        }

        fn unicast(&mut self, frame: &[u8], dest: NodeId) -> Result<()> {
            if self.fail_sends {
                return Err(crate::Error::SendFailed);
            }
            self.unicasts.push((dest, frame.to_vec()));
            Ok(())
        }
    }

    impl TimerService for RecordingPlatform {
        fn schedule_once(&mut self, id: TimerId, delay_ms: u32) {
            self.scheduled.push((id, delay_ms));
        }

        fn cancel(&mut self, id: TimerId) {
            self.cancelled.push(id);
        }
    }

    impl RandomSource for RecordingPlatform {
        fn random_u16(&mut self) -> u16 {
            self.rng = self.rng.wrapping_mul(31).wrapping_add(11);
            self.rng
        }
    }

    #[derive(Default)]
    pub struct RecordingCallbacks {
        pub upward: Vec<(NodeId, u8, Vec<u8>)>,
        pub downward: Vec<(u8, Vec<u8>)>,
    }

    impl Callbacks for RecordingCallbacks {
        fn recv(&mut self, source: NodeId, hops: u8, payload: &[u8]) {
            self.upward.push((source, hops, payload.to_vec()));
        }

        fn sr_recv(&mut self, hops: u8, payload: &[u8]) {
            self.downward.push((hops, payload.to_vec()));
        }
    }
}
