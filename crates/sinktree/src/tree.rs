// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Tree state and beacon acceptance
//!
//! The spanning tree is built purely from periodic sink beacons: every
//! node remembers the epoch (tree generation) and its hop-count metric,
//! and adopts whichever neighbor last gave it a strictly better position.
//! [`TreeState::consider_beacon`] is the pure decision function; the
//! caller performs the side effects (re-broadcast scheduling, topology
//! reporting) based on the verdict.

use crate::wire::{Beacon, NodeId};

/// Metric value meaning "not connected to any tree"
pub const METRIC_DISCONNECTED: u16 = u16::MAX;

/// Outcome of processing one received beacon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeaconVerdict {
    /// Beacon adopted; local metric (and possibly parent) updated
    Accepted {
        /// The sender became this node's new parent
        parent_changed: bool,
    },
    /// Signal below the RSSI floor; too weak to serve as a parent link
    WeakSignal,
    /// Beacon from an older tree generation
    StaleEpoch,
    /// Same generation, but the offered position is not strictly better
    NoImprovement,
}

/// Per-node tree state
///
/// Mutated only by beacon reception (nodes) or owned outright by the
/// periodic beacon timer (sink: metric pinned to 0, epoch advanced only
/// on tree restart).
#[derive(Debug, Clone, Copy)]
pub struct TreeState {
    /// Current parent, `NodeId::NULL` until joined
    pub parent: NodeId,
    /// Hop count to the sink, [`METRIC_DISCONNECTED`] until joined
    pub metric: u16,
    /// Tree generation last seen (sink: last originated)
    pub epoch: u16,
    /// Whether this node is the sink
    pub is_sink: bool,
}

impl TreeState {
    /// Initial state
    ///
    /// The sink starts at epoch 1 so freshly booted nodes (epoch 0) adopt
    /// its very first beacon through the newer-epoch rule.
    pub fn new(is_sink: bool) -> Self {
        if is_sink {
            Self {
                parent: NodeId::NULL,
                metric: 0,
                epoch: 1,
                is_sink: true,
            }
        } else {
            Self {
                parent: NodeId::NULL,
                metric: METRIC_DISCONNECTED,
                epoch: 0,
                is_sink: false,
            }
        }
    }

    /// Whether this node currently has an upward route
    pub fn joined(&self) -> bool {
        self.is_sink || !self.parent.is_null()
    }

    /// Process one received beacon and update the tree state
    ///
    /// Acceptance rules, in order:
    /// 1. signal below `rssi_floor`: drop, no state change;
    /// 2. strictly newer epoch: adopt unconditionally (a new tree is
    ///    forming, metrics of the old tree are meaningless);
    /// 3. older epoch: drop;
    /// 4. same epoch: adopt only if the resulting metric would be a
    ///    strict improvement. Equal-metric alternatives never cause a
    ///    switch, so sibling ties stay with the first-seen parent and
    ///    produce no churn or duplicate reports.
    pub fn consider_beacon(
        &mut self,
        beacon: &Beacon,
        sender: NodeId,
        rssi: i16,
        rssi_floor: i16,
    ) -> BeaconVerdict {
        if rssi < rssi_floor {
            return BeaconVerdict::WeakSignal;
        }

        let offered = beacon.metric.saturating_add(1);

        if beacon.epoch > self.epoch {
            self.epoch = beacon.epoch;
        } else if beacon.epoch < self.epoch {
            return BeaconVerdict::StaleEpoch;
        } else if offered >= self.metric {
            return BeaconVerdict::NoImprovement;
        }

        self.metric = offered;
        let parent_changed = self.parent != sender;
        if parent_changed {
            self.parent = sender;
        }
        BeaconVerdict::Accepted { parent_changed }
    }
}
