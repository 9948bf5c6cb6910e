// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-node protocol state and event dispatch
//!
//! One [`Node`] object holds everything the protocol needs on a device:
//! tree state, traffic control, the report aggregator, and (on the sink)
//! the topology table. The host feeds it received broadcast frames,
//! received unicast frames, and expired timers; each handler runs to
//! completion before the next is dispatched, so no locking is needed
//! anywhere.

use log::{debug, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::platform::{Callbacks, LinkLayer, Platform, RandomSource, TimerId, TimerService};
use crate::report::ReportAggregator;
use crate::topology::TopologyTable;
use crate::tree::{BeaconVerdict, TreeState};
use crate::wire::{Beacon, NodeId, PacketKind, TopologyFact};
use crate::{MAX_NODES, MAX_PATH_LENGTH, MAX_REPORT_FACTS};

/// Piggyback throttling state
#[derive(Debug, Clone, Copy, Default)]
pub struct TrafficControl {
    /// Packets originated since the last rate sample
    pub packet_counter: u16,
    /// Smoothed packets-per-sample-interval send rate
    pub packet_rate: u16,
    /// Packets that carried a piggybacked fact since the last parent change
    pub piggy_sent: u8,
}

/// Protocol event counters
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeStats {
    /// Beacons transmitted (originated or re-broadcast)
    pub beacons_sent: u32,
    /// Beacons that updated local tree state
    pub beacons_accepted: u32,
    /// Beacons dropped (weak signal, stale epoch, no improvement)
    pub beacons_rejected: u32,
    /// Upward data packets originated here
    pub data_sent: u32,
    /// Upward data packets forwarded toward the sink
    pub data_forwarded: u32,
    /// Upward data packets delivered to the application (sink only)
    pub data_delivered: u32,
    /// Topology facts attached to data packets here
    pub facts_piggybacked: u32,
    /// Topology facts absorbed into the table (sink only)
    pub facts_recorded: u32,
    /// Dedicated topology reports transmitted
    pub reports_sent: u32,
    /// Facts merged into a held batch instead of sent standalone
    pub reports_batched: u32,
    /// Dedicated reports skipped by the send-rate policy
    pub reports_suppressed: u32,
    /// Source-routed packets originated (sink only)
    pub sr_sent: u32,
    /// Source-routed packets forwarded along their path
    pub sr_forwarded: u32,
    /// Source-routed packets delivered to the application
    pub sr_delivered: u32,
    /// Frames dropped (malformed, misrouted, unroutable)
    pub frames_dropped: u32,
}

/// One node's protocol instance
///
/// Generic over the host platform, the application callbacks, and three
/// capacity budgets: `N_MAX` topology-table entries (sink), `L_MAX` path
/// entries per source-route header, `R_MAX` facts per report batch.
pub struct Node<
    P: Platform,
    C: Callbacks,
    const N_MAX: usize = MAX_NODES,
    const L_MAX: usize = MAX_PATH_LENGTH,
    const R_MAX: usize = MAX_REPORT_FACTS,
> {
    pub(crate) addr: NodeId,
    pub(crate) config: Config,
    pub(crate) platform: P,
    pub(crate) callbacks: C,
    pub(crate) tree: TreeState,
    pub(crate) traffic: TrafficControl,
    pub(crate) aggregator: ReportAggregator<R_MAX>,
    /// Present only on the sink
    pub(crate) topology: Option<TopologyTable<N_MAX>>,
    pub(crate) stats: NodeStats,
}

impl<P: Platform, C: Callbacks, const N_MAX: usize, const L_MAX: usize, const R_MAX: usize>
    Node<P, C, N_MAX, L_MAX, R_MAX>
{
    /// Open a protocol instance
    ///
    /// The sink arms its beacon timer immediately and starts originating
    /// the tree; ordinary nodes arm rate sampling and the randomized
    /// report refresh, then wait for a beacon.
    pub fn open(addr: NodeId, is_sink: bool, config: Config, platform: P, callbacks: C) -> Self {
        let mut node = Self {
            addr,
            config,
            platform,
            callbacks,
            tree: TreeState::new(is_sink),
            traffic: TrafficControl::default(),
            aggregator: ReportAggregator::new(),
            topology: is_sink.then(TopologyTable::new),
            stats: NodeStats::default(),
        };

        if is_sink {
            node.platform
                .schedule_once(TimerId::Beacon, node.config.beacon_startup_delay_ms);
        } else {
            node.platform
                .schedule_once(TimerId::RateSample, node.config.rate_sample_ms);
            let delay = node.refresh_delay();
            node.platform.schedule_once(TimerId::ReportRefresh, delay);
        }
        node
    }

    /// This node's link address
    pub const fn addr(&self) -> NodeId {
        self.addr
    }

    /// Whether this node is the sink
    pub const fn is_sink(&self) -> bool {
        self.tree.is_sink
    }

    /// Current parent (`NodeId::NULL` before joining)
    pub const fn parent(&self) -> NodeId {
        self.tree.parent
    }

    /// Current hop-count metric
    pub const fn metric(&self) -> u16 {
        self.tree.metric
    }

    /// Current tree epoch
    pub const fn epoch(&self) -> u16 {
        self.tree.epoch
    }

    /// Event counters
    pub const fn stats(&self) -> &NodeStats {
        &self.stats
    }

    /// Sink topology table, if this node is the sink
    pub fn topology(&self) -> Option<&TopologyTable<N_MAX>> {
        self.topology.as_ref()
    }

    /// Restart the tree: advance the epoch and beacon immediately
    ///
    /// Only the sink originates tree generations.
    pub fn restart_tree(&mut self) -> Result<()> {
        if !self.tree.is_sink {
            return Err(Error::NotSink);
        }
        self.tree.epoch = self.tree.epoch.wrapping_add(1);
        self.send_beacon();
        Ok(())
    }

    /// A broadcast frame arrived
    ///
    /// The broadcast channel carries only beacons; anything else is
    /// malformed. `rssi` is the link layer's signal-quality hint.
    pub fn on_broadcast_frame(&mut self, sender: NodeId, frame: &[u8], rssi: i16) {
        if self.tree.is_sink {
            // The sink originates the tree; beacons echoed back carry
            // nothing it needs.
            return;
        }

        let beacon = match Beacon::decode(frame) {
            Ok(b) => b,
            Err(_) => {
                warn!("broadcast of wrong size ({}) from {}", frame.len(), sender);
                self.stats.frames_dropped += 1;
                return;
            }
        };

        match self
            .tree
            .consider_beacon(&beacon, sender, rssi, self.config.rssi_floor)
        {
            BeaconVerdict::Accepted { parent_changed } => {
                self.stats.beacons_accepted += 1;
                debug!(
                    "beacon from {} accepted: epoch {} metric {}",
                    sender, self.tree.epoch, self.tree.metric
                );
                if parent_changed {
                    self.traffic.piggy_sent = 0;
                    self.emit_own_report();
                }
                // Re-broadcast the improved beacon after a randomized
                // delay so siblings hearing the same beacon do not all
                // transmit at once. A newer acceptance replaces any
                // pending re-broadcast.
                let jitter = self.config.forward_jitter_ms.max(1);
                let delay = u32::from(self.platform.random_u16()) % jitter;
                self.platform.cancel(TimerId::BeaconForward);
                self.platform.schedule_once(TimerId::BeaconForward, delay);
            }
            verdict => {
                self.stats.beacons_rejected += 1;
                debug!("beacon from {} rejected: {:?}", sender, verdict);
            }
        }
    }

    /// A unicast frame arrived; dispatch on the packet kind
    pub fn on_unicast_frame(&mut self, sender: NodeId, frame: &[u8]) {
        let kind = frame.first().copied().and_then(PacketKind::from_wire);
        match kind {
            Some(PacketKind::Data) => self.handle_data_frame(sender, frame),
            Some(PacketKind::Report) => self.handle_report_frame(sender, frame),
            Some(PacketKind::SourceRouted) => self.handle_source_routed_frame(sender, frame),
            None => {
                warn!("unicast with unrecognized kind from {}", sender);
                self.stats.frames_dropped += 1;
            }
        }
    }

    /// A timer armed by this node expired
    pub fn on_timer(&mut self, id: TimerId) {
        match id {
            TimerId::Beacon => {
                if !self.tree.is_sink {
                    return;
                }
                self.send_beacon();
                self.platform
                    .schedule_once(TimerId::Beacon, self.config.beacon_interval_ms);
            }
            TimerId::BeaconForward => {
                if self.tree.is_sink {
                    return;
                }
                self.send_beacon();
            }
            TimerId::ReportHold => self.on_report_hold_expired(),
            TimerId::ReportRefresh => {
                self.emit_own_report();
                let delay = self.refresh_delay();
                self.platform.schedule_once(TimerId::ReportRefresh, delay);
            }
            TimerId::RateSample => {
                let counter = self.traffic.packet_counter;
                self.traffic.packet_rate =
                    ((u32::from(self.traffic.packet_rate) * 7 + u32::from(counter)) / 8) as u16;
                self.traffic.packet_counter = 0;
                self.platform
                    .schedule_once(TimerId::RateSample, self.config.rate_sample_ms);
            }
        }
    }

    pub(crate) fn send_beacon(&mut self) {
        let beacon = Beacon {
            epoch: self.tree.epoch,
            metric: self.tree.metric,
        };
        let mut buf = [0u8; Beacon::SIZE];
        // Encoding into a 4-byte buffer cannot fail; the send may.
        if beacon.encode(&mut buf).is_ok() && self.platform.broadcast(&buf).is_ok() {
            self.stats.beacons_sent += 1;
        }
    }

    /// Whether the next packet may carry a piggybacked fact
    pub(crate) fn piggyback_allowed(&self) -> bool {
        self.traffic.piggy_sent < self.config.piggyback_cap
    }

    /// Whether dedicated reports are currently suppressed by send rate
    pub(crate) fn rate_suppressed(&self) -> bool {
        self.traffic.packet_rate >= self.config.suppression_threshold
    }

    /// This node's own topology fact
    pub(crate) fn own_fact(&self) -> TopologyFact {
        TopologyFact {
            node: self.addr,
            parent: self.tree.parent,
        }
    }

    /// Absorb one fact into the sink's table
    pub(crate) fn record_fact(&mut self, fact: TopologyFact) {
        let Some(table) = self.topology.as_mut() else {
            return;
        };
        match table.record(fact) {
            Ok(()) => self.stats.facts_recorded += 1,
            Err(e) => warn!("dropping fact {} -> {}: {}", fact.node, fact.parent, e),
        }
    }

    /// Randomized report refresh delay within the configured bounds
    pub(crate) fn refresh_delay(&mut self) -> u32 {
        let min = self.config.report_refresh_min_ms;
        let span = self.config.report_refresh_max_ms.saturating_sub(min);
        if span == 0 {
            return min;
        }
        min + u32::from(self.platform.random_u16()) % (span + 1)
    }
}
