// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Topology report aggregation
//!
//! Dedicated reports carry node -> parent facts up the tree when
//! piggybacking is unavailable or the fact is urgent (a parent just
//! changed). Forwarding nodes do not relay each report as it arrives:
//! the first one opens a short hold window and later facts are merged
//! into the same batch, which goes out as a single unicast when the hold
//! expires. Bursts of parent changes (typical right after a tree
//! restart) collapse into one packet per hop, at the cost of the hold
//! window in upward latency.

use heapless::Vec;
use log::{debug, warn};

use crate::buffer::PacketBuf;
use crate::node::Node;
use crate::platform::{Callbacks, LinkLayer, Platform, TimerId, TimerService};
use crate::wire::{NodeId, ReportHeader, TopologyFact};

/// Report batching state for one node
pub struct ReportAggregator<const R: usize> {
    pub(crate) pending: Vec<TopologyFact, R>,
    pub(crate) hold_open: bool,
}

impl<const R: usize> ReportAggregator<R> {
    /// Create an idle aggregator
    pub const fn new() -> Self {
        Self {
            pending: Vec::new(),
            hold_open: false,
        }
    }

    /// Whether a hold window is currently open
    pub const fn hold_open(&self) -> bool {
        self.hold_open
    }

    /// Whether the batch already carries a fact for `node`
    pub fn contains(&self, node: NodeId) -> bool {
        self.pending.iter().any(|f| f.node == node)
    }

    /// Merge one fact into the batch
    ///
    /// An existing fact for the same node is overwritten (last writer
    /// wins within the batch). Returns `false` when the batch is full
    /// and the fact is new.
    pub fn merge(&mut self, fact: TopologyFact) -> bool {
        if let Some(entry) = self.pending.iter_mut().find(|f| f.node == fact.node) {
            entry.parent = fact.parent;
            return true;
        }
        self.pending.push(fact).is_ok()
    }
}

impl<const R: usize> Default for ReportAggregator<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Platform, C: Callbacks, const N_MAX: usize, const L_MAX: usize, const R_MAX: usize>
    Node<P, C, N_MAX, L_MAX, R_MAX>
{
    /// Announce this node's own parent, subject to the rate policy
    ///
    /// Called on parent change and from the periodic refresh timer. When
    /// the smoothed send rate is at or above the suppression threshold
    /// the dedicated report is skipped: upward data is flowing often
    /// enough that piggybacking will deliver the fact shortly.
    pub(crate) fn emit_own_report(&mut self) {
        if self.tree.is_sink || self.tree.parent.is_null() {
            return;
        }
        if self.rate_suppressed() {
            self.stats.reports_suppressed += 1;
            debug!("dedicated report suppressed, rate {}", self.traffic.packet_rate);
            return;
        }
        let own = self.own_fact();
        if self.aggregator.hold_open {
            self.queue_fact(own);
            self.stats.reports_batched += 1;
        } else {
            self.queue_fact(own);
            self.flush_report_batch();
        }
    }

    /// A dedicated topology report arrived from a downstream node
    pub(crate) fn handle_report_frame(&mut self, sender: NodeId, frame: &[u8]) {
        let hdr = match ReportHeader::decode(frame) {
            Ok(h) => h,
            Err(_) => {
                warn!("malformed report from {}", sender);
                self.stats.frames_dropped += 1;
                return;
            }
        };
        let expected = ReportHeader::SIZE + TopologyFact::SIZE * usize::from(hdr.count);
        if frame.len() != expected {
            warn!(
                "report from {} declares {} facts but is {} bytes",
                sender,
                hdr.count,
                frame.len()
            );
            self.stats.frames_dropped += 1;
            return;
        }
        let facts = &frame[ReportHeader::SIZE..];

        if self.tree.is_sink {
            for chunk in facts.chunks_exact(TopologyFact::SIZE) {
                if let Ok(fact) = TopologyFact::decode(chunk) {
                    self.record_fact(fact);
                }
            }
            return;
        }

        if self.tree.parent.is_null() {
            warn!("report from {} but no parent to forward to", sender);
            self.stats.frames_dropped += 1;
            return;
        }

        // First report opens the hold window; anything arriving while it
        // is open joins the same outgoing batch.
        if !self.aggregator.hold_open {
            self.aggregator.hold_open = true;
            self.platform.cancel(TimerId::ReportHold);
            self.platform
                .schedule_once(TimerId::ReportHold, self.config.report_hold_ms);
        }

        for chunk in facts.chunks_exact(TopologyFact::SIZE) {
            if let Ok(fact) = TopologyFact::decode(chunk) {
                self.queue_fact(fact);
            }
        }

        // This node's own fact rides along once per batch.
        let own = self.own_fact();
        if !self.aggregator.contains(own.node) {
            self.queue_fact(own);
            self.stats.reports_batched += 1;
        }
    }

    /// The hold window expired: forward the accumulated batch
    pub(crate) fn on_report_hold_expired(&mut self) {
        self.aggregator.hold_open = false;
        self.flush_report_batch();
    }

    /// Merge a fact, flushing first if the batch is full
    ///
    /// Overflow never drops facts: the full batch goes out immediately
    /// and the fact seeds the next one.
    fn queue_fact(&mut self, fact: TopologyFact) {
        if self.aggregator.merge(fact) {
            return;
        }
        self.flush_report_batch();
        let _ = self.aggregator.merge(fact);
    }

    /// Encode the pending batch as one report and unicast it upward
    fn flush_report_batch(&mut self) {
        if self.aggregator.pending.is_empty() || self.tree.parent.is_null() {
            return;
        }
        let count = self.aggregator.pending.len();
        let hdr = ReportHeader { count: count as u8 };

        let mut pb = PacketBuf::new();
        let mut ok = pb
            .grow_header(ReportHeader::SIZE + TopologyFact::SIZE * count)
            .is_ok();
        let mut tmp = [0u8; TopologyFact::SIZE];
        if ok {
            let mut fixed = [0u8; ReportHeader::SIZE];
            ok = hdr.encode(&mut fixed).is_ok() && pb.overwrite(0, &fixed).is_ok();
        }
        if ok {
            for (i, fact) in self.aggregator.pending.iter().enumerate() {
                if fact.encode(&mut tmp).is_err()
                    || pb
                        .overwrite(ReportHeader::SIZE + TopologyFact::SIZE * i, &tmp)
                        .is_err()
                {
                    ok = false;
                    break;
                }
            }
        }

        if ok && self.platform.unicast(pb.frame(), self.tree.parent).is_ok() {
            self.stats.reports_sent += 1;
        }
        self.aggregator.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::config::Config;
    use crate::node::Node;
    use crate::platform::testutil::{RecordingCallbacks, RecordingPlatform};
    use crate::wire::{Beacon, PacketKind};

    type TestNode = Node<RecordingPlatform, RecordingCallbacks, 8, 4, 4>;

    fn id(n: u8) -> NodeId {
        NodeId([n, 0x00])
    }

    fn joined_node(addr: u8, parent: NodeId) -> TestNode {
        let mut n = Node::open(
            id(addr),
            false,
            Config::default(),
            RecordingPlatform::new(),
            RecordingCallbacks::default(),
        );
        let mut frame = [0u8; Beacon::SIZE];
        Beacon { epoch: 1, metric: 1 }.encode(&mut frame).unwrap();
        n.on_broadcast_frame(parent, &frame, -60);
        n
    }

    fn sink() -> TestNode {
        Node::open(
            NodeId::SINK,
            true,
            Config::default(),
            RecordingPlatform::new(),
            RecordingCallbacks::default(),
        )
    }

    fn report_frame(facts: &[TopologyFact]) -> std::vec::Vec<u8> {
        let mut frame = std::vec![
            PacketKind::Report.to_wire(),
            facts.len() as u8
        ];
        for fact in facts {
            let mut tmp = [0u8; TopologyFact::SIZE];
            fact.encode(&mut tmp).unwrap();
            frame.extend_from_slice(&tmp);
        }
        frame
    }

    fn decode_report(frame: &[u8]) -> std::vec::Vec<TopologyFact> {
        let hdr = ReportHeader::decode(frame).unwrap();
        let mut facts = std::vec::Vec::new();
        for chunk in frame[ReportHeader::SIZE..].chunks_exact(TopologyFact::SIZE) {
            facts.push(TopologyFact::decode(chunk).unwrap());
        }
        assert_eq!(facts.len(), usize::from(hdr.count));
        facts
    }

    #[test]
    fn test_parent_change_sends_dedicated_report() {
        let n = joined_node(5, id(2));
        // Joining counts as a parent change, so one report went out.
        assert_eq!(n.platform.unicasts.len(), 1);
        let (dest, frame) = &n.platform.unicasts[0];
        assert_eq!(*dest, id(2));
        let facts = decode_report(frame);
        assert_eq!(
            facts.as_slice(),
            &[TopologyFact {
                node: id(5),
                parent: id(2)
            }]
        );
        assert_eq!(n.stats().reports_sent, 1);
    }

    #[test]
    fn test_suppressed_when_rate_high() {
        let mut n = Node::<RecordingPlatform, RecordingCallbacks, 8, 4, 4>::open(
            id(5),
            false,
            Config::default(),
            RecordingPlatform::new(),
            RecordingCallbacks::default(),
        );
        n.traffic.packet_rate = 3; // above threshold
        let mut frame = [0u8; Beacon::SIZE];
        Beacon { epoch: 1, metric: 1 }.encode(&mut frame).unwrap();
        n.on_broadcast_frame(id(2), &frame, -60);

        assert!(n.platform.unicasts.is_empty());
        assert_eq!(n.stats().reports_suppressed, 1);
    }

    #[test]
    fn test_forwarder_batches_during_hold() {
        let mut n = joined_node(5, id(2));
        n.platform.unicasts.clear();

        let child_a = TopologyFact {
            node: id(7),
            parent: id(5),
        };
        let child_b = TopologyFact {
            node: id(8),
            parent: id(5),
        };

        // First report opens the hold: nothing forwarded yet.
        n.on_unicast_frame(id(7), &report_frame(&[child_a]));
        assert!(n.platform.unicasts.is_empty());
        assert!(n.aggregator.hold_open());
        assert!(n
            .platform
            .scheduled
            .iter()
            .any(|(tid, _)| *tid == TimerId::ReportHold));

        // Second report during the hold joins the same batch.
        n.on_unicast_frame(id(8), &report_frame(&[child_b]));
        assert!(n.platform.unicasts.is_empty());

        // Hold expiry flushes one combined report: both children plus
        // this node's own fact.
        n.on_timer(TimerId::ReportHold);
        assert_eq!(n.platform.unicasts.len(), 1);
        let (dest, frame) = &n.platform.unicasts[0];
        assert_eq!(*dest, id(2));
        let facts = decode_report(frame);
        assert!(facts.contains(&child_a));
        assert!(facts.contains(&child_b));
        assert!(facts.contains(&TopologyFact {
            node: id(5),
            parent: id(2)
        }));
        assert!(!n.aggregator.hold_open());
    }

    #[test]
    fn test_own_fact_not_duplicated_in_batch() {
        let mut n = joined_node(5, id(2));
        n.platform.unicasts.clear();

        // A child relays a batch that already carries our fact.
        let stale_own = TopologyFact {
            node: id(5),
            parent: id(9),
        };
        n.on_unicast_frame(id(7), &report_frame(&[stale_own]));
        n.on_timer(TimerId::ReportHold);

        let facts = decode_report(&n.platform.unicasts[0].1);
        let ours: std::vec::Vec<_> = facts.iter().filter(|f| f.node == id(5)).collect();
        assert_eq!(ours.len(), 1);
    }

    #[test]
    fn test_batch_overflow_flushes_immediately() {
        // R_MAX = 4: the fifth distinct fact forces an immediate flush.
        let mut n = joined_node(5, id(2));
        n.platform.unicasts.clear();

        let facts: std::vec::Vec<TopologyFact> = (10u8..15)
            .map(|i| TopologyFact {
                node: id(i),
                parent: id(5),
            })
            .collect();
        n.on_unicast_frame(id(7), &report_frame(&facts));

        // One full batch went out during the hold; the rest waits.
        assert_eq!(n.platform.unicasts.len(), 1);
        assert_eq!(decode_report(&n.platform.unicasts[0].1).len(), 4);

        n.on_timer(TimerId::ReportHold);
        assert_eq!(n.platform.unicasts.len(), 2);
        let late = decode_report(&n.platform.unicasts[1].1);
        assert!(!late.is_empty());
    }

    #[test]
    fn test_sink_absorbs_report_facts() {
        let mut s = sink();
        let facts = [
            TopologyFact {
                node: id(2),
                parent: NodeId::SINK,
            },
            TopologyFact {
                node: id(3),
                parent: id(2),
            },
        ];
        s.on_unicast_frame(id(2), &report_frame(&facts));

        let table = s.topology().unwrap();
        assert_eq!(table.parent_of(id(2)), Some(NodeId::SINK));
        assert_eq!(table.parent_of(id(3)), Some(id(2)));
        assert_eq!(s.stats().facts_recorded, 2);
        // The sink forwards nothing.
        assert!(s.platform.unicasts.is_empty());
    }

    #[test]
    fn test_report_length_mismatch_dropped() {
        let mut s = sink();
        let mut frame = report_frame(&[TopologyFact {
            node: id(2),
            parent: NodeId::SINK,
        }]);
        frame[1] = 3; // claims 3 facts, carries 1
        s.on_unicast_frame(id(2), &frame);
        assert_eq!(s.stats().frames_dropped, 1);
        assert_eq!(s.stats().facts_recorded, 0);
    }

    #[test]
    fn test_refresh_timer_reports_and_rearms() {
        let mut n = joined_node(5, id(2));
        n.platform.unicasts.clear();
        n.platform.scheduled.clear();

        n.on_timer(TimerId::ReportRefresh);
        assert_eq!(n.platform.unicasts.len(), 1);
        let (id_, delay) = n.platform.scheduled[0];
        assert_eq!(id_, TimerId::ReportRefresh);
        let config = Config::default();
        assert!(delay >= config.report_refresh_min_ms);
        assert!(delay <= config.report_refresh_max_ms);
    }
}
