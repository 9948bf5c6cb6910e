// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Upward data collection
//!
//! Application payloads travel hop by hop along the parent chain until
//! they reach the sink. Each hop may attach its own node -> parent fact
//! ahead of any facts already in the header (piggybacking), throttled so
//! steady-state traffic stops paying the overhead once the sink has very
//! likely learned the parent. The tree invariant keeps upward paths
//! loop-free, so hops are counted but not bounded here.

use log::warn;

use crate::buffer::PacketBuf;
use crate::error::{Error, Result};
use crate::node::Node;
use crate::platform::{Callbacks, LinkLayer, Platform};
use crate::wire::{DataHeader, NodeId, TopologyFact};

impl<P: Platform, C: Callbacks, const N_MAX: usize, const L_MAX: usize, const R_MAX: usize>
    Node<P, C, N_MAX, L_MAX, R_MAX>
{
    /// Send an application payload toward the sink
    ///
    /// Fails with [`Error::NoRoute`] before the node has joined a tree.
    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        if self.tree.parent.is_null() {
            return Err(Error::NoRoute);
        }

        let piggy = self.piggyback_allowed();
        let hdr = DataHeader {
            source: self.addr,
            hops: 0,
            piggy_len: u8::from(piggy),
        };

        let mut pb = PacketBuf::new();
        pb.set_payload(payload)?;
        let header_len = DataHeader::SIZE + if piggy { TopologyFact::SIZE } else { 0 };
        pb.grow_header(header_len)?;

        let mut fixed = [0u8; DataHeader::SIZE];
        hdr.encode(&mut fixed)?;
        pb.overwrite(0, &fixed)?;
        if piggy {
            let mut tmp = [0u8; TopologyFact::SIZE];
            self.own_fact().encode(&mut tmp)?;
            pb.overwrite(DataHeader::SIZE, &tmp)?;
            self.traffic.piggy_sent += 1;
            self.stats.facts_piggybacked += 1;
        }

        self.traffic.packet_counter += 1;
        self.platform.unicast(pb.frame(), self.tree.parent)?;
        self.stats.data_sent += 1;
        Ok(())
    }

    /// An upward data frame arrived
    pub(crate) fn handle_data_frame(&mut self, sender: NodeId, frame: &[u8]) {
        let hdr = match DataHeader::decode(frame) {
            Ok(h) => h,
            Err(_) => {
                warn!("malformed data frame from {}", sender);
                self.stats.frames_dropped += 1;
                return;
            }
        };
        let facts_len = TopologyFact::SIZE * usize::from(hdr.piggy_len);
        let header_len = DataHeader::SIZE + facts_len;
        if frame.len() < header_len {
            warn!(
                "data frame from {} truncates its {} piggybacked facts",
                sender, hdr.piggy_len
            );
            self.stats.frames_dropped += 1;
            return;
        }

        if self.tree.is_sink {
            self.deliver_upward(&hdr, frame, facts_len);
        } else {
            self.forward_upward(&hdr, sender, frame, header_len);
        }
    }

    /// Sink side: absorb piggybacked facts, hand the payload up
    fn deliver_upward(&mut self, hdr: &DataHeader, frame: &[u8], facts_len: usize) {
        let facts = &frame[DataHeader::SIZE..DataHeader::SIZE + facts_len];
        for chunk in facts.chunks_exact(TopologyFact::SIZE) {
            if let Ok(fact) = TopologyFact::decode(chunk) {
                self.record_fact(fact);
            }
        }
        let payload = &frame[DataHeader::SIZE + facts_len..];
        self.stats.data_delivered += 1;
        self.callbacks
            .recv(hdr.source, hdr.hops.saturating_add(1), payload);
    }

    /// Forwarder side: bump the hop count, optionally piggyback, relay
    fn forward_upward(&mut self, hdr: &DataHeader, sender: NodeId, frame: &[u8], header_len: usize) {
        if self.tree.parent.is_null() {
            warn!("data frame from {} but no parent to forward to", sender);
            self.stats.frames_dropped += 1;
            return;
        }

        // A frame already at the MTU forwards without our fact rather
        // than not at all.
        let piggy =
            self.piggyback_allowed() && frame.len() + TopologyFact::SIZE <= crate::MAX_FRAME;
        let mut pb = match PacketBuf::from_frame(frame, header_len) {
            Ok(pb) => pb,
            Err(_) => {
                self.stats.frames_dropped += 1;
                return;
            }
        };

        let updated = DataHeader {
            source: hdr.source,
            hops: hdr.hops.saturating_add(1),
            piggy_len: hdr.piggy_len.saturating_add(u8::from(piggy)),
        };

        let own = self.own_fact();
        let ok = (|| -> Result<()> {
            let mut fixed = [0u8; DataHeader::SIZE];
            if piggy {
                // Open space at the front, then lay the rewritten header
                // back down; our fact lands ahead of the pass-through
                // facts, which stay in place.
                pb.grow_header(TopologyFact::SIZE)?;
                updated.encode(&mut fixed)?;
                pb.overwrite(0, &fixed)?;
                let mut tmp = [0u8; TopologyFact::SIZE];
                own.encode(&mut tmp)?;
                pb.overwrite(DataHeader::SIZE, &tmp)?;
            } else {
                updated.encode(&mut fixed)?;
                pb.overwrite(0, &fixed)?;
            }
            Ok(())
        })();

        if ok.is_err() {
            self.stats.frames_dropped += 1;
            return;
        }
        if piggy {
            self.traffic.piggy_sent += 1;
            self.stats.facts_piggybacked += 1;
        }
        if self.platform.unicast(pb.frame(), self.tree.parent).is_ok() {
            self.stats.data_forwarded += 1;
        }
    }
}
