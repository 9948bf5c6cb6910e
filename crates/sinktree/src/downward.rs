// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Downward source-routed delivery
//!
//! The sink embeds the full forwarding path in the header, computed from
//! its topology table. Each hop verifies it is the intended next hop,
//! strips its own entry, and relays to the new first entry; the last
//! entry is the destination. Per packet every outcome is terminal: a
//! frame is forwarded or delivered exactly once, with no retries at this
//! layer.

use log::error;

use crate::buffer::PacketBuf;
use crate::error::{Error, Result};
use crate::node::Node;
use crate::platform::{Callbacks, LinkLayer, Platform};
use crate::wire::{NodeId, SourceRouteHeader};

impl<P: Platform, C: Callbacks, const N_MAX: usize, const L_MAX: usize, const R_MAX: usize>
    Node<P, C, N_MAX, L_MAX, R_MAX>
{
    /// Send a payload from the sink down to one specific node
    ///
    /// Fails with [`Error::NotSink`] away from the sink and with
    /// [`Error::NoRoute`] when the topology table cannot produce a
    /// loop-free path within the header budget.
    pub fn sink_send(&mut self, dest: NodeId, payload: &[u8]) -> Result<()> {
        let table = self.topology.as_ref().ok_or(Error::NotSink)?;
        let path = table.reconstruct_path::<L_MAX>(dest).ok_or(Error::NoRoute)?;

        let hdr = SourceRouteHeader {
            hops: 0,
            path_len: path.len() as u8,
        };

        let mut pb = PacketBuf::new();
        pb.set_payload(payload)?;
        pb.grow_header(SourceRouteHeader::size_with_path(hdr.path_len))?;

        let mut fixed = [0u8; SourceRouteHeader::SIZE];
        hdr.encode(&mut fixed)?;
        pb.overwrite(0, &fixed)?;

        // Reconstruction yields destination-first; on the wire the next
        // hop leads, so the path is laid down reversed.
        for (i, node) in path.iter().rev().enumerate() {
            pb.overwrite(SourceRouteHeader::SIZE + NodeId::SIZE * i, node.as_bytes())?;
        }

        let next_hop = *path.last().ok_or(Error::NoRoute)?;
        self.platform.unicast(pb.frame(), next_hop)?;
        self.stats.sr_sent += 1;
        Ok(())
    }

    /// A source-routed frame arrived
    pub(crate) fn handle_source_routed_frame(&mut self, sender: NodeId, frame: &[u8]) {
        let hdr = match SourceRouteHeader::decode(frame) {
            Ok(h) => h,
            Err(_) => {
                self.stats.frames_dropped += 1;
                return;
            }
        };
        let header_len = SourceRouteHeader::size_with_path(hdr.path_len);
        if hdr.path_len == 0 || frame.len() < header_len {
            error!("source-routed frame from {} with broken path", sender);
            self.stats.frames_dropped += 1;
            return;
        }

        let first = match NodeId::decode(&frame[SourceRouteHeader::SIZE..]) {
            Ok(n) => n,
            Err(_) => {
                self.stats.frames_dropped += 1;
                return;
            }
        };
        if first != self.addr {
            // Misrouting or corrupted state upstream; this frame was
            // never meant to be here.
            error!(
                "source-routed frame from {} was meant for {}, dropping",
                sender, first
            );
            self.stats.frames_dropped += 1;
            return;
        }

        if hdr.path_len == 1 {
            let payload = &frame[header_len..];
            self.stats.sr_delivered += 1;
            self.callbacks.sr_recv(hdr.hops.saturating_add(1), payload);
            return;
        }

        match self.forward_downward(&hdr, frame, header_len) {
            Ok(()) => self.stats.sr_forwarded += 1,
            Err(_) => self.stats.frames_dropped += 1,
        }
    }

    /// Strip our path entry in place and relay to the new first entry
    fn forward_downward(
        &mut self,
        hdr: &SourceRouteHeader,
        frame: &[u8],
        header_len: usize,
    ) -> Result<()> {
        let mut pb = PacketBuf::from_frame(frame, header_len)?;

        // Drop our own entry from the front of the path, then rewrite
        // the fixed prefix over what remains.
        pb.shrink_header(NodeId::SIZE)?;
        let updated = SourceRouteHeader {
            hops: hdr.hops.saturating_add(1),
            path_len: hdr.path_len - 1,
        };
        let mut fixed = [0u8; SourceRouteHeader::SIZE];
        updated.encode(&mut fixed)?;
        pb.overwrite(0, &fixed)?;

        let next = NodeId::decode(&pb.header()[SourceRouteHeader::SIZE..])?;
        self.platform.unicast(pb.frame(), next)
    }
}
