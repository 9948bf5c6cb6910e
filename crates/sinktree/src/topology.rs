// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sink-side topology table and path reconstruction
//!
//! The sink absorbs node -> parent facts from piggybacked headers and
//! dedicated reports into a flat fixed-capacity map, then reconstructs
//! downward paths on demand by walking parent pointers backwards from the
//! destination. The walk is defensive: topology knowledge is eventually
//! consistent at best, so dangling parents and cycles are expected
//! failure modes, not corruption panics.

use heapless::Vec;
use log::error;

use crate::error::{Error, Result};
use crate::wire::{NodeId, TopologyFact};

/// Fixed-capacity node -> parent map, owned by the sink
///
/// At most one entry per node; recording an already-known node overwrites
/// its parent (last writer wins). Entries are never removed, only
/// superseded.
pub struct TopologyTable<const N: usize> {
    entries: Vec<TopologyFact, N>,
}

impl<const N: usize> TopologyTable<N> {
    /// Create an empty table
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Record one topology fact
    ///
    /// Overwrites the parent if `fact.node` is already known. Inserting a
    /// new node beyond capacity fails with [`Error::TableFull`]; updates
    /// of existing nodes never fail. Facts naming the null or sink
    /// address as the reporting node are rejected: the sink has no
    /// parent, and a null key could never be routed to.
    pub fn record(&mut self, fact: TopologyFact) -> Result<()> {
        if fact.node.is_null() || fact.node.is_sink() || fact.parent.is_null() {
            return Err(Error::InvalidFact);
        }
        if let Some(entry) = self.entries.iter_mut().find(|e| e.node == fact.node) {
            entry.parent = fact.parent;
            return Ok(());
        }
        self.entries.push(fact).map_err(|_| Error::TableFull)
    }

    /// Look up the recorded parent of `node`
    pub fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        self.entries
            .iter()
            .find(|e| e.node == node)
            .map(|e| e.parent)
    }

    /// Number of recorded nodes
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget everything (e.g. across a tree restart, if desired)
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Reconstruct the downward path to `dest`
    ///
    /// Walks parent pointers from `dest` until the sink is reached. The
    /// returned path holds `dest` first and the sink's direct child last;
    /// the sink itself is not included. Returns `None` when the walk hits
    /// a node with no recorded parent (incomplete knowledge), revisits a
    /// node (cycle from stale concurrent updates), or would exceed the
    /// `L` entry budget of the source-route header.
    pub fn reconstruct_path<const L: usize>(&self, dest: NodeId) -> Option<Vec<NodeId, L>> {
        let mut path: Vec<NodeId, L> = Vec::new();
        let mut cursor = dest;
        loop {
            if path.iter().any(|&n| n == cursor) {
                error!("path to {} loops at {}, topology data is stale", dest, cursor);
                return None;
            }
            if path.push(cursor).is_err() {
                error!("path to {} exceeds {} hops", dest, L);
                return None;
            }
            match self.parent_of(cursor) {
                None => return None,
                Some(parent) if parent.is_sink() => return Some(path),
                Some(parent) => cursor = parent,
            }
        }
    }
}

impl<const N: usize> Default for TopologyTable<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u8) -> NodeId {
        NodeId([n, 0x00])
    }

    fn fact(node: u8, parent: NodeId) -> TopologyFact {
        TopologyFact {
            node: id(node),
            parent,
        }
    }

    #[test]
    fn test_record_and_lookup() {
        let mut table: TopologyTable<8> = TopologyTable::new();
        table.record(fact(2, NodeId::SINK)).unwrap();
        assert_eq!(table.parent_of(id(2)), Some(NodeId::SINK));
        assert_eq!(table.parent_of(id(3)), None);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_record_overwrites_existing() {
        let mut table: TopologyTable<8> = TopologyTable::new();
        table.record(fact(2, NodeId::SINK)).unwrap();
        table.record(fact(2, id(5))).unwrap();
        assert_eq!(table.parent_of(id(2)), Some(id(5)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_full_on_new_key_only() {
        let mut table: TopologyTable<2> = TopologyTable::new();
        table.record(fact(2, NodeId::SINK)).unwrap();
        table.record(fact(3, NodeId::SINK)).unwrap();
        assert_eq!(table.record(fact(4, NodeId::SINK)), Err(Error::TableFull));

        // Updating a known node never fails, no matter how full.
        assert!(table.record(fact(3, id(2))).is_ok());
        assert_eq!(table.parent_of(id(3)), Some(id(2)));
    }

    #[test]
    fn test_rejects_degenerate_facts() {
        let mut table: TopologyTable<4> = TopologyTable::new();
        assert_eq!(
            table.record(TopologyFact {
                node: NodeId::NULL,
                parent: NodeId::SINK
            }),
            Err(Error::InvalidFact)
        );
        assert_eq!(
            table.record(TopologyFact {
                node: NodeId::SINK,
                parent: id(2)
            }),
            Err(Error::InvalidFact)
        );
        assert_eq!(
            table.record(TopologyFact {
                node: id(2),
                parent: NodeId::NULL
            }),
            Err(Error::InvalidFact)
        );
        assert!(table.is_empty());
    }

    #[test]
    fn test_path_one_hop() {
        let mut table: TopologyTable<8> = TopologyTable::new();
        table.record(fact(2, NodeId::SINK)).unwrap();
        let path = table.reconstruct_path::<4>(id(2)).unwrap();
        assert_eq!(path.as_slice(), &[id(2)]);
    }

    #[test]
    fn test_path_two_hops_dest_first() {
        let mut table: TopologyTable<8> = TopologyTable::new();
        table.record(fact(2, NodeId::SINK)).unwrap();
        table.record(fact(3, id(2))).unwrap();
        let path = table.reconstruct_path::<4>(id(3)).unwrap();
        assert_eq!(path.as_slice(), &[id(3), id(2)]);
    }

    #[test]
    fn test_path_unknown_destination() {
        let table: TopologyTable<8> = TopologyTable::new();
        assert!(table.reconstruct_path::<4>(id(9)).is_none());
    }

    #[test]
    fn test_path_dangling_parent() {
        let mut table: TopologyTable<8> = TopologyTable::new();
        // 3 -> 2, but 2's parent was never reported.
        table.record(fact(3, id(2))).unwrap();
        assert!(table.reconstruct_path::<4>(id(3)).is_none());
    }

    #[test]
    fn test_path_cycle_terminates() {
        let mut table: TopologyTable<8> = TopologyTable::new();
        table.record(fact(2, id(3))).unwrap();
        table.record(fact(3, id(2))).unwrap();
        assert!(table.reconstruct_path::<4>(id(2)).is_none());
    }

    #[test]
    fn test_path_self_parent_terminates() {
        let mut table: TopologyTable<8> = TopologyTable::new();
        table.record(fact(2, id(2))).unwrap();
        assert!(table.reconstruct_path::<4>(id(2)).is_none());
    }

    #[test]
    fn test_path_length_budget() {
        let mut table: TopologyTable<16> = TopologyTable::new();
        // Chain 5 -> 4 -> 3 -> 2 -> sink.
        table.record(fact(2, NodeId::SINK)).unwrap();
        table.record(fact(3, id(2))).unwrap();
        table.record(fact(4, id(3))).unwrap();
        table.record(fact(5, id(4))).unwrap();

        let path = table.reconstruct_path::<4>(id(5)).unwrap();
        assert_eq!(path.as_slice(), &[id(5), id(4), id(3), id(2)]);

        // Same chain, one entry less of budget: reconstruction fails.
        assert!(table.reconstruct_path::<3>(id(5)).is_none());
    }
}
