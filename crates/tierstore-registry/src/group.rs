//! Selectable groups of nodes within a tier.
//!
//! A group is either every node in a tier or the nodes of a tier sharing one
//! affinity. Probes take the read side of the group lock and never block one
//! another; joins take the write side.

use std::sync::Arc;

use parking_lot::RwLock;
use tierstore_core::Block;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::{RegistryError, RegistryResult};
use crate::node::NodeQueue;
use crate::selection::SelectionPolicy;

#[derive(Debug)]
pub struct TierGroup {
    members: RwLock<Vec<Arc<NodeQueue>>>,
    policy: Arc<SelectionPolicy>,
}

impl TierGroup {
    pub fn new(policy: Arc<SelectionPolicy>) -> Self {
        Self {
            members: RwLock::new(Vec::new()),
            policy,
        }
    }

    pub fn add(&self, node: Arc<NodeQueue>) {
        self.members.write().push(node);
    }

    pub fn len(&self) -> usize {
        self.members.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.read().is_empty()
    }

    /// Free blocks across every member, online or not.
    pub fn free_blocks(&self) -> usize {
        self.members
            .read()
            .iter()
            .map(|node| node.free_block_count())
            .sum()
    }

    /// Find a free block, starting at the policy's pick and walking the
    /// members circularly at most once. Offline and empty members are
    /// skipped.
    ///
    /// The token is checked before each candidate. A block is only popped
    /// once the caller is committed to receiving it.
    pub fn probe(&self, cancel: Option<&CancellationToken>) -> RegistryResult<Option<Block>> {
        let members = self.members.read();
        let size = members.len();
        let Some(start) = self.policy.next(size) else {
            return Ok(None);
        };

        for offset in 0..size {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                return Err(RegistryError::Cancelled);
            }
            let node = &members[(start + offset) % size];
            if !node.is_online() {
                trace!(node = %node.key(), "skipping offline node");
                continue;
            }
            if let Some(block) = node.take_free_block() {
                return Ok(Some(block));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use tierstore_core::{NodeDescriptor, NodePerformance, RegionDescriptor};

    fn node(id: u8, blocks: u64) -> Arc<NodeQueue> {
        let queue = NodeQueue::from_descriptor(&NodeDescriptor {
            storage_type: 0,
            tier: 1,
            affinity: 1,
            address: Ipv4Addr::new(10, 1, 0, id),
            port: 50020,
            performance: NodePerformance::default(),
        });
        for lba in 0..blocks {
            queue.add_free_block(RegionDescriptor {
                lba,
                addr: 0,
                length: 1,
                lkey: 0,
            });
        }
        Arc::new(queue)
    }

    fn group() -> TierGroup {
        TierGroup::new(Arc::new(SelectionPolicy::round_robin()))
    }

    #[test]
    fn empty_group_yields_nothing() {
        assert_eq!(group().probe(None), Ok(None));
    }

    #[test]
    fn round_robin_spreads_across_members() {
        let g = group();
        let a = node(1, 4);
        let b = node(2, 4);
        g.add(a.clone());
        g.add(b.clone());

        let first = g.probe(None).unwrap().unwrap();
        let second = g.probe(None).unwrap().unwrap();
        assert_eq!(first.node, a.key());
        assert_eq!(second.node, b.key());
        assert_eq!(g.free_blocks(), 6);
    }

    #[test]
    fn start_rotates_and_walks_past_offline() {
        let g = group();
        let a = node(1, 4);
        let b = node(2, 4);
        let c = node(3, 4);
        b.set_online(false);
        g.add(a.clone());
        g.add(b.clone());
        g.add(c.clone());

        // Starts 0, 1, 2, 0: the walk starting on `b` moves on to `c`.
        let served: Vec<_> = (0..4).map(|_| g.probe(None).unwrap().unwrap().node).collect();
        assert_eq!(served, vec![a.key(), c.key(), c.key(), a.key()]);
        assert_eq!(b.free_block_count(), 4);
    }

    #[test]
    fn skips_offline_and_empty_members() {
        let g = group();
        let offline = node(1, 4);
        offline.set_online(false);
        let empty = node(2, 0);
        let live = node(3, 1);
        g.add(offline);
        g.add(empty);
        g.add(live.clone());

        // Every start index reaches the one live block.
        let block = g.probe(None).unwrap().unwrap();
        assert_eq!(block.node, live.key());
        for _ in 0..6 {
            assert_eq!(g.probe(None), Ok(None));
        }
    }

    #[test]
    fn cancelled_probe_takes_nothing() {
        let g = group();
        let n = node(1, 2);
        g.add(n.clone());

        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_eq!(g.probe(Some(&cancel)), Err(RegistryError::Cancelled));
        assert_eq!(n.free_block_count(), 2);
    }
}
