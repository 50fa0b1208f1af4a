//! One storage class: its membership index and selectable groups.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use tierstore_core::{AffinityId, Block, BlockDescriptor, NodeDescriptor, NodeKey, TierId};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{RegistryError, RegistryResult};
use crate::group::TierGroup;
use crate::node::NodeQueue;
use crate::selection::SelectionPolicy;

/// Point-in-time counters for one tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierSummary {
    pub tier: TierId,
    pub nodes: usize,
    pub online_nodes: usize,
    pub free_blocks: usize,
    pub affinity_groups: usize,
}

pub struct StorageClassPool {
    tier: TierId,
    membership: DashMap<NodeKey, Arc<NodeQueue>>,
    affinity_groups: DashMap<AffinityId, Arc<TierGroup>>,
    any_group: TierGroup,
    policy: Arc<SelectionPolicy>,
}

impl StorageClassPool {
    pub fn new(tier: TierId, policy: Arc<SelectionPolicy>) -> Self {
        Self {
            tier,
            membership: DashMap::new(),
            affinity_groups: DashMap::new(),
            any_group: TierGroup::new(policy.clone()),
            policy,
        }
    }

    pub fn tier(&self) -> TierId {
        self.tier
    }

    /// Admit a node. Exactly one of any set of concurrent registrations of
    /// the same key wins; the rest get [`RegistryError::AlreadyRegistered`].
    pub fn register(&self, node: &NodeDescriptor) -> RegistryResult<Arc<NodeQueue>> {
        let key = node.key();
        let queue = match self.membership.entry(key) {
            Entry::Occupied(_) => return Err(RegistryError::AlreadyRegistered(key)),
            Entry::Vacant(slot) => {
                let queue = Arc::new(NodeQueue::from_descriptor(node));
                slot.insert(queue.clone());
                queue
            }
        };

        info!(
            node = %key,
            storage_type = node.storage_type,
            tier = self.tier,
            affinity = node.affinity,
            "adding storage node"
        );
        let group = self
            .affinity_groups
            .entry(node.affinity)
            .or_insert_with(|| Arc::new(TierGroup::new(self.policy.clone())))
            .value()
            .clone();
        group.add(queue.clone());
        self.any_group.add(queue.clone());
        Ok(queue)
    }

    /// Queue a block on its owner, admitting the owner first if needed.
    pub fn add_free_block(&self, block: &BlockDescriptor) -> Arc<NodeQueue> {
        let queue = self.member_or_register(&block.node);
        queue.touch();
        queue.add_free_block(block.region);
        queue
    }

    /// Look up `node`, registering it if absent. A lost registration race
    /// resolves to the winner's queue.
    pub(crate) fn member_or_register(&self, node: &NodeDescriptor) -> Arc<NodeQueue> {
        // Members are never removed, so a lost race is visible on the retry.
        loop {
            if let Some(queue) = self.node(node.key()) {
                return queue;
            }
            if let Ok(queue) = self.register(node) {
                return queue;
            }
        }
    }

    pub fn region_exists(&self, block: &BlockDescriptor) -> bool {
        self.node(block.node.key())
            .is_some_and(|queue| queue.region_exists(block.region.lba))
    }

    pub fn update_region(&self, block: &BlockDescriptor) -> RegistryResult<Arc<NodeQueue>> {
        let key = block.node.key();
        let queue = self.node(key).ok_or(RegistryError::UnknownNode {
            tier: self.tier,
            node: key,
        })?;
        if !queue.update_region(block.region) {
            return Err(RegistryError::UnknownRegion {
                node: key,
                lba: block.region.lba,
            });
        }
        Ok(queue)
    }

    /// Allocate a block, preferring the `affinity` group when one is named
    /// and falling back to the whole tier.
    pub fn allocate(
        &self,
        affinity: AffinityId,
        cancel: Option<&CancellationToken>,
    ) -> RegistryResult<Option<Block>> {
        if affinity != 0 {
            let group = self.affinity_groups.get(&affinity).map(|g| g.value().clone());
            match group {
                Some(group) => {
                    if let Some(block) = group.probe(cancel)? {
                        debug!(tier = self.tier, affinity, node = %block.node, "block from affinity group");
                        return Ok(Some(block));
                    }
                }
                None => warn!(tier = self.tier, affinity, "no affinity group, using whole tier"),
            }
        }
        let block = self.any_group.probe(cancel)?;
        debug!(tier = self.tier, affinity, found = block.is_some(), "probed whole tier");
        Ok(block)
    }

    pub fn node(&self, key: NodeKey) -> Option<Arc<NodeQueue>> {
        self.membership.get(&key).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.membership.len()
    }

    pub fn is_empty(&self) -> bool {
        self.membership.is_empty()
    }

    pub fn summary(&self) -> TierSummary {
        let mut online_nodes = 0;
        let mut free_blocks = 0;
        for entry in self.membership.iter() {
            if entry.is_online() {
                online_nodes += 1;
            }
            free_blocks += entry.free_block_count();
        }
        TierSummary {
            tier: self.tier,
            nodes: self.membership.len(),
            online_nodes,
            free_blocks,
            affinity_groups: self.affinity_groups.len(),
        }
    }
}
