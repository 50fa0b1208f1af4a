//! BlockRegistry: the entry point the metadata RPC layer calls into.
//!
//! Routes registrations and region updates to the addressed storage class,
//! answers allocations (directly, through the tier scheduler, or by scanning
//! every tier), and keeps the scheduler's view of each node current after
//! every mutation.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tierstore_core::config::TierStoreConfig;
use tierstore_core::{
    AffinityId, Block, BlockDescriptor, CostModel, LinearCostModel, NodeDescriptor, NodeKey,
    NodeStatistics, RegionDescriptor, SchedulerKind, TierId,
};
use tierstore_scheduler::{Scheduler, SchedulerSample, build_scheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{RegistryError, RegistryResult};
use crate::node::NodeQueue;
use crate::pool::{StorageClassPool, TierSummary};
use crate::selection::SelectionPolicy;

/// An allocation request as decoded by the RPC layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AllocationRequest {
    /// Requested storage class; 0 leaves the choice to the registry.
    pub tier: TierId,
    /// Requested locality group; 0 means no preference.
    pub affinity: AffinityId,
    /// Expected request size, used by the value-maximizing scheduler.
    pub size_hint: f64,
}

impl AllocationRequest {
    pub fn unconstrained(size_hint: f64) -> Self {
        Self {
            tier: 0,
            affinity: 0,
            size_hint,
        }
    }
}

pub struct BlockRegistry {
    pools: Vec<StorageClassPool>,
    /// Every scheduler read and write goes through this one lock.
    scheduler: Mutex<Box<dyn Scheduler>>,
}

impl BlockRegistry {
    /// Build a registry with the default linear cost model.
    pub fn new(config: &TierStoreConfig) -> Self {
        let cost = Arc::new(LinearCostModel::from_config(&config.cost));
        Self::with_cost_model(config, cost)
    }

    pub fn with_cost_model(config: &TierStoreConfig, cost: Arc<dyn CostModel>) -> Self {
        let scheduler = build_scheduler(&config.scheduler, cost, config.storage.block_size);
        Self::with_scheduler(config, scheduler)
    }

    pub fn with_scheduler(config: &TierStoreConfig, scheduler: Box<dyn Scheduler>) -> Self {
        let policy = Arc::new(SelectionPolicy::from_kind(config.selection.kind()));
        let pools = (0..config.storage.tiers.max(1))
            .map(|tier| StorageClassPool::new(tier, policy.clone()))
            .collect();
        info!(
            tiers = config.storage.tiers,
            scheduler = %scheduler.kind(),
            "block registry ready"
        );
        Self {
            pools,
            scheduler: Mutex::new(scheduler),
        }
    }

    pub fn tiers(&self) -> u32 {
        self.pools.len() as u32
    }

    pub fn scheduler_kind(&self) -> SchedulerKind {
        self.scheduler.lock().kind()
    }

    pub fn scheduler_samples(&self) -> Vec<SchedulerSample> {
        self.scheduler.lock().samples()
    }

    fn pool(&self, tier: TierId) -> RegistryResult<&StorageClassPool> {
        self.pools
            .get(tier as usize)
            .ok_or(RegistryError::InvalidTier {
                tier,
                tiers: self.tiers(),
            })
    }

    /// The snapshot is taken under the scheduler lock, so racing refreshes
    /// of one node land in the order they observed its queue.
    fn refresh_scheduler(&self, node: &NodeQueue) {
        let mut scheduler = self.scheduler.lock();
        scheduler.update(&node.snapshot());
    }

    // ── Membership ─────────────────────────────────────────────────

    /// Explicitly admit a node with no blocks yet. A second registration of
    /// the same node fails with [`RegistryError::AlreadyRegistered`]; further
    /// capacity must arrive through [`Self::add_block`] or region updates.
    pub fn register_node(&self, node: &NodeDescriptor) -> RegistryResult<NodeKey> {
        let queue = self.pool(node.tier)?.register(node)?;
        Ok(queue.key())
    }

    /// Register one free block, admitting its node if needed.
    pub fn add_block(&self, block: &BlockDescriptor) -> RegistryResult<()> {
        let pool = self.pool(block.node.tier)?;
        debug!(node = %block.node.key(), tier = block.node.tier, lba = block.region.lba, "add block");
        let queue = pool.add_free_block(block);
        self.refresh_scheduler(&queue);
        Ok(())
    }

    /// Register a batch of free blocks for one node. The scheduler sees the
    /// node once, after the whole batch, so its initial capacity is the
    /// batch size rather than one block.
    pub fn add_blocks(
        &self,
        node: &NodeDescriptor,
        regions: impl IntoIterator<Item = RegionDescriptor>,
    ) -> RegistryResult<usize> {
        let pool = self.pool(node.tier)?;
        let queue = pool.member_or_register(node);
        queue.touch();
        let mut added = 0;
        for region in regions {
            queue.add_free_block(region);
            added += 1;
        }
        debug!(node = %queue.key(), tier = node.tier, added, "add blocks");
        self.refresh_scheduler(&queue);
        Ok(added)
    }

    pub fn region_exists(&self, block: &BlockDescriptor) -> bool {
        self.pool(block.node.tier)
            .is_ok_and(|pool| pool.region_exists(block))
    }

    pub fn update_region(&self, block: &BlockDescriptor) -> RegistryResult<()> {
        let queue = self.pool(block.node.tier)?.update_region(block)?;
        self.refresh_scheduler(&queue);
        Ok(())
    }

    /// Apply a node's periodic statistics report.
    pub fn update_statistics(
        &self,
        node: &NodeDescriptor,
        stats: &NodeStatistics,
    ) -> RegistryResult<()> {
        let queue = self.registered(node)?;
        let drift = queue.update_statistics(stats);
        if drift != 0 {
            warn!(
                node = %queue.key(),
                reported = stats.free_block_count,
                queued = queue.free_block_count(),
                "reported free blocks disagree with the registry"
            );
        }
        queue.touch();
        self.refresh_scheduler(&queue);
        Ok(())
    }

    /// Take a node out of (or back into) allocation. Offline nodes keep
    /// their blocks and registration.
    pub fn set_online(&self, node: &NodeDescriptor, online: bool) -> RegistryResult<()> {
        let queue = self.registered(node)?;
        queue.set_online(online);
        info!(node = %queue.key(), tier = node.tier, online, "node availability changed");
        self.refresh_scheduler(&queue);
        Ok(())
    }

    pub fn node(&self, node: &NodeDescriptor) -> Option<Arc<NodeQueue>> {
        self.pools.get(node.tier as usize)?.node(node.key())
    }

    fn registered(&self, node: &NodeDescriptor) -> RegistryResult<Arc<NodeQueue>> {
        self.pool(node.tier)?
            .node(node.key())
            .ok_or(RegistryError::UnknownNode {
                tier: node.tier,
                node: node.key(),
            })
    }

    pub fn summary(&self) -> Vec<TierSummary> {
        self.pools.iter().map(StorageClassPool::summary).collect()
    }

    // ── Allocation ─────────────────────────────────────────────────

    /// Allocate a free block. `None` means nothing is available anywhere
    /// the request may go.
    pub fn allocate(&self, request: AllocationRequest) -> Option<Block> {
        match self.allocate_inner(request, None) {
            Ok(block) => block,
            Err(err) => {
                // Only cancellation can fail a probe, and no token was given.
                warn!(error = %err, "allocation failed");
                None
            }
        }
    }

    /// Like [`Self::allocate`], but aborts with [`RegistryError::Cancelled`]
    /// once `cancel` fires. Cancellation never strands a block.
    pub fn allocate_cancellable(
        &self,
        request: AllocationRequest,
        cancel: &CancellationToken,
    ) -> RegistryResult<Option<Block>> {
        self.allocate_inner(request, Some(cancel))
    }

    fn allocate_inner(
        &self,
        request: AllocationRequest,
        cancel: Option<&CancellationToken>,
    ) -> RegistryResult<Option<Block>> {
        let AllocationRequest {
            tier,
            affinity,
            size_hint,
        } = request;
        let mut block = None;

        if tier > 0 {
            match self.pools.get(tier as usize) {
                Some(pool) => block = pool.allocate(affinity, cancel)?,
                None => warn!(tier, tiers = self.tiers(), "requested storage class is invalid"),
            }
        }

        if tier == 0 && affinity == 0 {
            let placement = self.scheduler.lock().recommend(size_hint);
            if let Some(placement) = placement {
                debug!(
                    tier = placement.tier,
                    affinity = placement.affinity,
                    size_hint,
                    "scheduler placement"
                );
                if let Some(pool) = self.pools.get(placement.tier as usize) {
                    block = pool.allocate(placement.affinity, cancel)?;
                }
            }
        }

        if block.is_none() {
            for pool in &self.pools {
                block = pool.allocate(affinity, cancel)?;
                if block.is_some() {
                    break;
                }
            }
        }

        if let Some(found) = &block {
            debug!(
                requested_tier = tier,
                requested_affinity = affinity,
                tier = found.tier,
                affinity = found.affinity,
                node = %found.node,
                lba = found.region.lba,
                "block allocated"
            );
            if let Some(owner) = self.pools.get(found.tier as usize).and_then(|p| p.node(found.node)) {
                self.refresh_scheduler(&owner);
            }
        }
        Ok(block)
    }
}
