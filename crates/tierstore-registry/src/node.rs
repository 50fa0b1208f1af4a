//! Per-node block queue.

use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tierstore_core::{
    AffinityId, Block, NetType, NodeDescriptor, NodeKey, NodePerformance, NodeSnapshot,
    NodeStatistics, RegionDescriptor, TierId,
};

#[derive(Debug, Clone, Copy)]
struct Telemetry {
    performance: NodePerformance,
    net_type: NetType,
}

/// A storage node's membership state inside one tier.
///
/// Identity (`key`, `tier`, `affinity`) is fixed at creation. The online flag,
/// free blocks, known regions, and performance scalars change over time.
#[derive(Debug)]
pub struct NodeQueue {
    key: NodeKey,
    tier: TierId,
    affinity: AffinityId,
    storage_type: u32,
    address: Ipv4Addr,
    port: u16,
    online: AtomicBool,
    free_blocks: Mutex<VecDeque<Block>>,
    regions: DashMap<u64, RegionDescriptor>,
    telemetry: RwLock<Telemetry>,
}

impl NodeQueue {
    pub fn from_descriptor(node: &NodeDescriptor) -> Self {
        Self {
            key: node.key(),
            tier: node.tier,
            affinity: node.affinity,
            storage_type: node.storage_type,
            address: node.address,
            port: node.port,
            online: AtomicBool::new(true),
            free_blocks: Mutex::new(VecDeque::new()),
            regions: DashMap::new(),
            telemetry: RwLock::new(Telemetry {
                performance: node.performance,
                net_type: NetType::default(),
            }),
        }
    }

    pub fn key(&self) -> NodeKey {
        self.key
    }

    pub fn tier(&self) -> TierId {
        self.tier
    }

    pub fn affinity(&self) -> AffinityId {
        self.affinity
    }

    pub fn storage_type(&self) -> u32 {
        self.storage_type
    }

    pub fn endpoint(&self) -> (Ipv4Addr, u16) {
        (self.address, self.port)
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Release);
    }

    /// Mark the node as alive after hearing from it.
    pub fn touch(&self) {
        self.set_online(true);
    }

    pub fn free_block_count(&self) -> usize {
        self.free_blocks.lock().len()
    }

    /// Record `region` and queue it as a free block.
    pub fn add_free_block(&self, region: RegionDescriptor) {
        self.regions.insert(region.lba, region);
        let block = Block {
            node: self.key,
            tier: self.tier,
            affinity: self.affinity,
            region,
        };
        self.free_blocks.lock().push_back(block);
    }

    /// Pop the oldest free block. Removal and hand-off happen under one lock,
    /// so a block is never handed to two callers.
    pub fn take_free_block(&self) -> Option<Block> {
        self.free_blocks.lock().pop_front()
    }

    pub fn region_exists(&self, lba: u64) -> bool {
        self.regions.contains_key(&lba)
    }

    /// Replace the stored descriptor of a known region. Returns false if the
    /// region was never added.
    pub fn update_region(&self, region: RegionDescriptor) -> bool {
        match self.regions.get_mut(&region.lba) {
            Some(mut current) => {
                *current = region;
                true
            }
            None => false,
        }
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// Adopt the reported performance scalars and net type. Returns how far
    /// the reported free-block count is from the queue (reported minus
    /// queued); the queue itself is never resized from a report.
    pub fn update_statistics(&self, stats: &NodeStatistics) -> i64 {
        {
            let mut telemetry = self.telemetry.write();
            telemetry.performance = stats.performance;
            telemetry.net_type = stats.net_type;
        }
        i64::from(stats.free_block_count) - self.free_block_count() as i64
    }

    pub fn snapshot(&self) -> NodeSnapshot {
        let telemetry = *self.telemetry.read();
        NodeSnapshot {
            key: self.key,
            tier: self.tier,
            affinity: self.affinity,
            performance: telemetry.performance,
            net_type: telemetry.net_type,
            free_blocks: self.free_block_count(),
        }
    }
}
