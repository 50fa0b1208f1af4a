//! Per-node scheduler aggregates.

use serde::Serialize;
use tierstore_core::{AffinityId, CostModel, NodeKey, NodeSnapshot, TierId};

/// Floor applied to estimated service times so value density stays finite.
pub const MIN_SERVICE_TIME: f64 = 1e-9;

/// Scheduler view of one storage node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulerSample {
    pub key: NodeKey,
    pub tier: TierId,
    pub affinity: AffinityId,
    /// Estimated seconds to serve one block from this node.
    pub estimated_service_time: f64,
    /// Free blocks when the node was first sampled. Never refreshed.
    pub initial_free_count: usize,
    pub remaining_free_count: usize,
}

impl SchedulerSample {
    pub fn from_snapshot(node: &NodeSnapshot, cost: &dyn CostModel, block_size: u64) -> Self {
        Self {
            key: node.key,
            tier: node.tier,
            affinity: node.affinity,
            estimated_service_time: service_time(node, cost, block_size),
            initial_free_count: node.free_blocks,
            remaining_free_count: node.free_blocks,
        }
    }

    /// Refresh the mutable fields in place; identity and initial count stay.
    pub fn refresh(&mut self, node: &NodeSnapshot, cost: &dyn CostModel, block_size: u64) {
        self.estimated_service_time = service_time(node, cost, block_size);
        self.remaining_free_count = node.free_blocks;
    }

    pub fn placement(&self) -> Placement {
        Placement {
            tier: self.tier,
            affinity: self.affinity,
        }
    }
}

fn service_time(node: &NodeSnapshot, cost: &dyn CostModel, block_size: u64) -> f64 {
    let t = cost.service_time(&node.performance, block_size, node.net_type);
    if t.is_nan() {
        return f64::INFINITY;
    }
    t.max(MIN_SERVICE_TIME)
}

/// A recommended `(tier, affinity)` for an unconstrained request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Placement {
    pub tier: TierId,
    pub affinity: AffinityId,
}
