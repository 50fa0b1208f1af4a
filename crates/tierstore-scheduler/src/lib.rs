//! tierstore-scheduler picks a `(tier, affinity)` for unconstrained
//! allocation requests.
//!
//! Two interchangeable strategies implement [`Scheduler`]:
//!
//! - **`dp`**: [`DpScheduler`], a depletion-aware multiple-choice knapsack
//!   that balances throughput value against draining any one node
//! - **`heap`**: [`MinHeapScheduler`], always the lowest estimated service
//!   time
//!
//! Neither structure tolerates unsynchronized mutation. Both `update` and
//! `recommend` take `&mut self`; callers share a scheduler behind a single
//! mutex.

pub mod dp;
pub mod heap;
pub mod sample;

use std::sync::Arc;

use tierstore_core::config::SchedulerConfig;
use tierstore_core::{CostModel, NodeSnapshot, SchedulerKind};
use tracing::info;

pub use dp::DpScheduler;
pub use heap::MinHeapScheduler;
pub use sample::{Placement, SchedulerSample};

/// A tier scheduling strategy.
pub trait Scheduler: Send {
    /// Insert or refresh the sample for `node`.
    fn update(&mut self, node: &NodeSnapshot);

    /// Recommend where an unconstrained request of `size_hint` should go.
    /// `None` only when no node has been sampled yet.
    fn recommend(&mut self, size_hint: f64) -> Option<Placement>;

    fn kind(&self) -> SchedulerKind;

    /// Copy of every sample, in the strategy's internal order.
    fn samples(&self) -> Vec<SchedulerSample>;
}

/// Build the configured scheduler.
pub fn build_scheduler(
    config: &SchedulerConfig,
    cost: Arc<dyn CostModel>,
    block_size: u64,
) -> Box<dyn Scheduler> {
    info!(kind = %config.kind, mesh = config.mesh, block_size, "tier scheduler selected");
    match config.kind {
        SchedulerKind::Dp => Box::new(DpScheduler::new(cost, block_size, config.mesh)),
        SchedulerKind::MinHeap => Box::new(MinHeapScheduler::new(cost, block_size)),
    }
}
