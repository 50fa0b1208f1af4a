//! Value-maximizing tier scheduler.
//!
//! Treats every sampled node as a group of items in a bounded
//! multiple-choice knapsack: taking `k` blocks from node `i` is worth
//! `k * size_hint / time[i]` and costs a depletion weight that grows as the
//! node nears exhaustion. The node credited with the optimum at full
//! capacity is recommended, or the first sampled node when the optimum is
//! zero.
//!
//! The table is rebuilt from scratch on every call, so one recommendation
//! costs `O(nodes * weight_size)` where `weight_size` grows with the sum of
//! `initial / remaining` ratios. Fine for fleets of a few hundred nodes;
//! larger fleets want an incremental or rate-limited recomputation.

use std::collections::HashMap;
use std::sync::Arc;

use tierstore_core::{CostModel, NodeKey, NodeSnapshot, SchedulerKind};
use tracing::debug;

use crate::sample::{Placement, SchedulerSample};
use crate::Scheduler;

/// Weight assigned to draining a node completely; never affordable.
const EXHAUSTED: usize = usize::MAX;

/// Optimum of one knapsack run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Solution {
    /// Index into the sample list of the credited node.
    pub index: usize,
    /// Total value achieved at full capacity.
    pub value: f64,
}

pub struct DpScheduler {
    samples: Vec<SchedulerSample>,
    index: HashMap<NodeKey, usize>,
    cost: Arc<dyn CostModel>,
    block_size: u64,
    mesh: usize,
}

impl DpScheduler {
    pub fn new(cost: Arc<dyn CostModel>, block_size: u64, mesh: usize) -> Self {
        Self {
            samples: Vec::new(),
            index: HashMap::new(),
            cost,
            block_size,
            mesh: mesh.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn sample(&self, key: NodeKey) -> Option<&SchedulerSample> {
        self.index.get(&key).map(|&i| &self.samples[i])
    }
}

impl Scheduler for DpScheduler {
    fn update(&mut self, node: &NodeSnapshot) {
        match self.index.get(&node.key) {
            Some(&i) => self.samples[i].refresh(node, self.cost.as_ref(), self.block_size),
            None => {
                let sample =
                    SchedulerSample::from_snapshot(node, self.cost.as_ref(), self.block_size);
                self.index.insert(node.key, self.samples.len());
                self.samples.push(sample);
            }
        }
    }

    fn recommend(&mut self, size_hint: f64) -> Option<Placement> {
        let solution = solve(&self.samples, size_hint, self.mesh)?;
        let chosen = &self.samples[solution.index];
        debug!(
            node = %chosen.key,
            tier = chosen.tier,
            affinity = chosen.affinity,
            value = solution.value,
            "dp scheduler recommendation"
        );
        Some(chosen.placement())
    }

    fn kind(&self) -> SchedulerKind {
        SchedulerKind::Dp
    }

    fn samples(&self) -> Vec<SchedulerSample> {
        self.samples.clone()
    }
}

/// Depletion weights for one node: `w[k] = n * mesh / (r - k)` for `k < r`,
/// and [`EXHAUSTED`] for `k == r`.
pub fn depletion_weights(initial: usize, remaining: usize, mesh: usize) -> Vec<usize> {
    let mut weights: Vec<usize> = (0..remaining)
        .map(|k| initial.saturating_mul(mesh) / (remaining - k))
        .collect();
    weights.push(EXHAUSTED);
    weights
}

/// Solve the knapsack over `samples`.
///
/// Returns `None` only when there are no samples. When no node can give up a
/// block without being drained the optimum is zero, nobody is credited, and
/// the first sample is reported; the registry's fallback scan covers the
/// case where its pool is dry.
pub fn solve(samples: &[SchedulerSample], size_hint: f64, mesh: usize) -> Option<Solution> {
    if samples.is_empty() {
        return None;
    }

    let values: Vec<f64> = samples
        .iter()
        .map(|s| size_hint / s.estimated_service_time)
        .collect();

    let budget: f64 = samples
        .iter()
        .filter(|s| s.remaining_free_count > 0)
        .map(|s| 2.0 * s.initial_free_count as f64 / s.remaining_free_count as f64)
        .sum();
    let weight_size = (budget * mesh as f64).floor() as usize;

    let mut best = vec![0.0_f64; weight_size + 1];
    let mut credit: Vec<Option<usize>> = vec![None; weight_size + 1];

    for (i, sample) in samples.iter().enumerate() {
        let weights = depletion_weights(sample.initial_free_count, sample.remaining_free_count, mesh);
        let lightest = weights[0];
        if lightest > weight_size {
            continue;
        }
        for j in (lightest..=weight_size).rev() {
            // Slots below `j` still hold the values from before this node.
            // A zero weight reads slot `j` itself, so pin its prior value.
            let prior = best[j];
            for (k, &weight) in weights.iter().enumerate() {
                if weight > j {
                    break;
                }
                let base = if weight == 0 { prior } else { best[j - weight] };
                let candidate = k as f64 * values[i] + base;
                if best[j] < candidate {
                    best[j] = candidate;
                    if base == 0.0 {
                        credit[j] = Some(i);
                    }
                }
            }
        }
    }

    let value = best[weight_size];
    let index = credit[weight_size].unwrap_or(0);
    debug!(nodes = samples.len(), weight_size, value, index, "knapsack solved");
    Some(Solution { index, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use tierstore_core::{LinearCostModel, NetType, NodePerformance};

    fn node(last_octet: u8, tier: u32, affinity: u32, time: f64, free: usize) -> NodeSnapshot {
        NodeSnapshot {
            key: NodeKey::from_endpoint(Ipv4Addr::new(10, 0, 0, last_octet), 4420),
            tier,
            affinity,
            performance: NodePerformance {
                storage_bandwidth: 1.0,
                storage_latency: time,
                network_latency: 0.0,
                network_delay: 0.0,
            },
            net_type: NetType::Rdma,
            free_blocks: free,
        }
    }

    /// Block size 0 makes the service time equal to `storage_latency`.
    fn scheduler() -> DpScheduler {
        DpScheduler::new(Arc::new(LinearCostModel::default()), 0, 10)
    }

    #[test]
    fn depletion_weights_grow_toward_exhaustion() {
        assert_eq!(depletion_weights(4, 4, 10), vec![10, 13, 20, 40, EXHAUSTED]);
        assert_eq!(depletion_weights(4, 1, 10), vec![40, EXHAUSTED]);
        assert_eq!(depletion_weights(4, 0, 10), vec![EXHAUSTED]);
    }

    #[test]
    fn empty_scheduler_has_no_recommendation() {
        let mut sched = scheduler();
        assert!(sched.recommend(1.0).is_none());
    }

    #[test]
    fn update_is_idempotent_per_node() {
        let mut sched = scheduler();
        sched.update(&node(1, 1, 1, 2.0, 4));
        sched.update(&node(1, 1, 1, 3.0, 2));
        assert_eq!(sched.len(), 1);
        let sample = sched.sample(node(1, 1, 1, 0.0, 0).key).unwrap();
        assert_eq!(sample.initial_free_count, 4);
        assert_eq!(sample.remaining_free_count, 2);
        assert!((sample.estimated_service_time - 3.0).abs() < 1e-9);
    }

    #[test]
    fn two_node_case_matches_enumeration() {
        // A: n=4, r=4, t=2.0 -> v=1.0, weights [10, 13, 20, 40, inf]
        // B: n=4, r=1, t=1.0 -> v=2.0, weights [40, inf]
        // W = 2*4/4 + 2*4/1 = 10, capacity = 100.
        // B can only be taken with k=0 (worth nothing), so the best plan is
        // 3 blocks from A at weight 40, value 3.0.
        let mut sched = scheduler();
        sched.update(&node(1, 1, 7, 2.0, 4));
        sched.update(&node(2, 2, 9, 1.0, 4));
        sched.update(&node(2, 2, 9, 1.0, 1));

        let solution = solve(&sched.samples, 2.0, 10).unwrap();
        assert_eq!(solution.index, 0);
        assert!((solution.value - 3.0).abs() < 1e-9);

        assert_eq!(sched.recommend(2.0), Some(Placement { tier: 1, affinity: 7 }));
    }

    #[test]
    fn combined_plan_credits_first_contributor() {
        // A: v=0.5, B: v=1.0, both n=r=4 -> capacity 40.
        // Best plan is 2 blocks from A (weight 20, 1.0) plus 2 from B
        // (weight 20, 2.0) = 3.0. The slot was first raised from zero by A,
        // and B only ever improved on A's partial plans, so A stays credited.
        let mut sched = scheduler();
        sched.update(&node(1, 1, 1, 2.0, 4));
        sched.update(&node(2, 2, 2, 1.0, 4));

        let solution = solve(&sched.samples, 1.0, 10).unwrap();
        assert!((solution.value - 3.0).abs() < 1e-9);
        assert_eq!(solution.index, 0);
    }

    #[test]
    fn faster_node_credited_when_it_starts_the_plan() {
        let mut sched = scheduler();
        sched.update(&node(2, 2, 2, 1.0, 4));
        sched.update(&node(1, 1, 1, 2.0, 4));
        assert_eq!(sched.recommend(1.0), Some(Placement { tier: 2, affinity: 2 }));
    }

    #[test]
    fn drained_node_yields_to_one_with_room() {
        let mut sched = scheduler();
        sched.update(&node(1, 1, 1, 0.5, 8));
        sched.update(&node(2, 2, 2, 4.0, 8));
        assert_eq!(sched.recommend(1.0), Some(Placement { tier: 1, affinity: 1 }));

        sched.update(&node(1, 1, 1, 0.5, 0));
        for hint in [0.5, 1.0, 8.0] {
            assert_eq!(sched.recommend(hint), Some(Placement { tier: 2, affinity: 2 }));
        }
    }

    #[test]
    fn zero_optimum_reports_first_sample() {
        // Neither node can give up a block without draining, so nothing is
        // credited and the first sample stands.
        let mut sched = scheduler();
        sched.update(&node(1, 1, 1, 1.0, 4));
        sched.update(&node(1, 1, 1, 1.0, 0));
        sched.update(&node(2, 2, 2, 1.0, 1));

        let solution = solve(&sched.samples, 1.0, 10).unwrap();
        assert_eq!(solution, Solution { index: 0, value: 0.0 });
        assert_eq!(sched.recommend(1.0), Some(Placement { tier: 1, affinity: 1 }));
    }

    #[test]
    fn zero_initial_count_does_not_compound() {
        // A node first seen empty has all-zero weights; taking k blocks must
        // still be worth exactly k * v, not a running sum.
        let mut sched = scheduler();
        sched.update(&node(1, 1, 1, 1.0, 0));
        sched.update(&node(1, 1, 1, 1.0, 3));
        // Budget is 2*0/3 = 0, so the whole plan lives in slot 0.
        let solution = solve(&sched.samples, 1.0, 10).unwrap();
        assert!((solution.value - 2.0).abs() < 1e-9);
    }
}
