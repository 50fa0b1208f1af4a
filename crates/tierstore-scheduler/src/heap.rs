//! Latency-ordered tier scheduler.
//!
//! Keeps every sample in a binary min-heap keyed by estimated service time
//! and always recommends the root. It ignores the request size and how much
//! capacity each node has left, so it keeps sending unconstrained traffic to
//! the single fastest node until that node's pool runs dry and the registry
//! falls back to scanning. Cheaper than [`crate::DpScheduler`], but prone to
//! hotspots.

use std::collections::HashMap;
use std::sync::Arc;

use tierstore_core::{CostModel, NodeKey, NodeSnapshot, SchedulerKind};
use tracing::debug;

use crate::sample::{Placement, SchedulerSample};
use crate::Scheduler;

pub struct MinHeapScheduler {
    heap: Vec<SchedulerSample>,
    /// Node key → current position in `heap`.
    positions: HashMap<NodeKey, usize>,
    cost: Arc<dyn CostModel>,
    block_size: u64,
}

impl MinHeapScheduler {
    pub fn new(cost: Arc<dyn CostModel>, block_size: u64) -> Self {
        Self {
            heap: Vec::new(),
            positions: HashMap::new(),
            cost,
            block_size,
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// The sample currently at the root.
    pub fn peek(&self) -> Option<&SchedulerSample> {
        self.heap.first()
    }

    /// Check `parent.time <= child.time` for every edge.
    pub fn is_heap(&self) -> bool {
        (1..self.heap.len()).all(|i| {
            self.heap[parent(i)].estimated_service_time <= self.heap[i].estimated_service_time
        })
    }

    fn time(&self, i: usize) -> f64 {
        self.heap[i].estimated_service_time
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.positions.insert(self.heap[a].key, a);
        self.positions.insert(self.heap[b].key, b);
    }

    fn sift_up(&mut self, mut i: usize) {
        while i > 0 {
            let p = parent(i);
            if self.time(p) <= self.time(i) {
                break;
            }
            self.swap(p, i);
            i = p;
        }
    }

    fn sift_down(&mut self, mut i: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * i + 1;
            let right = left + 1;
            let mut smallest = i;
            if left < len && self.time(left) < self.time(smallest) {
                smallest = left;
            }
            if right < len && self.time(right) < self.time(smallest) {
                smallest = right;
            }
            if smallest == i {
                break;
            }
            self.swap(i, smallest);
            i = smallest;
        }
    }

    /// Restore ordering around `i` after its time changed.
    fn adjust(&mut self, i: usize) {
        if i > 0 && self.time(parent(i)) > self.time(i) {
            self.sift_up(i);
        } else {
            self.sift_down(i);
        }
    }
}

fn parent(i: usize) -> usize {
    (i - 1) / 2
}

impl Scheduler for MinHeapScheduler {
    fn update(&mut self, node: &NodeSnapshot) {
        match self.positions.get(&node.key) {
            Some(&i) => {
                self.heap[i].refresh(node, self.cost.as_ref(), self.block_size);
                self.adjust(i);
            }
            None => {
                let sample =
                    SchedulerSample::from_snapshot(node, self.cost.as_ref(), self.block_size);
                let i = self.heap.len();
                self.positions.insert(sample.key, i);
                self.heap.push(sample);
                self.sift_up(i);
            }
        }
    }

    fn recommend(&mut self, _size_hint: f64) -> Option<Placement> {
        let root = self.heap.first()?;
        debug!(
            node = %root.key,
            tier = root.tier,
            affinity = root.affinity,
            time = root.estimated_service_time,
            "min-heap scheduler recommendation"
        );
        Some(root.placement())
    }

    fn kind(&self) -> SchedulerKind {
        SchedulerKind::MinHeap
    }

    fn samples(&self) -> Vec<SchedulerSample> {
        self.heap.clone()
    }
}
