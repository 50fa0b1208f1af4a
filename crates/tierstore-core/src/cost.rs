//! Service-time cost model.
//!
//! Schedulers rank nodes by an estimated per-block service time made of a
//! storage term and a network term. The model is a trait so deployments can
//! plug in a measured model without touching the schedulers.

use crate::config::CostConfig;
use crate::types::{NetType, NodePerformance};

/// Estimates how long serving one block from a node takes.
pub trait CostModel: Send + Sync {
    /// Time spent on the storage media for `block_size` bytes.
    fn storage_cost(&self, perf: &NodePerformance, block_size: u64) -> f64;

    /// Time spent moving `block_size` bytes over the node's transport.
    fn network_cost(&self, perf: &NodePerformance, block_size: u64, net: NetType) -> f64;

    fn service_time(&self, perf: &NodePerformance, block_size: u64, net: NetType) -> f64 {
        self.storage_cost(perf, block_size) + self.network_cost(perf, block_size, net)
    }
}

/// Latency-plus-throughput model with a multiplicative transport factor.
#[derive(Debug, Clone)]
pub struct LinearCostModel {
    pub rdma_factor: f64,
    pub tcp_factor: f64,
}

impl LinearCostModel {
    pub fn from_config(config: &CostConfig) -> Self {
        Self {
            rdma_factor: config.rdma_factor,
            tcp_factor: config.tcp_factor,
        }
    }

    fn factor(&self, net: NetType) -> f64 {
        match net {
            NetType::Rdma => self.rdma_factor,
            NetType::Tcp => self.tcp_factor,
        }
    }
}

impl Default for LinearCostModel {
    fn default() -> Self {
        Self::from_config(&CostConfig::default())
    }
}

impl CostModel for LinearCostModel {
    fn storage_cost(&self, perf: &NodePerformance, block_size: u64) -> f64 {
        if perf.storage_bandwidth <= 0.0 {
            return f64::INFINITY;
        }
        perf.storage_latency + block_size as f64 / perf.storage_bandwidth
    }

    fn network_cost(&self, perf: &NodePerformance, block_size: u64, net: NetType) -> f64 {
        (perf.network_latency + perf.network_delay * block_size as f64) * self.factor(net)
    }
}
