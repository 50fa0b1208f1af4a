//! Fleet descriptions for `tierctl simulate`.
//!
//! ```toml
//! [[node]]
//! tier = 1
//! affinity = 1
//! address = "10.0.0.1"
//! port = 50020
//! blocks = 64
//! net_type = "rdma"
//!
//! [node.performance]
//! storage_bandwidth = 2.0e9
//! storage_latency = 1.0e-4
//! network_latency = 5.0e-6
//! network_delay = 1.0e-10
//! ```

use std::net::Ipv4Addr;
use std::path::Path;

use serde::Deserialize;
use tierstore_core::{
    AffinityId, NetType, NodeDescriptor, NodePerformance, NodeStatistics, RegionDescriptor,
    TierId,
};

#[derive(Debug, Clone, Deserialize)]
pub struct Fleet {
    #[serde(rename = "node", default)]
    pub nodes: Vec<FleetNode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FleetNode {
    pub tier: TierId,
    #[serde(default)]
    pub affinity: AffinityId,
    #[serde(default)]
    pub storage_type: u32,
    pub address: Ipv4Addr,
    pub port: u16,
    pub blocks: u32,
    #[serde(default)]
    pub net_type: NetType,
    #[serde(default)]
    pub performance: NodePerformance,
}

impl Fleet {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let fleet: Fleet = toml::from_str(content)?;
        if fleet.nodes.is_empty() {
            anyhow::bail!("fleet has no [[node]] entries");
        }
        Ok(fleet)
    }
}

impl FleetNode {
    pub fn descriptor(&self) -> NodeDescriptor {
        NodeDescriptor {
            storage_type: self.storage_type,
            tier: self.tier,
            affinity: self.affinity,
            address: self.address,
            port: self.port,
            performance: self.performance,
        }
    }

    pub fn statistics(&self) -> NodeStatistics {
        NodeStatistics {
            free_block_count: self.blocks,
            performance: self.performance,
            net_type: self.net_type,
        }
    }

    /// The node's capacity carved into consecutive `block_size` regions.
    pub fn regions(&self, block_size: u64) -> impl Iterator<Item = RegionDescriptor> + use<> {
        let length = u32::try_from(block_size).unwrap_or(u32::MAX);
        (0..u64::from(self.blocks)).map(move |lba| RegionDescriptor {
            lba,
            addr: lba * block_size,
            length,
            lkey: 0,
        })
    }
}
