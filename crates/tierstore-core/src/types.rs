//! Domain types shared by the registry and the schedulers.
//!
//! These are the already-decoded forms of the node, region, and statistics
//! records a storage node sends to the metadata service, plus the block
//! handle handed back to clients on allocation.

use std::fmt;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

/// Storage class (tier) identifier. Tier 0 doubles as "unconstrained" in
/// allocation requests.
pub type TierId = u32;

/// Locality grouping identifier (rack, host, ...). 0 means "no preference".
pub type AffinityId = u32;

// ── Node ──────────────────────────────────────────────────────────

/// Stable 64-bit node identity derived from the node's endpoint.
///
/// The address occupies the high 32 bits and the port the low bits, so
/// distinct `(address, port)` pairs never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeKey(pub u64);

impl NodeKey {
    pub fn from_endpoint(address: Ipv4Addr, port: u16) -> Self {
        NodeKey((u64::from(u32::from(address)) << 32) | u64::from(port))
    }

    /// Recover the endpoint this key was derived from.
    pub fn endpoint(&self) -> (Ipv4Addr, u16) {
        let address = Ipv4Addr::from((self.0 >> 32) as u32);
        let port = (self.0 & 0xffff) as u16;
        (address, port)
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (address, port) = self.endpoint();
        write!(f, "{address}:{port}")
    }
}

/// Performance scalars a storage node reports for the cost model. Missing
/// fields deserialize as zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NodePerformance {
    /// Sustained media bandwidth in bytes per second (M).
    pub storage_bandwidth: f64,
    /// Fixed media access latency in seconds (w).
    pub storage_latency: f64,
    /// Per-request network latency in seconds (H).
    pub network_latency: f64,
    /// Per-byte network transfer delay in seconds (d).
    pub network_delay: f64,
}

/// Transport a node is reached over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NetType {
    #[default]
    Rdma,
    Tcp,
}

impl NetType {
    /// Decode the integer tag carried by statistics records.
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => NetType::Rdma,
            _ => NetType::Tcp,
        }
    }
}

/// Decoded node descriptor as delivered by the wire layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    pub storage_type: u32,
    pub tier: TierId,
    pub affinity: AffinityId,
    pub address: Ipv4Addr,
    pub port: u16,
    pub performance: NodePerformance,
}

impl NodeDescriptor {
    pub fn key(&self) -> NodeKey {
        NodeKey::from_endpoint(self.address, self.port)
    }
}

/// Periodic capacity/performance report from a storage node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeStatistics {
    pub free_block_count: u32,
    pub performance: NodePerformance,
    pub net_type: NetType,
}

/// Point-in-time view of a registered node, as consumed by schedulers.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSnapshot {
    pub key: NodeKey,
    pub tier: TierId,
    pub affinity: AffinityId,
    pub performance: NodePerformance,
    pub net_type: NetType,
    pub free_blocks: usize,
}

// ── Region / Block ────────────────────────────────────────────────

/// Region-specific fields of a block. Placement treats these as opaque;
/// `lba` identifies the region within its node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionDescriptor {
    pub lba: u64,
    pub addr: u64,
    pub length: u32,
    pub lkey: u32,
}

/// Inbound register / region-update payload: a region plus its owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockDescriptor {
    pub node: NodeDescriptor,
    pub region: RegionDescriptor,
}

/// An allocatable block handle bound to the node that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Block {
    pub node: NodeKey,
    pub tier: TierId,
    pub affinity: AffinityId,
    pub region: RegionDescriptor,
}
