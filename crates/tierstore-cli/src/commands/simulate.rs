use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use tierstore_core::{AffinityId, NodeKey, SchedulerKind, TierId, TierStoreConfig};
use tierstore_registry::{AllocationRequest, BlockRegistry, TierSummary};
use tracing::info;

use crate::fleet::Fleet;

pub struct SimulateOptions {
    pub requests: usize,
    pub tier: TierId,
    pub affinity: AffinityId,
    pub size_hint: f64,
}

impl SimulateOptions {
    fn request(&self) -> AllocationRequest {
        AllocationRequest {
            tier: self.tier,
            affinity: self.affinity,
            size_hint: self.size_hint,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub scheduler: SchedulerKind,
    pub requests: usize,
    pub allocated: usize,
    /// Index of the first request that found no free block.
    pub exhausted_at: Option<usize>,
    pub nodes: Vec<NodeReport>,
    pub tiers: Vec<TierSummary>,
}

#[derive(Debug, Serialize)]
pub struct NodeReport {
    pub node: String,
    pub tier: TierId,
    pub affinity: AffinityId,
    pub allocated: usize,
    pub remaining: usize,
}

pub fn simulate(
    fleet_path: &str,
    config_path: Option<&str>,
    options: &SimulateOptions,
    format: &str,
) -> anyhow::Result<()> {
    let config = match config_path {
        Some(path) => TierStoreConfig::from_file(Path::new(path))?,
        None => TierStoreConfig::default(),
    };
    let fleet = Fleet::from_file(Path::new(fleet_path))?;
    let report = run(&config, &fleet, options)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print!("{}", format_report(&report)),
    }
    Ok(())
}

/// Register the fleet and serve `options.requests` allocations.
pub fn run(
    config: &TierStoreConfig,
    fleet: &Fleet,
    options: &SimulateOptions,
) -> anyhow::Result<SimulationReport> {
    let registry = BlockRegistry::new(config);
    let block_size = config.storage.block_size;

    for node in &fleet.nodes {
        let descriptor = node.descriptor();
        registry.add_blocks(&descriptor, node.regions(block_size))?;
        registry.update_statistics(&descriptor, &node.statistics())?;
    }
    info!(
        nodes = fleet.nodes.len(),
        scheduler = %registry.scheduler_kind(),
        "fleet registered"
    );

    let request = options.request();
    let mut counts: BTreeMap<NodeKey, usize> = BTreeMap::new();
    let mut allocated = 0;
    let mut exhausted_at = None;
    for i in 0..options.requests {
        match registry.allocate(request) {
            Some(block) => {
                *counts.entry(block.node).or_default() += 1;
                allocated += 1;
            }
            None => {
                exhausted_at = Some(i);
                break;
            }
        }
    }
    info!(allocated, requested = options.requests, "simulation finished");

    let nodes = fleet
        .nodes
        .iter()
        .map(|node| {
            let descriptor = node.descriptor();
            let key = descriptor.key();
            NodeReport {
                node: key.to_string(),
                tier: node.tier,
                affinity: node.affinity,
                allocated: counts.get(&key).copied().unwrap_or(0),
                remaining: registry
                    .node(&descriptor)
                    .map_or(0, |queue| queue.free_block_count()),
            }
        })
        .collect();

    Ok(SimulationReport {
        scheduler: registry.scheduler_kind(),
        requests: options.requests,
        allocated,
        exhausted_at,
        nodes,
        tiers: registry.summary(),
    })
}

pub fn format_report(report: &SimulationReport) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "Scheduler: {}  allocated {}/{}\n",
        report.scheduler, report.allocated, report.requests
    ));
    if let Some(i) = report.exhausted_at {
        out.push_str(&format!("No free block left at request {i}\n"));
    }

    out.push_str("\nNodes:\n");
    out.push_str(&format!(
        "  {:<22} {:>4} {:>8} {:>9} {:>9}\n",
        "NODE", "TIER", "AFFINITY", "ALLOCATED", "REMAINING"
    ));
    for n in &report.nodes {
        out.push_str(&format!(
            "  {:<22} {:>4} {:>8} {:>9} {:>9}\n",
            n.node, n.tier, n.affinity, n.allocated, n.remaining
        ));
    }

    out.push_str("\nTiers:\n");
    for t in &report.tiers {
        if t.nodes == 0 {
            continue;
        }
        out.push_str(&format!(
            "  tier {}: {} nodes ({} online), {} free blocks, {} affinity groups\n",
            t.tier, t.nodes, t.online_nodes, t.free_blocks, t.affinity_groups
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLEET: &str = r#"
[[node]]
tier = 1
affinity = 1
address = "10.0.0.1"
port = 50020
blocks = 3

[node.performance]
storage_bandwidth = 1.0e9
storage_latency = 1.0e-4

[[node]]
tier = 2
affinity = 1
address = "10.0.0.2"
port = 50020
blocks = 2

[node.performance]
storage_bandwidth = 1.0e8
storage_latency = 1.0e-2
"#;

    fn options(requests: usize, tier: TierId) -> SimulateOptions {
        SimulateOptions {
            requests,
            tier,
            affinity: 0,
            size_hint: 1.0,
        }
    }

    #[test]
    fn explicit_tier_drains_then_spills() {
        let fleet = Fleet::from_toml_str(FLEET).unwrap();
        let report = run(&TierStoreConfig::default(), &fleet, &options(4, 1)).unwrap();

        assert_eq!(report.allocated, 4);
        assert_eq!(report.exhausted_at, None);
        assert_eq!(report.nodes[0].allocated, 3);
        assert_eq!(report.nodes[0].remaining, 0);
        assert_eq!(report.nodes[1].allocated, 1);
    }

    #[test]
    fn reports_exhaustion() {
        let fleet = Fleet::from_toml_str(FLEET).unwrap();
        let report = run(&TierStoreConfig::default(), &fleet, &options(10, 0)).unwrap();

        assert_eq!(report.allocated, 5);
        assert_eq!(report.exhausted_at, Some(5));
        assert!(report.tiers.iter().all(|t| t.free_blocks == 0));
    }

    #[test]
    fn min_heap_prefers_fast_tier_first() {
        let mut config = TierStoreConfig::default();
        config.scheduler.kind = SchedulerKind::MinHeap;
        let fleet = Fleet::from_toml_str(FLEET).unwrap();
        let report = run(&config, &fleet, &options(3, 0)).unwrap();

        assert_eq!(report.scheduler, SchedulerKind::MinHeap);
        assert_eq!(report.nodes[0].allocated, 3);
        assert_eq!(report.nodes[1].allocated, 0);
    }

    #[test]
    fn text_report_lists_every_node() {
        let fleet = Fleet::from_toml_str(FLEET).unwrap();
        let report = run(&TierStoreConfig::default(), &fleet, &options(1, 0)).unwrap();
        let text = format_report(&report);
        assert!(text.contains("10.0.0.1:50020"));
        assert!(text.contains("10.0.0.2:50020"));
        assert!(text.contains("tier 2: 1 nodes"));
    }
}
