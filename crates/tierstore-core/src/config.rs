//! tierstore.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Default fixed block size (64 MiB).
pub const DEFAULT_BLOCK_SIZE: u64 = 64 * 1024 * 1024;

/// Default DP discretization step.
pub const DEFAULT_MESH: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct TierStoreConfig {
    pub storage: StorageConfig,
    pub selection: SelectionConfig,
    pub scheduler: SchedulerConfig,
    pub cost: CostConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Number of storage classes; tiers are numbered `0..tiers`.
    pub tiers: u32,
    pub block_size: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            tiers: 4,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SelectionConfig {
    /// `"roundrobin"` (any case); every other value selects random.
    pub policy: String,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            policy: "roundrobin".to_string(),
        }
    }
}

/// Node selection strategy resolved from [`SelectionConfig::policy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionKind {
    RoundRobin,
    Random,
}

impl SelectionConfig {
    pub fn kind(&self) -> SelectionKind {
        if self.policy.eq_ignore_ascii_case("roundrobin") {
            SelectionKind::RoundRobin
        } else {
            SelectionKind::Random
        }
    }
}

/// Which tier scheduler answers unconstrained requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerKind {
    #[default]
    Dp,
    MinHeap,
}

impl fmt::Display for SchedulerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerKind::Dp => f.write_str("dp"),
            SchedulerKind::MinHeap => f.write_str("min_heap"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    pub kind: SchedulerKind,
    /// Discretization step of the DP weight axis.
    pub mesh: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            kind: SchedulerKind::Dp,
            mesh: DEFAULT_MESH,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CostConfig {
    pub rdma_factor: f64,
    pub tcp_factor: f64,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            rdma_factor: 1.0,
            tcp_factor: 2.0,
        }
    }
}

impl TierStoreConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: TierStoreConfig = toml::from_str(content)?;
        if config.storage.tiers == 0 {
            anyhow::bail!("storage.tiers must be at least 1");
        }
        if config.scheduler.mesh == 0 {
            anyhow::bail!("scheduler.mesh must be at least 1");
        }
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Scaffold a tierstore.toml with every default spelled out.
    pub fn scaffold() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaffold() {
        let toml_str = TierStoreConfig::scaffold().to_toml_string().unwrap();
        assert!(toml_str.contains("roundrobin"));
        assert!(toml_str.contains("block_size = 67108864"));
        assert!(toml_str.contains("kind = \"dp\""));
    }

    #[test]
    fn test_parse_empty_uses_defaults() {
        let config = TierStoreConfig::from_toml_str("").unwrap();
        assert_eq!(config, TierStoreConfig::default());
        assert_eq!(config.scheduler.mesh, 10);
    }

    #[test]
    fn test_parse_partial() {
        let toml_str = r#"
[storage]
tiers = 2

[scheduler]
kind = "min_heap"
"#;
        let config = TierStoreConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.storage.tiers, 2);
        assert_eq!(config.storage.block_size, DEFAULT_BLOCK_SIZE);
        assert_eq!(config.scheduler.kind, SchedulerKind::MinHeap);
    }

    #[test]
    fn test_rejects_zero_tiers() {
        let err = TierStoreConfig::from_toml_str("[storage]\ntiers = 0\n").unwrap_err();
        assert!(err.to_string().contains("tiers"));
    }

    #[test]
    fn test_selection_kind() {
        let mut selection = SelectionConfig::default();
        assert_eq!(selection.kind(), SelectionKind::RoundRobin);
        selection.policy = "RoundRobin".to_string();
        assert_eq!(selection.kind(), SelectionKind::RoundRobin);
        selection.policy = "random".to_string();
        assert_eq!(selection.kind(), SelectionKind::Random);
        selection.policy = "anything".to_string();
        assert_eq!(selection.kind(), SelectionKind::Random);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tierstore.toml");
        std::fs::write(&path, "[selection]\npolicy = \"random\"\n").unwrap();
        let config = TierStoreConfig::from_file(&path).unwrap();
        assert_eq!(config.selection.kind(), SelectionKind::Random);
    }
}
