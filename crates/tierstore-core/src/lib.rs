pub mod config;
pub mod cost;
pub mod types;

pub use config::{SchedulerKind, SelectionKind, TierStoreConfig};
pub use cost::{CostModel, LinearCostModel};
pub use types::*;
