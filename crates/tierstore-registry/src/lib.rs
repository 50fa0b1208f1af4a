//! tierstore-registry: tiered block membership and allocation.
//!
//! The metadata service hands decoded node and block descriptors to a
//! [`BlockRegistry`], which files them by storage class and locality, and
//! hands free blocks back out to writers.
//!
//! # Architecture
//!
//! ```text
//! BlockRegistry
//!   ├── Mutex<Box<dyn Scheduler>>   (one critical section for all scheduling)
//!   └── StorageClassPool per tier
//!       ├── membership: DashMap<NodeKey, Arc<NodeQueue>>
//!       ├── affinity groups: DashMap<AffinityId, Arc<TierGroup>>
//!       └── catch-all TierGroup
//!           ├── RwLock<Vec<Arc<NodeQueue>>>
//!           └── SelectionPolicy (round robin / random start index)
//! ```

pub mod error;
pub mod group;
pub mod node;
pub mod pool;
pub mod registry;
pub mod selection;

pub use error::{RegistryError, RegistryResult};
pub use group::TierGroup;
pub use node::NodeQueue;
pub use pool::{StorageClassPool, TierSummary};
pub use registry::{AllocationRequest, BlockRegistry};
pub use selection::SelectionPolicy;
pub use tierstore_scheduler::{Placement, Scheduler, SchedulerSample};
pub use tokio_util::sync::CancellationToken;
