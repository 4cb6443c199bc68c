pub mod error;
pub mod memory;
pub mod redb_store;
pub mod state;
pub mod store;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use redb_store::RedbStore;
pub use state::{
    compute_desired_hash, DeploymentRecord, Lease, PlanRecord, PlanStatus, StoredEvent,
};
pub use store::StateStore;
