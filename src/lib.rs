//! Fair-random budget pools.
//!
//! An owner funds a pool with a budget split across a fixed number of slots. Claimants join by
//! shareable token and each receives a randomly sized portion, bounded so early claimants cannot
//! drain the pool, with the final slot taking the exact remainder.

pub mod allocation;
pub mod config;
pub mod coordinator;
pub mod errors;
pub mod ledger;
pub mod lifecycle;
pub mod utils;

// Re-export commonly used items
pub use allocation::{compute_portion, distribute_all, Distribution, DistributionStats};
pub use config::FairpoolConfig;
pub use coordinator::{
    ClaimCoordinator, ClaimReceipt, CreatePoolRequest, CreatedPool, PoolView, UserPools,
};
pub use errors::{PoolError, PoolResult};
pub use ledger::{
    open_ledger, Claim, ClaimantMetadata, ClosureReason, MemoryLedger, PaymentMethod, Pool, PoolId,
    PoolLedger, PoolStatus,
};
#[cfg(feature = "sled-store")]
pub use ledger::SledLedger;
pub use lifecycle::LifecycleManager;
