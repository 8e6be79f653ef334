//! Pool ledger: the authoritative record of every pool and its claims.
//!
//! All mutation goes through two conditional writes, [`PoolLedger::append_claim_if_version_matches`]
//! and [`PoolLedger::transition_status`]. Everything else is reads and index lookups.

pub mod memory;
pub mod pool;
#[cfg(feature = "sled-store")]
pub mod sled_store;

#[cfg(test)]
mod tests;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::info;

use crate::config::{PoolLimits, StoreBackend, StoreConfig};
use crate::errors::{PoolError, PoolResult};
use crate::utils::{current_time, generate_unique_token};

pub use memory::MemoryLedger;
pub use pool::{Claim, ClaimantMetadata, ClosureReason, PaymentMethod, Pool, PoolId, PoolStatus};
#[cfg(feature = "sled-store")]
pub use sled_store::SledLedger;

/// Opens the ledger backend named in `store`.
pub fn open_ledger(store: &StoreConfig) -> PoolResult<Arc<dyn PoolLedger>> {
    match store.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryLedger::new())),
        #[cfg(feature = "sled-store")]
        StoreBackend::Sled => {
            let path = store
                .path
                .as_deref()
                .ok_or_else(|| PoolError::Config("store.path is required for the sled backend".into()))?;
            info!("Opening sled ledger at {}", path.display());
            Ok(Arc::new(SledLedger::open(path)?))
        }
        #[cfg(not(feature = "sled-store"))]
        StoreBackend::Sled => Err(PoolError::Config(
            "built without the sled-store feature".into(),
        )),
    }
}

/// Parameters for a new pool, checked against [`PoolLimits`] on creation.
#[derive(Debug, Clone)]
pub struct NewPool {
    pub owner_id: String,
    pub budget: u64,
    pub total_slots: u32,
    pub payment_methods: Vec<PaymentMethod>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewPool {
    /// First offending field wins.
    pub fn validate(&self, limits: &PoolLimits) -> PoolResult<()> {
        if self.owner_id.trim().is_empty() {
            return Err(PoolError::InvalidPoolParameters {
                field: "owner_id",
                reason: "must not be empty".to_string(),
            });
        }
        if self.budget < limits.min_budget {
            return Err(PoolError::InvalidPoolParameters {
                field: "budget",
                reason: format!("must be at least {}", limits.min_budget),
            });
        }
        if self.budget > limits.max_budget {
            return Err(PoolError::InvalidPoolParameters {
                field: "budget",
                reason: format!("cannot exceed {}", limits.max_budget),
            });
        }
        if self.total_slots < limits.min_slots {
            return Err(PoolError::InvalidPoolParameters {
                field: "total_slots",
                reason: format!("must be at least {}", limits.min_slots),
            });
        }
        if self.total_slots > limits.max_slots {
            return Err(PoolError::InvalidPoolParameters {
                field: "total_slots",
                reason: format!("cannot exceed {}", limits.max_slots),
            });
        }
        if self.budget < self.total_slots as u64 {
            return Err(PoolError::InvalidPoolParameters {
                field: "budget",
                reason: "must cover at least one unit per slot".to_string(),
            });
        }
        if self.payment_methods.is_empty() {
            return Err(PoolError::InvalidPoolParameters {
                field: "payment_methods",
                reason: "at least one payment method must be selected".to_string(),
            });
        }
        let unique: HashSet<_> = self.payment_methods.iter().collect();
        if unique.len() != self.payment_methods.len() {
            return Err(PoolError::InvalidPoolParameters {
                field: "payment_methods",
                reason: "duplicate payment methods are not allowed".to_string(),
            });
        }
        Ok(())
    }
}

/// Storage contract for pools.
///
/// Implementations must make each conditional write atomic with respect to every other write
/// on the same pool, including across processes when the backend is shared.
pub trait PoolLedger: Send + Sync {
    /// Stores a brand-new pool. Fails with `DuplicatePool` if its id or token is taken.
    fn insert_pool(&self, pool: Pool) -> PoolResult<()>;

    fn get_pool(&self, id: &PoolId) -> PoolResult<Option<Pool>>;

    fn find_by_token(&self, token: &str) -> PoolResult<Option<Pool>>;

    fn token_exists(&self, token: &str) -> PoolResult<bool> {
        Ok(self.find_by_token(token)?.is_some())
    }

    /// Appends `claim` only if the pool still has exactly `expected_claim_count` claims and is
    /// open. Returns the committed pool, or `VersionConflict` when either condition fails.
    fn append_claim_if_version_matches(
        &self,
        id: &PoolId,
        claim: Claim,
        expected_claim_count: usize,
    ) -> PoolResult<Pool>;

    /// Moves the pool from `from` to `to` only if it is still in `from`.
    fn transition_status(
        &self,
        id: &PoolId,
        from: PoolStatus,
        to: PoolStatus,
        reason: Option<ClosureReason>,
    ) -> PoolResult<Pool>;

    fn pools_for_owner(&self, owner_id: &str) -> PoolResult<Vec<PoolId>>;

    /// Secondary index maintained on every successful append.
    fn pools_for_claimant(&self, claimant_id: &str) -> PoolResult<Vec<PoolId>>;

    fn pool_ids(&self) -> PoolResult<Vec<PoolId>>;

    /// Validates `params`, mints an id and a unique shareable token, and stores the pool.
    fn create_pool(&self, params: NewPool, limits: &PoolLimits) -> PoolResult<Pool> {
        params.validate(limits)?;

        let token = generate_unique_token(|candidate| self.token_exists(candidate))?;
        let pool = Pool {
            id: PoolId::generate(),
            token,
            owner_id: params.owner_id,
            budget: params.budget,
            total_slots: params.total_slots,
            payment_methods: params.payment_methods,
            status: PoolStatus::Open,
            closure_reason: None,
            created_at: current_time(),
            expires_at: params.expires_at,
            claims: Vec::new(),
            allocated_total: 0,
        };

        self.insert_pool(pool.clone())?;
        info!(
            "Created pool {} (budget {}, {} slots) for owner {}",
            pool.id, pool.budget, pool.total_slots, pool.owner_id
        );
        Ok(pool)
    }
}

/// Shared body of the conditional append: checks the version against `current` and builds the
/// state to commit.
pub(crate) fn prepare_append(
    current: &Pool,
    claim: Claim,
    expected_claim_count: usize,
) -> PoolResult<Pool> {
    if current.claims.len() != expected_claim_count || current.status != PoolStatus::Open {
        return Err(PoolError::VersionConflict {
            pool_id: current.id.to_string(),
            expected: expected_claim_count,
            actual: current.claims.len(),
        });
    }
    current.with_claim(claim)
}

/// Shared body of the conditional status write.
pub(crate) fn prepare_transition(
    current: &Pool,
    from: PoolStatus,
    to: PoolStatus,
    reason: Option<ClosureReason>,
) -> PoolResult<Pool> {
    if current.status != from {
        return Err(PoolError::StatusConflict {
            pool_id: current.id.to_string(),
            expected: from,
            actual: current.status,
        });
    }
    if !from.can_transition_to(to) {
        return Err(PoolError::InvalidStatusTransition { from, to });
    }

    let mut next = current.clone();
    next.status = to;
    if to == PoolStatus::Closed {
        next.closure_reason = reason;
    }
    Ok(next)
}
