//! Claim coordination.
//!
//! Every claim is one read of the pool, a pure eligibility check and portion draw, and one
//! conditional append. Nothing is locked across those steps, so a claim that loses the race is
//! rejected with `ConcurrentModification` and leaves the pool untouched.

pub mod views;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::allocation::compute_portion;
use crate::config::FairpoolConfig;
use crate::errors::{PoolError, PoolResult};
use crate::ledger::{
    Claim, ClaimantMetadata, NewPool, PaymentMethod, Pool, PoolId, PoolLedger, PoolStatus,
};
use crate::lifecycle::LifecycleManager;
use crate::utils::{current_time, expiry_from, validate_pool_token};

pub use views::{Dashboard, ParticipatedPool, PoolView, UserPools};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePoolRequest {
    pub owner_id: String,
    pub budget: u64,
    pub total_slots: u32,
    pub payment_methods: Vec<PaymentMethod>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedPool {
    pub pool_id: PoolId,
    pub shareable_token: String,
}

/// What a successful claimant is told.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimReceipt {
    pub pool_id: PoolId,
    pub portion: u64,
    pub granted_at: DateTime<Utc>,
    /// 1-based position in grant order
    pub slot: u32,
    pub remaining_slots: u32,
    pub status: PoolStatus,
}

pub struct ClaimCoordinator {
    ledger: Arc<dyn PoolLedger>,
    lifecycle: LifecycleManager,
    config: FairpoolConfig,
}

impl ClaimCoordinator {
    pub fn new(ledger: Arc<dyn PoolLedger>, config: FairpoolConfig) -> Self {
        ClaimCoordinator {
            lifecycle: LifecycleManager::new(ledger.clone()),
            ledger,
            config,
        }
    }

    pub fn ledger(&self) -> &Arc<dyn PoolLedger> {
        &self.ledger
    }

    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }

    pub fn config(&self) -> &FairpoolConfig {
        &self.config
    }

    /// Validates the request against the configured limits and opens a new pool.
    pub fn create_pool(&self, request: CreatePoolRequest) -> PoolResult<CreatedPool> {
        let params = NewPool {
            owner_id: request.owner_id,
            budget: request.budget,
            total_slots: request.total_slots,
            payment_methods: request.payment_methods,
            expires_at: expiry_from(current_time(), self.config.pools.default_ttl_hours),
        };
        let pool = self.ledger.create_pool(params, &self.config.limits)?;
        Ok(CreatedPool {
            pool_id: pool.id,
            shareable_token: pool.token,
        })
    }

    /// Claims a portion of the pool behind `token` using the thread-local RNG.
    pub fn claim(
        &self,
        token: &str,
        claimant_id: &str,
        metadata: ClaimantMetadata,
    ) -> PoolResult<ClaimReceipt> {
        self.claim_with_rng(token, claimant_id, metadata, &mut rand::thread_rng())
    }

    pub fn claim_with_rng<R: Rng + ?Sized>(
        &self,
        token: &str,
        claimant_id: &str,
        metadata: ClaimantMetadata,
        rng: &mut R,
    ) -> PoolResult<ClaimReceipt> {
        let pool = self.resolve_token(token)?;
        self.claim_from_snapshot(pool, claimant_id, metadata, rng)
    }

    /// Claims against a pool by id rather than by shareable token.
    pub fn claim_pool<R: Rng + ?Sized>(
        &self,
        pool_id: &PoolId,
        claimant_id: &str,
        metadata: ClaimantMetadata,
        rng: &mut R,
    ) -> PoolResult<ClaimReceipt> {
        let pool = self
            .ledger
            .get_pool(pool_id)?
            .ok_or_else(|| PoolError::PoolNotFound(pool_id.to_string()))?;
        self.claim_from_snapshot(pool, claimant_id, metadata, rng)
    }

    /// Like [`claim`](Self::claim), but re-runs the whole sequence after a lost race, up to
    /// `claims.max_attempts` times. Eligibility is re-checked on every attempt.
    pub fn claim_with_retry(
        &self,
        token: &str,
        claimant_id: &str,
        metadata: ClaimantMetadata,
    ) -> PoolResult<ClaimReceipt> {
        self.claim_with_retry_rng(token, claimant_id, metadata, &mut rand::thread_rng())
    }

    pub fn claim_with_retry_rng<R: Rng + ?Sized>(
        &self,
        token: &str,
        claimant_id: &str,
        metadata: ClaimantMetadata,
        rng: &mut R,
    ) -> PoolResult<ClaimReceipt> {
        let max_attempts = self.config.claims.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.claim_with_rng(token, claimant_id, metadata.clone(), rng) {
                Err(PoolError::ConcurrentModification) if attempt < max_attempts => {
                    debug!(
                        "Claim by {} lost a race (attempt {}/{}), retrying",
                        claimant_id, attempt, max_attempts
                    );
                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }

    fn resolve_token(&self, token: &str) -> PoolResult<Pool> {
        if !validate_pool_token(token) {
            return Err(PoolError::PoolNotFound(token.to_string()));
        }
        self.ledger
            .find_by_token(token)?
            .ok_or_else(|| PoolError::PoolNotFound(token.to_string()))
    }

    fn claim_from_snapshot<R: Rng + ?Sized>(
        &self,
        pool: Pool,
        claimant_id: &str,
        metadata: ClaimantMetadata,
        rng: &mut R,
    ) -> PoolResult<ClaimReceipt> {
        self.check_eligibility(&pool, claimant_id)?;

        let slots_filled = pool.claims.len();
        let portion = compute_portion(
            rng,
            pool.budget,
            pool.total_slots,
            slots_filled as u32,
            pool.allocated_total,
        )?;
        let claim = Claim {
            claimant_id: claimant_id.to_string(),
            portion,
            granted_at: current_time(),
            metadata,
        };
        let granted_at = claim.granted_at;

        let committed = match self
            .ledger
            .append_claim_if_version_matches(&pool.id, claim, slots_filled)
        {
            Ok(committed) => committed,
            Err(PoolError::VersionConflict { expected, actual, .. }) => {
                debug!(
                    "Claim by {} on pool {} conflicted: read {} claims, store has {}",
                    claimant_id, pool.id, expected, actual
                );
                return Err(PoolError::ConcurrentModification);
            }
            Err(err) => return Err(err),
        };

        info!(
            "Granted {} to {} on pool {} (slot {}/{})",
            portion,
            claimant_id,
            pool.id,
            committed.claims.len(),
            committed.total_slots
        );

        // The grant is already durable; a failed status repair is logged, not reported
        let committed = match self.lifecycle.after_grant(committed.clone()) {
            Ok(updated) => updated,
            Err(err) => {
                warn!("Post-grant lifecycle check failed for pool {}: {}", pool.id, err);
                committed
            }
        };

        Ok(ClaimReceipt {
            pool_id: committed.id.clone(),
            portion,
            granted_at,
            slot: committed.claims.len() as u32,
            remaining_slots: committed.remaining_slots(),
            status: committed.status,
        })
    }

    /// First violated precondition wins.
    fn check_eligibility(&self, pool: &Pool, claimant_id: &str) -> PoolResult<()> {
        if pool.claim_for(claimant_id).is_some() {
            return Err(PoolError::AlreadyClaimed);
        }
        if pool.owner_id == claimant_id {
            return Err(PoolError::CannotClaimOwnPool);
        }
        if self.config.claims.exclusive_claimants
            && !self.ledger.pools_for_claimant(claimant_id)?.is_empty()
        {
            return Err(PoolError::AlreadyClaimedElsewhere);
        }
        if !pool.status.accepts_claims() {
            return Err(PoolError::PoolNotOpen {
                pool_id: pool.id.to_string(),
                status: pool.status,
            });
        }
        if pool.is_full() {
            return Err(PoolError::PoolFull {
                pool_id: pool.id.to_string(),
                slots: pool.total_slots,
            });
        }
        Ok(())
    }
}
