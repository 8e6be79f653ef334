use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::allocation::DistributionStats;
use crate::coordinator::ClaimCoordinator;
use crate::errors::PoolResult;
use crate::ledger::{Claim, ClosureReason, PaymentMethod, Pool, PoolId, PoolLedger, PoolStatus};

/// Full breakdown of a pool's grants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub total_distributed: u64,
    pub claims: Vec<Claim>,
    pub stats: DistributionStats,
}

/// Read-only projection of a pool for one viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolView {
    pub pool_id: PoolId,
    pub owner_id: String,
    pub budget: u64,
    pub total_slots: u32,
    pub claims_count: u32,
    pub remaining_slots: u32,
    pub status: PoolStatus,
    pub closure_reason: Option<ClosureReason>,
    pub payment_methods: Vec<PaymentMethod>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    /// The viewer's own grant, if they hold one
    pub viewer_claim: Option<Claim>,
    /// Present once the pool is exhausted, or at any time for the owner
    pub dashboard: Option<Dashboard>,
}

impl PoolView {
    pub fn of(pool: &Pool, viewer_id: Option<&str>) -> Self {
        let is_owner = viewer_id == Some(pool.owner_id.as_str());
        let dashboard = (pool.status == PoolStatus::Exhausted || is_owner).then(|| Dashboard {
            total_distributed: pool.allocated_total,
            claims: pool.claims.clone(),
            stats: DistributionStats::from_portions(&pool.portions()),
        });

        PoolView {
            pool_id: pool.id.clone(),
            owner_id: pool.owner_id.clone(),
            budget: pool.budget,
            total_slots: pool.total_slots,
            claims_count: pool.claims.len() as u32,
            remaining_slots: pool.remaining_slots(),
            status: pool.status,
            closure_reason: pool.closure_reason,
            payment_methods: pool.payment_methods.clone(),
            created_at: pool.created_at,
            expires_at: pool.expires_at,
            viewer_claim: viewer_id.and_then(|id| pool.claim_for(id)).cloned(),
            dashboard,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipatedPool {
    pub pool: Pool,
    pub claim: Claim,
}

/// Pools a user owns and pools they hold a claim in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPools {
    pub created: Vec<Pool>,
    pub participated: Vec<ParticipatedPool>,
}

impl ClaimCoordinator {
    pub fn pool_view(&self, token: &str, viewer_id: Option<&str>) -> PoolResult<PoolView> {
        let pool = self.resolve_token(token)?;
        Ok(PoolView::of(&pool, viewer_id))
    }

    /// Built from the ledger's owner and claimant indices.
    pub fn pools_for_user(&self, user_id: &str) -> PoolResult<UserPools> {
        let created = load_all(self.ledger.as_ref(), self.ledger.pools_for_owner(user_id)?)?;

        let participated = load_all(self.ledger.as_ref(), self.ledger.pools_for_claimant(user_id)?)?
            .into_iter()
            .filter_map(|pool| {
                let claim = pool.claim_for(user_id).cloned()?;
                Some(ParticipatedPool { pool, claim })
            })
            .collect();

        Ok(UserPools {
            created,
            participated,
        })
    }
}

// Index entries whose pool has vanished are skipped
fn load_all(ledger: &dyn PoolLedger, ids: Vec<PoolId>) -> PoolResult<Vec<Pool>> {
    let mut pools = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(pool) = ledger.get_pool(&id)? {
            pools.push(pool);
        }
    }
    Ok(pools)
}
