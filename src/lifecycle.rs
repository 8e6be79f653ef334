use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{info, warn};

use crate::errors::{PoolError, PoolResult};
use crate::ledger::{ClosureReason, Pool, PoolId, PoolLedger, PoolStatus};
use crate::utils::is_expired;

// Status writes only race against claim appends, which can flip Open to Exhausted once
const MAX_CLOSE_ATTEMPTS: usize = 3;

impl PoolStatus {
    /// Transitions are one-directional: open -> exhausted -> closed, or open -> closed.
    pub fn can_transition_to(self, next: PoolStatus) -> bool {
        matches!(
            (self, next),
            (PoolStatus::Open, PoolStatus::Exhausted)
                | (PoolStatus::Open, PoolStatus::Closed)
                | (PoolStatus::Exhausted, PoolStatus::Closed)
        )
    }

    pub fn accepts_claims(self) -> bool {
        self == PoolStatus::Open
    }
}

/// Status a pool must carry once it holds `claim_count` claims.
pub fn status_after_grant(claim_count: usize, total_slots: u32) -> PoolStatus {
    if claim_count >= total_slots as usize {
        PoolStatus::Exhausted
    } else {
        PoolStatus::Open
    }
}

pub struct LifecycleManager {
    ledger: Arc<dyn PoolLedger>,
}

impl LifecycleManager {
    pub fn new(ledger: Arc<dyn PoolLedger>) -> Self {
        LifecycleManager { ledger }
    }

    /// Called right after a grant commits.
    ///
    /// Ledgers apply the exhaustion flip inside the append itself; this only repairs a pool that
    /// came back full but still open.
    pub fn after_grant(&self, pool: Pool) -> PoolResult<Pool> {
        if pool.is_full() && pool.status == PoolStatus::Open {
            warn!("Pool {} full but still open, marking exhausted", pool.id);
            return match self.ledger.transition_status(
                &pool.id,
                PoolStatus::Open,
                PoolStatus::Exhausted,
                None,
            ) {
                Ok(updated) => Ok(updated),
                // Someone else already moved it on
                Err(PoolError::StatusConflict { .. }) => self.reload(&pool.id),
                Err(err) => Err(err),
            };
        }

        if pool.status == PoolStatus::Exhausted {
            info!(
                "Pool {} exhausted: {} distributed across {} claimants",
                pool.id,
                pool.allocated_total,
                pool.claims.len()
            );
        }
        Ok(pool)
    }

    /// Closes an open or exhausted pool. Closing an already closed pool is an error.
    pub fn close(&self, id: &PoolId, reason: ClosureReason) -> PoolResult<Pool> {
        for _ in 0..MAX_CLOSE_ATTEMPTS {
            let pool = self.reload(id)?;
            match self
                .ledger
                .transition_status(id, pool.status, PoolStatus::Closed, Some(reason))
            {
                Ok(closed) => {
                    info!("Pool {} closed ({:?})", id, reason);
                    return Ok(closed);
                }
                Err(PoolError::StatusConflict { .. }) => continue,
                Err(err) => return Err(err),
            }
        }
        Err(PoolError::ConcurrentModification)
    }

    /// Closes every pool whose expiry has passed. Returns the ids that were closed.
    pub fn close_expired(&self, now: DateTime<Utc>) -> PoolResult<Vec<PoolId>> {
        let mut closed = Vec::new();
        for id in self.ledger.pool_ids()? {
            let Some(pool) = self.ledger.get_pool(&id)? else {
                continue;
            };
            if pool.status == PoolStatus::Closed || !is_expired(pool.expires_at, now) {
                continue;
            }
            match self.close(&id, ClosureReason::Expired) {
                Ok(_) => closed.push(id),
                // Closed by someone else between the read and the write
                Err(PoolError::InvalidStatusTransition { .. }) => {}
                Err(err) => return Err(err),
            }
        }
        if !closed.is_empty() {
            info!("Expiry sweep closed {} pools", closed.len());
        }
        Ok(closed)
    }

    fn reload(&self, id: &PoolId) -> PoolResult<Pool> {
        self.ledger
            .get_pool(id)?
            .ok_or_else(|| PoolError::PoolNotFound(id.to_string()))
    }
}
