use std::collections::HashMap;

use log::debug;
use parking_lot::RwLock;

use crate::errors::{PoolError, PoolResult};
use crate::ledger::{
    prepare_append, prepare_transition, Claim, ClosureReason, Pool, PoolId, PoolLedger, PoolStatus,
};

#[derive(Debug, Default)]
struct LedgerState {
    pools: HashMap<PoolId, Pool>,
    tokens: HashMap<String, PoolId>,
    by_owner: HashMap<String, Vec<PoolId>>,
    by_claimant: HashMap<String, Vec<PoolId>>,
}

/// Single-node ledger.
///
/// The write lock is held only for the duration of one conditional write, never across a
/// caller's read-compute-write cycle, so concurrent claimants race exactly as they would against
/// a remote store.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    state: RwLock<LedgerState>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.state.read().pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().pools.is_empty()
    }
}

impl PoolLedger for MemoryLedger {
    fn insert_pool(&self, pool: Pool) -> PoolResult<()> {
        let mut state = self.state.write();
        if state.pools.contains_key(&pool.id) || state.tokens.contains_key(&pool.token) {
            return Err(PoolError::DuplicatePool(pool.id.to_string()));
        }

        state.tokens.insert(pool.token.clone(), pool.id.clone());
        state
            .by_owner
            .entry(pool.owner_id.clone())
            .or_default()
            .push(pool.id.clone());
        state.pools.insert(pool.id.clone(), pool);
        Ok(())
    }

    fn get_pool(&self, id: &PoolId) -> PoolResult<Option<Pool>> {
        Ok(self.state.read().pools.get(id).cloned())
    }

    fn find_by_token(&self, token: &str) -> PoolResult<Option<Pool>> {
        let state = self.state.read();
        Ok(state
            .tokens
            .get(token)
            .and_then(|id| state.pools.get(id))
            .cloned())
    }

    fn token_exists(&self, token: &str) -> PoolResult<bool> {
        Ok(self.state.read().tokens.contains_key(token))
    }

    fn append_claim_if_version_matches(
        &self,
        id: &PoolId,
        claim: Claim,
        expected_claim_count: usize,
    ) -> PoolResult<Pool> {
        let mut state = self.state.write();
        let current = state
            .pools
            .get(id)
            .ok_or_else(|| PoolError::PoolNotFound(id.to_string()))?;

        let claimant_id = claim.claimant_id.clone();
        let next = prepare_append(current, claim, expected_claim_count)?;

        state.pools.insert(id.clone(), next.clone());
        state.by_claimant.entry(claimant_id).or_default().push(id.clone());
        debug!(
            "Pool {} committed claim {} of {}",
            id,
            next.claims.len(),
            next.total_slots
        );
        Ok(next)
    }

    fn transition_status(
        &self,
        id: &PoolId,
        from: PoolStatus,
        to: PoolStatus,
        reason: Option<ClosureReason>,
    ) -> PoolResult<Pool> {
        let mut state = self.state.write();
        let current = state
            .pools
            .get(id)
            .ok_or_else(|| PoolError::PoolNotFound(id.to_string()))?;

        let next = prepare_transition(current, from, to, reason)?;
        state.pools.insert(id.clone(), next.clone());
        Ok(next)
    }

    fn pools_for_owner(&self, owner_id: &str) -> PoolResult<Vec<PoolId>> {
        Ok(self
            .state
            .read()
            .by_owner
            .get(owner_id)
            .cloned()
            .unwrap_or_default())
    }

    fn pools_for_claimant(&self, claimant_id: &str) -> PoolResult<Vec<PoolId>> {
        Ok(self
            .state
            .read()
            .by_claimant
            .get(claimant_id)
            .cloned()
            .unwrap_or_default())
    }

    fn pool_ids(&self) -> PoolResult<Vec<PoolId>> {
        let mut ids: Vec<PoolId> = self.state.read().pools.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
