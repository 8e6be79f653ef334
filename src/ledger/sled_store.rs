//! Durable ledger on sled.
//!
//! Pools are stored as JSON documents keyed by id. The claim append is a single
//! `compare_and_swap` against the exact bytes that were read, so any concurrent writer (in this
//! process or another one sharing the database) turns the later write into a `VersionConflict`.
//! Token, owner and claimant lookups live in their own trees.
//!
//! Background flushing is disabled. Every committed write is flushed before it is acknowledged,
//! and dropping the ledger releases the database lock straight away.

use std::path::Path;

use log::{debug, warn};
use sled::{Db, IVec, Tree};

use crate::errors::{PoolError, PoolResult};
use crate::ledger::{
    prepare_append, prepare_transition, Claim, ClosureReason, Pool, PoolId, PoolLedger, PoolStatus,
};

const POOLS_TREE: &str = "pools";
const TOKENS_TREE: &str = "pool_tokens";
const OWNERS_TREE: &str = "pools_by_owner";
const CLAIMANTS_TREE: &str = "pools_by_claimant";

pub struct SledLedger {
    db: Db,
    pools: Tree,
    tokens: Tree,
    owners: Tree,
    claimants: Tree,
}

impl SledLedger {
    pub fn open(path: &Path) -> PoolResult<Self> {
        let db = sled::Config::new()
            .path(path)
            .flush_every_ms(None)
            .open()?;
        Self::from_db(db)
    }

    /// Throwaway database that is removed when dropped.
    pub fn temporary() -> PoolResult<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .flush_every_ms(None)
            .open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> PoolResult<Self> {
        Ok(SledLedger {
            pools: db.open_tree(POOLS_TREE)?,
            tokens: db.open_tree(TOKENS_TREE)?,
            owners: db.open_tree(OWNERS_TREE)?,
            claimants: db.open_tree(CLAIMANTS_TREE)?,
            db,
        })
    }

    pub fn flush(&self) -> PoolResult<()> {
        self.db.flush()?;
        Ok(())
    }

    // The write is already visible to readers; a failed flush is reported but not unwound
    fn persist(&self, id: &PoolId) {
        if let Err(err) = self.db.flush() {
            warn!("Failed to flush pool {} to disk: {}", id, err);
        }
    }

    fn load(&self, id: &PoolId) -> PoolResult<Option<(IVec, Pool)>> {
        match self.pools.get(id.as_str().as_bytes())? {
            Some(bytes) => {
                let pool: Pool = serde_json::from_slice(&bytes)?;
                Ok(Some((bytes, pool)))
            }
            None => Ok(None),
        }
    }

    /// Swaps `old` for `next`, reporting a lost race through `on_conflict`.
    fn swap<F>(&self, id: &PoolId, old: IVec, next: &Pool, on_conflict: F) -> PoolResult<()>
    where
        F: FnOnce(Option<Pool>) -> PoolError,
    {
        let encoded = serde_json::to_vec(next)?;
        match self
            .pools
            .compare_and_swap(id.as_str().as_bytes(), Some(old), Some(encoded))?
        {
            Ok(()) => Ok(()),
            Err(cas) => {
                let current = cas
                    .current
                    .and_then(|bytes| serde_json::from_slice::<Pool>(&bytes).ok());
                Err(on_conflict(current))
            }
        }
    }

    fn read_index(tree: &Tree, key: &str) -> PoolResult<Vec<PoolId>> {
        match tree.get(key.as_bytes())? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Vec::new()),
        }
    }

    fn add_to_index(tree: &Tree, key: &str, id: &PoolId) -> PoolResult<()> {
        tree.fetch_and_update(key.as_bytes(), |existing| {
            let mut ids: Vec<PoolId> = existing
                .and_then(|bytes| serde_json::from_slice(bytes).ok())
                .unwrap_or_default();
            if !ids.contains(id) {
                ids.push(id.clone());
            }
            serde_json::to_vec(&ids).ok()
        })?;
        Ok(())
    }
}

impl PoolLedger for SledLedger {
    fn insert_pool(&self, pool: Pool) -> PoolResult<()> {
        // Claim the token first so two creators can never share one
        let token_taken = self
            .tokens
            .compare_and_swap(
                pool.token.as_bytes(),
                None as Option<&[u8]>,
                Some(pool.id.as_str().as_bytes()),
            )?
            .is_err();
        if token_taken {
            return Err(PoolError::DuplicatePool(pool.id.to_string()));
        }

        let encoded = serde_json::to_vec(&pool)?;
        let id_taken = self
            .pools
            .compare_and_swap(pool.id.as_str().as_bytes(), None as Option<&[u8]>, Some(encoded))?
            .is_err();
        if id_taken {
            self.tokens.remove(pool.token.as_bytes())?;
            return Err(PoolError::DuplicatePool(pool.id.to_string()));
        }

        // The pool is committed; a failed index write must not turn it into an error
        if let Err(err) = Self::add_to_index(&self.owners, &pool.owner_id, &pool.id) {
            warn!("Failed to index owner {} for pool {}: {}", pool.owner_id, pool.id, err);
        }
        self.persist(&pool.id);
        Ok(())
    }

    fn get_pool(&self, id: &PoolId) -> PoolResult<Option<Pool>> {
        Ok(self.load(id)?.map(|(_, pool)| pool))
    }

    fn find_by_token(&self, token: &str) -> PoolResult<Option<Pool>> {
        match self.tokens.get(token.as_bytes())? {
            Some(id_bytes) => {
                let id = PoolId::from(String::from_utf8_lossy(&id_bytes).into_owned());
                self.get_pool(&id)
            }
            None => Ok(None),
        }
    }

    fn token_exists(&self, token: &str) -> PoolResult<bool> {
        Ok(self.tokens.contains_key(token.as_bytes())?)
    }

    fn append_claim_if_version_matches(
        &self,
        id: &PoolId,
        claim: Claim,
        expected_claim_count: usize,
    ) -> PoolResult<Pool> {
        let (bytes, current) = self
            .load(id)?
            .ok_or_else(|| PoolError::PoolNotFound(id.to_string()))?;

        let claimant_id = claim.claimant_id.clone();
        let next = prepare_append(&current, claim, expected_claim_count)?;

        self.swap(id, bytes, &next, |latest| {
            let actual = latest.map(|p| p.claims.len()).unwrap_or(0);
            debug!(
                "Pool {} moved under us: expected {} claims, found {}",
                id, expected_claim_count, actual
            );
            PoolError::VersionConflict {
                pool_id: id.to_string(),
                expected: expected_claim_count,
                actual,
            }
        })?;

        // The claim is committed; a failed index write must not turn it into an error
        if let Err(err) = Self::add_to_index(&self.claimants, &claimant_id, id) {
            warn!("Failed to index claimant {} for pool {}: {}", claimant_id, id, err);
        }
        self.persist(id);
        Ok(next)
    }

    fn transition_status(
        &self,
        id: &PoolId,
        from: PoolStatus,
        to: PoolStatus,
        reason: Option<ClosureReason>,
    ) -> PoolResult<Pool> {
        let (bytes, current) = self
            .load(id)?
            .ok_or_else(|| PoolError::PoolNotFound(id.to_string()))?;

        let next = prepare_transition(&current, from, to, reason)?;
        self.swap(id, bytes, &next, |latest| PoolError::StatusConflict {
            pool_id: id.to_string(),
            expected: from,
            actual: latest.map(|p| p.status).unwrap_or(from),
        })?;
        self.persist(id);
        Ok(next)
    }

    fn pools_for_owner(&self, owner_id: &str) -> PoolResult<Vec<PoolId>> {
        Self::read_index(&self.owners, owner_id)
    }

    fn pools_for_claimant(&self, claimant_id: &str) -> PoolResult<Vec<PoolId>> {
        Self::read_index(&self.claimants, claimant_id)
    }

    fn pool_ids(&self) -> PoolResult<Vec<PoolId>> {
        self.pools
            .iter()
            .keys()
            .map(|key| {
                let key = key?;
                Ok(PoolId::from(String::from_utf8_lossy(&key).into_owned()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolLimits;
    use crate::ledger::{NewPool, PaymentMethod};

    #[test]
    fn test_unreadable_owner_index_does_not_fail_creation() {
        let ledger = SledLedger::temporary().unwrap();
        ledger.owners.insert("owner".as_bytes(), b"not json".to_vec()).unwrap();

        let pool = ledger
            .create_pool(
                NewPool {
                    owner_id: "owner".to_string(),
                    budget: 2_000,
                    total_slots: 2,
                    payment_methods: vec![PaymentMethod::Wave],
                    expires_at: None,
                },
                &PoolLimits::default(),
            )
            .unwrap();

        assert_eq!(ledger.get_pool(&pool.id).unwrap().unwrap(), pool);
        assert_eq!(ledger.pools_for_owner("owner").unwrap(), vec![pool.id]);
    }
}
