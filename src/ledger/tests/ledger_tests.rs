use chrono::Utc;

use crate::config::{PoolLimits, StoreBackend, StoreConfig};
use crate::errors::PoolError;
use crate::ledger::{
    open_ledger, Claim, ClaimantMetadata, ClosureReason, MemoryLedger, NewPool, PaymentMethod, Pool,
    PoolLedger, PoolStatus,
};
use crate::utils::validate_pool_token;

pub(super) fn new_pool(owner: &str, budget: u64, slots: u32) -> NewPool {
    NewPool {
        owner_id: owner.to_string(),
        budget,
        total_slots: slots,
        payment_methods: vec![PaymentMethod::Wave, PaymentMethod::CbPay],
        expires_at: None,
    }
}

pub(super) fn claim(claimant: &str, portion: u64) -> Claim {
    Claim {
        claimant_id: claimant.to_string(),
        portion,
        granted_at: Utc::now(),
        metadata: ClaimantMetadata::named(claimant.to_uppercase()),
    }
}

fn create(ledger: &dyn PoolLedger, budget: u64, slots: u32) -> Pool {
    ledger
        .create_pool(new_pool("owner", budget, slots), &PoolLimits::default())
        .unwrap()
}

/// Behaviour every ledger backend must share
pub(super) fn exercise_ledger(ledger: &dyn PoolLedger) {
    let pool = create(ledger, 3_000, 3);
    assert!(validate_pool_token(&pool.token));
    assert_eq!(pool.status, PoolStatus::Open);
    assert_eq!(ledger.find_by_token(&pool.token).unwrap().unwrap().id, pool.id);
    assert!(ledger.token_exists(&pool.token).unwrap());
    assert!(ledger.find_by_token("AAAAAAAAAAAA").unwrap().is_none());

    // First append against the version we read
    let after_one = ledger
        .append_claim_if_version_matches(&pool.id, claim("alice", 1_000), 0)
        .unwrap();
    assert_eq!(after_one.claims.len(), 1);
    assert_eq!(after_one.allocated_total, 1_000);
    assert!(after_one.check_invariants());

    // Stale version is rejected and changes nothing
    match ledger.append_claim_if_version_matches(&pool.id, claim("bob", 500), 0) {
        Err(PoolError::VersionConflict { expected, actual, .. }) => {
            assert_eq!(expected, 0);
            assert_eq!(actual, 1);
        }
        other => panic!("expected VersionConflict, got {:?}", other),
    }
    let unchanged = ledger.get_pool(&pool.id).unwrap().unwrap();
    assert_eq!(unchanged.claims.len(), 1);
    assert_eq!(unchanged.allocated_total, 1_000);

    ledger
        .append_claim_if_version_matches(&pool.id, claim("bob", 500), 1)
        .unwrap();
    let full = ledger
        .append_claim_if_version_matches(&pool.id, claim("carol", 1_500), 2)
        .unwrap();

    // Exhaustion lands in the same write as the final grant
    assert_eq!(full.status, PoolStatus::Exhausted);
    assert_eq!(full.allocated_total, 3_000);
    assert_eq!(
        full.claims.iter().map(|c| c.claimant_id.as_str()).collect::<Vec<_>>(),
        vec!["alice", "bob", "carol"]
    );
    assert!(full.check_invariants());

    // Exhausted pools reject appends even with the right count
    assert!(matches!(
        ledger.append_claim_if_version_matches(&pool.id, claim("dave", 1), 3),
        Err(PoolError::VersionConflict { .. })
    ));

    // Secondary indices
    assert_eq!(ledger.pools_for_owner("owner").unwrap(), vec![pool.id.clone()]);
    assert_eq!(ledger.pools_for_claimant("bob").unwrap(), vec![pool.id.clone()]);
    assert!(ledger.pools_for_claimant("dave").unwrap().is_empty());
    assert!(ledger.pool_ids().unwrap().contains(&pool.id));

    // Status writes are conditional too
    assert!(matches!(
        ledger.transition_status(&pool.id, PoolStatus::Open, PoolStatus::Closed, None),
        Err(PoolError::StatusConflict { .. })
    ));
    let closed = ledger
        .transition_status(
            &pool.id,
            PoolStatus::Exhausted,
            PoolStatus::Closed,
            Some(ClosureReason::Administrative),
        )
        .unwrap();
    assert_eq!(closed.status, PoolStatus::Closed);
    assert_eq!(closed.closure_reason, Some(ClosureReason::Administrative));
}

#[test]
fn test_memory_ledger_contract() {
    exercise_ledger(&MemoryLedger::new());
}

#[test]
fn test_append_to_missing_pool() {
    let ledger = MemoryLedger::new();
    assert!(matches!(
        ledger.append_claim_if_version_matches(&"nope".into(), claim("a", 1), 0),
        Err(PoolError::PoolNotFound(_))
    ));
}

#[test]
fn test_overspending_claim_rejected() {
    let ledger = MemoryLedger::new();
    let pool = create(&ledger, 1_000, 2);
    assert!(matches!(
        ledger.append_claim_if_version_matches(&pool.id, claim("a", 1_001), 0),
        Err(PoolError::InvalidAllocationInput(_))
    ));
    assert_eq!(ledger.get_pool(&pool.id).unwrap().unwrap().allocated_total, 0);
}

#[test]
fn test_duplicate_insert_rejected() {
    let ledger = MemoryLedger::new();
    let pool = create(&ledger, 1_000, 2);
    assert!(matches!(
        ledger.insert_pool(pool),
        Err(PoolError::DuplicatePool(_))
    ));
    assert_eq!(ledger.len(), 1);
}

#[test]
fn test_create_pool_validation() {
    let ledger = MemoryLedger::new();
    let limits = PoolLimits::default();
    let field_of = |params: NewPool| match ledger.create_pool(params, &limits) {
        Err(PoolError::InvalidPoolParameters { field, .. }) => field,
        other => panic!("expected InvalidPoolParameters, got {:?}", other),
    };

    assert_eq!(field_of(new_pool("owner", 999, 5)), "budget");
    assert_eq!(field_of(new_pool("owner", 10_000_001, 5)), "budget");
    assert_eq!(field_of(new_pool("owner", 5_000, 1)), "total_slots");
    assert_eq!(field_of(new_pool("owner", 5_000, 31)), "total_slots");
    assert_eq!(field_of(new_pool("", 5_000, 5)), "owner_id");

    let mut no_methods = new_pool("owner", 5_000, 5);
    no_methods.payment_methods.clear();
    assert_eq!(field_of(no_methods), "payment_methods");

    let mut duplicated = new_pool("owner", 5_000, 5);
    duplicated.payment_methods = vec![PaymentMethod::Kpay, PaymentMethod::Kpay];
    assert_eq!(field_of(duplicated), "payment_methods");

    assert!(ledger.is_empty());
}

#[test]
fn test_payment_method_names() {
    assert_eq!("a_plus_wallet".parse::<PaymentMethod>().unwrap(), PaymentMethod::APlusWallet);
    assert_eq!(PaymentMethod::CbPay.to_string(), "cb_pay");
    assert_eq!(serde_json::to_string(&PaymentMethod::Ayapay).unwrap(), "\"ayapay\"");
    assert!("paypal".parse::<PaymentMethod>().is_err());
}

#[test]
fn test_open_ledger_by_backend() {
    let memory = open_ledger(&StoreConfig::default()).unwrap();
    assert!(memory.pool_ids().unwrap().is_empty());

    let missing_path = StoreConfig {
        backend: StoreBackend::Sled,
        path: None,
    };
    assert!(matches!(open_ledger(&missing_path), Err(PoolError::Config(_))));
}
