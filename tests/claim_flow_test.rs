mod common;

use std::sync::Arc;
use std::thread;

use chrono::{Duration, Utc};
use fairpool::{ClaimantMetadata, ClosureReason, FairpoolConfig, PoolError, PoolStatus};

use common::{create_test_pool, memory_coordinator};

#[test]
fn test_pool_lifecycle_end_to_end() {
    let coordinator = memory_coordinator(FairpoolConfig::default());
    let created = create_test_pool(&coordinator, 25_000, 3);

    for name in ["ana", "ben", "cho"] {
        let receipt = coordinator
            .claim(&created.shareable_token, name, ClaimantMetadata::named(name))
            .unwrap();
        assert!(receipt.portion >= 1);
    }

    let view = coordinator.pool_view(&created.shareable_token, Some("ben")).unwrap();
    assert_eq!(view.status, PoolStatus::Exhausted);
    let dashboard = view.dashboard.unwrap();
    assert_eq!(dashboard.total_distributed, 25_000);
    assert_eq!(dashboard.claims.len(), 3);
    assert_eq!(view.viewer_claim.unwrap().claimant_id, "ben");

    assert!(matches!(
        coordinator.claim(&created.shareable_token, "dee", ClaimantMetadata::named("dee")),
        Err(PoolError::PoolNotOpen { .. })
    ));

    let closed = coordinator
        .lifecycle()
        .close(&created.pool_id, ClosureReason::Administrative)
        .unwrap();
    assert_eq!(closed.status, PoolStatus::Closed);
    assert_eq!(closed.allocated_total, 25_000);
}

#[test]
fn test_expired_pool_stops_accepting_claims() {
    let mut config = FairpoolConfig::default();
    config.pools.default_ttl_hours = Some(1);
    let coordinator = memory_coordinator(config);
    let created = create_test_pool(&coordinator, 5_000, 4);
    coordinator
        .claim(&created.shareable_token, "early", ClaimantMetadata::named("early"))
        .unwrap();

    let swept = coordinator
        .lifecycle()
        .close_expired(Utc::now() + Duration::hours(2))
        .unwrap();
    assert_eq!(swept, vec![created.pool_id.clone()]);

    match coordinator.claim(&created.shareable_token, "late", ClaimantMetadata::named("late")) {
        Err(PoolError::PoolNotOpen { status, .. }) => assert_eq!(status, PoolStatus::Closed),
        other => panic!("expected PoolNotOpen, got {:?}", other),
    }
    let view = coordinator.pool_view(&created.shareable_token, None).unwrap();
    assert_eq!(view.closure_reason, Some(ClosureReason::Expired));
}

#[test]
fn test_parallel_claimants_split_budget_exactly() {
    let mut config = FairpoolConfig::default();
    config.claims.max_attempts = 31;
    let coordinator = Arc::new(memory_coordinator(config));
    let created = create_test_pool(&coordinator, 1_000_000, 30);

    let receipts: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..45)
            .map(|i| {
                let coordinator = coordinator.clone();
                let token = created.shareable_token.clone();
                scope.spawn(move || {
                    let id = format!("user-{}", i);
                    coordinator.claim_with_retry(&token, &id, ClaimantMetadata::named(id.clone()))
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let granted: u64 = receipts.iter().filter_map(|r| r.as_ref().ok()).map(|r| r.portion).sum();
    assert_eq!(receipts.iter().filter(|r| r.is_ok()).count(), 30);
    assert_eq!(granted, 1_000_000);

    let participated = coordinator.pools_for_user("user-0").unwrap().participated.len();
    assert!(participated <= 1);
}
