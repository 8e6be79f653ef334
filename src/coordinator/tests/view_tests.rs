use super::{coordinator, open_pool};
use crate::errors::PoolError;
use crate::ledger::{ClaimantMetadata, PoolStatus};

#[test]
fn test_view_hides_dashboard_until_exhausted() {
    let coordinator = coordinator();
    let created = open_pool(&coordinator, 6_000, 2);
    coordinator
        .claim(&created.shareable_token, "alice", ClaimantMetadata::named("Alice"))
        .unwrap();

    let view = coordinator.pool_view(&created.shareable_token, Some("alice")).unwrap();
    assert_eq!(view.claims_count, 1);
    assert_eq!(view.remaining_slots, 1);
    assert_eq!(view.status, PoolStatus::Open);
    assert_eq!(view.viewer_claim.as_ref().unwrap().claimant_id, "alice");
    assert!(view.dashboard.is_none());

    let anonymous = coordinator.pool_view(&created.shareable_token, None).unwrap();
    assert!(anonymous.viewer_claim.is_none());

    // Owner sees the breakdown at any time
    let owner = coordinator.pool_view(&created.shareable_token, Some("owner")).unwrap();
    assert_eq!(owner.dashboard.unwrap().claims.len(), 1);

    coordinator
        .claim(&created.shareable_token, "bob", ClaimantMetadata::named("Bob"))
        .unwrap();
    let view = coordinator.pool_view(&created.shareable_token, None).unwrap();
    let dashboard = view.dashboard.unwrap();
    assert_eq!(dashboard.total_distributed, 6_000);
    assert_eq!(dashboard.stats.count, 2);
    assert_eq!(dashboard.stats.total, 6_000);
}

#[test]
fn test_view_of_unknown_pool() {
    let coordinator = coordinator();
    assert!(matches!(
        coordinator.pool_view("AAAAAAAAAAAA", None),
        Err(PoolError::PoolNotFound(_))
    ));
}

#[test]
fn test_pools_for_user_uses_indices() {
    let coordinator = coordinator();
    let first = open_pool(&coordinator, 3_000, 3);
    let second = open_pool(&coordinator, 4_000, 3);
    coordinator
        .claim(&first.shareable_token, "alice", ClaimantMetadata::named("Alice"))
        .unwrap();

    let owner = coordinator.pools_for_user("owner").unwrap();
    assert_eq!(owner.created.len(), 2);
    assert!(owner.participated.is_empty());

    let alice = coordinator.pools_for_user("alice").unwrap();
    assert!(alice.created.is_empty());
    assert_eq!(alice.participated.len(), 1);
    assert_eq!(alice.participated[0].pool.id, first.pool_id);
    assert_eq!(alice.participated[0].claim.claimant_id, "alice");

    let nobody = coordinator.pools_for_user("nobody").unwrap();
    assert!(nobody.created.is_empty() && nobody.participated.is_empty());
    let _ = second;
}
