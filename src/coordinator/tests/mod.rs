pub mod view_tests;

use std::sync::Arc;

use crate::config::FairpoolConfig;
use crate::coordinator::{ClaimCoordinator, CreatePoolRequest, CreatedPool};
use crate::ledger::{MemoryLedger, PaymentMethod};

pub(super) fn coordinator() -> ClaimCoordinator {
    coordinator_with(FairpoolConfig::default())
}

pub(super) fn coordinator_with(config: FairpoolConfig) -> ClaimCoordinator {
    let _ = env_logger::builder().is_test(true).try_init();
    ClaimCoordinator::new(Arc::new(MemoryLedger::new()), config)
}

pub(super) fn open_pool(coordinator: &ClaimCoordinator, budget: u64, slots: u32) -> CreatedPool {
    coordinator
        .create_pool(CreatePoolRequest {
            owner_id: "owner".to_string(),
            budget,
            total_slots: slots,
            payment_methods: vec![PaymentMethod::Wave],
        })
        .unwrap()
}
