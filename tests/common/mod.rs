use std::sync::Arc;

use fairpool::{
    ClaimCoordinator, CreatePoolRequest, CreatedPool, FairpoolConfig, MemoryLedger, PaymentMethod,
    PoolLedger,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn memory_coordinator(config: FairpoolConfig) -> ClaimCoordinator {
    init_logging();
    ClaimCoordinator::new(Arc::new(MemoryLedger::new()), config)
}

pub fn coordinator_over(ledger: Arc<dyn PoolLedger>, config: FairpoolConfig) -> ClaimCoordinator {
    init_logging();
    ClaimCoordinator::new(ledger, config)
}

pub fn create_test_pool(coordinator: &ClaimCoordinator, budget: u64, slots: u32) -> CreatedPool {
    coordinator
        .create_pool(CreatePoolRequest {
            owner_id: "owner".to_string(),
            budget,
            total_slots: slots,
            payment_methods: vec![PaymentMethod::Wave, PaymentMethod::Ayapay],
        })
        .unwrap()
}
