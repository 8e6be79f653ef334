use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;

use fairpool::{
    compute_portion, distribute_all, ClaimCoordinator, ClaimantMetadata, CreatePoolRequest,
    FairpoolConfig, MemoryLedger, PaymentMethod,
};

fn bench_compute_portion(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_portion");
    for &budget in &[999u64, 10_000, 1_000_000] {
        group.bench_with_input(BenchmarkId::from_parameter(budget), &budget, |b, &budget| {
            let mut rng = StdRng::seed_from_u64(7);
            b.iter(|| compute_portion(&mut rng, black_box(budget), 10, 3, budget / 4))
        });
    }
    group.finish();
}

fn bench_distribute_all(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);
    c.bench_function("distribute_all_30_slots", |b| {
        b.iter(|| distribute_all(&mut rng, black_box(1_000_000), 30))
    });
}

fn bench_fill_pool(c: &mut Criterion) {
    c.bench_function("fill_pool_30_slots", |b| {
        b.iter(|| {
            let coordinator =
                ClaimCoordinator::new(Arc::new(MemoryLedger::new()), FairpoolConfig::default());
            let created = coordinator
                .create_pool(CreatePoolRequest {
                    owner_id: "owner".to_string(),
                    budget: 1_000_000,
                    total_slots: 30,
                    payment_methods: vec![PaymentMethod::Kpay],
                })
                .unwrap();
            for i in 0..30 {
                let claimant = format!("c{}", i);
                coordinator
                    .claim(&created.shareable_token, &claimant, ClaimantMetadata::named("bench"))
                    .unwrap();
            }
        })
    });
}

criterion_group!(benches, bench_compute_portion, bench_distribute_all, bench_fill_pool);
criterion_main!(benches);
