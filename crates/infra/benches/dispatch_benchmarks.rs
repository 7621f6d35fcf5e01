use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use storesync_core::{Counter, Store, StoreId};
use storesync_infra::audit::{EventLogger, TracingSink};
use storesync_infra::cache::InMemoryLockCache;
use storesync_infra::dispatch::{BatchDispatcher, DispatchMode};
use storesync_infra::jobs::{ExecutionBudget, JobRunner, LockManager, StoreJobFactory};
use storesync_infra::queue::{InMemoryJobQueue, JobQueue};
use storesync_infra::registry::{InMemoryStoreRegistry, StoreSelection};
use storesync_infra::shopify::{InMemoryStoreApi, RemoteShop};

fn fixture(n: i64) -> (Arc<InMemoryStoreRegistry>, Arc<InMemoryStoreApi>) {
    let api = Arc::new(InMemoryStoreApi::new());
    let stores: Vec<Store> = (1..=n)
        .map(|id| {
            let domain = format!("shop{id}.example.com");
            api.insert(
                domain.clone(),
                RemoteShop::named(format!("Store {id}")).with_count(Counter::OrderCount, 42),
            );
            Store::new(StoreId::new(id), domain, "tok")
        })
        .collect();
    (Arc::new(InMemoryStoreRegistry::with_stores(stores)), api)
}

fn dispatcher(
    registry: Arc<InMemoryStoreRegistry>,
    api: Arc<InMemoryStoreApi>,
    budget: ExecutionBudget,
    chunk_size: usize,
) -> (BatchDispatcher, Arc<InMemoryJobQueue>) {
    let logger = EventLogger::new(Arc::new(TracingSink::new()), "storesync");
    let locks = LockManager::new(
        Arc::new(InMemoryLockCache::new()),
        logger.clone(),
        Duration::from_secs(60),
    );
    let runner = JobRunner::new(locks, logger, budget);
    let factory = Arc::new(StoreJobFactory::new(api, registry.clone()));
    let queue = Arc::new(InMemoryJobQueue::new());
    let dispatcher =
        BatchDispatcher::new(registry, runner, factory, chunk_size).with_queue(queue.clone());
    (dispatcher, queue)
}

fn bench_inline_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("inline_dispatch");
    let counters = BTreeSet::from([Counter::OrderCount]);

    for store_count in [10i64, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*store_count as u64));
        group.bench_with_input(
            BenchmarkId::new("unbudgeted", store_count),
            store_count,
            |b, &n| {
                let (registry, api) = fixture(n);
                let (dispatcher, _queue) = dispatcher(registry, api, ExecutionBudget::unlimited(), 100);

                b.iter(|| {
                    black_box(
                        dispatcher
                            .run(&StoreSelection::all(), &counters, &DispatchMode::Inline, &mut |_| {})
                            .unwrap(),
                    )
                });
            },
        );
    }

    group.finish();
}

fn bench_budget_overhead(c: &mut Criterion) {
    let mut group = c.benchmark_group("execution_budget_overhead");
    let counters = BTreeSet::new();

    for (label, budget) in [
        ("unlimited", ExecutionBudget::unlimited()),
        ("thread_per_job", ExecutionBudget::new(Duration::from_secs(30))),
    ] {
        group.bench_function(label, |b| {
            let (registry, api) = fixture(100);
            let (dispatcher, _queue) = dispatcher(registry, api, budget, 100);

            b.iter(|| {
                black_box(
                    dispatcher
                        .run(&StoreSelection::all(), &counters, &DispatchMode::Inline, &mut |_| {})
                        .unwrap(),
                )
            });
        });
    }

    group.finish();
}

fn bench_chunk_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("queued_dispatch_chunk_size");
    let counters = BTreeSet::new();

    for chunk_size in [10usize, 100, 1000].iter() {
        group.bench_with_input(
            BenchmarkId::new("enqueue_1000_stores", chunk_size),
            chunk_size,
            |b, &size| {
                let (registry, api) = fixture(1000);
                let (dispatcher, queue) = dispatcher(registry, api, ExecutionBudget::unlimited(), size);
                let mode = DispatchMode::queued("bench");

                b.iter(|| {
                    let report = dispatcher
                        .run(&StoreSelection::all(), &counters, &mode, &mut |_| {})
                        .unwrap();
                    while queue.dequeue("bench").unwrap().is_some() {}
                    black_box(report)
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_inline_dispatch,
    bench_budget_overhead,
    bench_chunk_size
);
criterion_main!(benches);
