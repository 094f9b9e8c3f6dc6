use core::hint::black_box;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use futures::future::join_all;
use jobpool_core::{
    Result,
    pool::{ManageConnection, Pool, PoolConfig},
};
use std::time::Duration;
use tokio::runtime::Builder;

struct NoopManager;

impl ManageConnection for NoopManager {
    type Connection = u64;

    async fn connect(&self) -> Result<u64> {
        Ok(0)
    }
}

fn pool_bench(c: &mut Criterion) {
    let rt = Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build runtime");

    let pool = rt
        .block_on(Pool::new(
            NoopManager,
            PoolConfig::default()
                .with_max_size(8)
                .with_min_size(8)
                .with_acquire_timeout(Duration::from_secs(5)),
        ))
        .expect("failed to build pool");

    let mut group = c.benchmark_group("pool");
    group.throughput(Throughput::Elements(1));

    group.bench_function("acquire_release/uncontended", |b| {
        b.to_async(&rt).iter(|| async {
            let conn = pool.acquire().await.expect("acquire failed");
            black_box(*conn);
        });
    });

    for concurrency in [8, 32, 128] {
        group.throughput(Throughput::Elements(concurrency as u64));
        group.bench_function(format!("acquire_release/contended_x{concurrency}"), |b| {
            b.to_async(&rt).iter(|| {
                let pool = pool.clone();
                async move {
                    join_all((0..concurrency).map(|_| async {
                        let conn = pool.acquire().await.expect("acquire failed");
                        black_box(*conn);
                    }))
                    .await;
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, pool_bench);
criterion_main!(benches);
