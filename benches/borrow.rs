use criterion::{Criterion, criterion_group, criterion_main};
use partition_pool::{FnFactory, Pool, PoolConfiguration};
use std::hint::black_box;
use std::thread;

fn pool(partitions: usize) -> Pool<Vec<u8>> {
    let config = PoolConfiguration::new()
        .with_partition_count(partitions)
        .with_min_size(4)
        .with_max_size(4);
    Pool::new(FnFactory::new(|| Ok(vec![0u8; 4096])), config).unwrap()
}

fn borrow_return(c: &mut Criterion) {
    let single = pool(1);
    c.bench_function("borrow_return_idle", |b| {
        b.iter(|| {
            let buffer = single.borrow().unwrap();
            black_box(buffer.len());
        })
    });

    for partitions in [1, 4] {
        let shared = pool(partitions);
        c.bench_function(&format!("contended_4_threads_{partitions}_partitions"), |b| {
            b.iter(|| {
                thread::scope(|s| {
                    for _ in 0..4 {
                        s.spawn(|| {
                            for _ in 0..64 {
                                black_box(shared.borrow().unwrap().len());
                            }
                        });
                    }
                });
            })
        });
    }
}

criterion_group!(benches, borrow_return);
criterion_main!(benches);
