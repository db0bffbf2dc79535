//! Basic usage examples for Pool

use partition_pool::{FnFactory, Pool, PoolConfiguration};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn main() {
    println!("=== Partition Pool - Basic Examples ===\n");

    // Example 1: Simple pool
    simple_pool();

    // Example 2: Bounded pool with timeout
    bounded_pool();

    // Example 3: Try borrow and invalidate
    try_and_invalidate();

    // Example 4: Metrics and health
    metrics_and_health();
}

fn numbered_factory() -> FnFactory<usize> {
    let next = AtomicUsize::new(1);
    FnFactory::new(move || Ok(next.fetch_add(1, Ordering::Relaxed)))
}

fn simple_pool() {
    println!("1. Simple Pool:");
    let pool = Pool::new(numbered_factory(), PoolConfiguration::default()).unwrap();

    {
        let obj = pool.borrow().unwrap();
        println!("   Got resource: {}", *obj);
        // Resource automatically returned when dropped
    }

    println!("   Idle after return: {}\n", pool.idle_count());
}

fn bounded_pool() {
    println!("2. Bounded Pool:");

    let config = PoolConfiguration::new()
        .with_max_size(2)
        .with_max_wait(Duration::from_millis(100));
    let pool = Pool::new(numbered_factory(), config).unwrap();

    let _first = pool.borrow().unwrap();
    let _second = pool.borrow().unwrap();
    println!("   Active resources: {}", pool.active_count());

    match pool.borrow() {
        Ok(_) => println!("   Unexpectedly got a third resource"),
        Err(e) => println!("   Third borrow: {}", e),
    }
    println!();
}

fn try_and_invalidate() {
    println!("3. Try Borrow and Invalidate:");
    let pool = Pool::new(numbered_factory(), PoolConfiguration::new().with_max_size(1)).unwrap();

    let obj1 = pool.try_borrow();
    assert!(obj1.is_some());
    println!("   First try: Success");

    let obj2 = pool.try_borrow();
    assert!(obj2.is_none());
    println!("   Second try: None (pool at capacity)");

    if let Some(broken) = obj1 {
        pool.invalidate(broken).unwrap();
    }

    let obj3 = pool.try_borrow();
    println!("   Third try after invalidate: {:?}\n", obj3.map(|o| *o));
}

fn metrics_and_health() {
    println!("4. Metrics and Health:");
    let config = PoolConfiguration::new().with_partition_count(2).with_min_size(2).with_max_size(3);
    let pool = Pool::new(numbered_factory(), config).unwrap();

    {
        let _obj1 = pool.borrow().unwrap();
        let _obj2 = pool.borrow().unwrap();

        let health = pool.get_health_status();
        println!("   Health: {}", if health.is_healthy { "Healthy" } else { "Unhealthy" });
        println!("   Utilization: {:.1}%", health.utilization * 100.0);
        println!("   Active: {}, Idle: {}", health.active_objects, health.idle_objects);
    }

    for stats in pool.partition_stats() {
        println!("   Partition {}: idle={} active={} created={}", stats.index, stats.idle, stats.active, stats.created);
    }

    let metrics = pool.export_metrics();
    println!("\n   Metrics:");
    for (key, value) in metrics {
        println!("     {}: {}", key, value);
    }
}
