//! Async usage examples

use partition_pool::{FnFactory, Pool, PoolConfiguration};
use std::time::Duration;
use tokio::time::sleep;

#[tokio::main]
async fn main() {
    println!("=== Partition Pool - Async Examples ===\n");

    // Example 1: Async borrow
    async_borrow().await;

    // Example 2: Async borrow with timeout
    async_with_timeout().await;

    // Example 3: Concurrent access
    concurrent_access().await;
}

async fn async_borrow() {
    println!("1. Async Borrow:");
    let pool = Pool::new(FnFactory::new(|| Ok(42u32)), PoolConfiguration::default()).unwrap();

    {
        let obj = pool.borrow_async().await.unwrap();
        println!("   Got resource asynchronously: {}", *obj);
    }

    println!();
}

async fn async_with_timeout() {
    println!("2. Async with Timeout:");

    let config = PoolConfiguration::new()
        .with_max_size(1)
        .with_max_wait(Duration::from_millis(100));
    let pool = Pool::new(FnFactory::new(|| Ok(42u32)), config).unwrap();

    // Hold the only resource
    let _obj = pool.borrow().unwrap();

    // Try to get another (should time out)
    match pool.borrow_async().await {
        Ok(_) => println!("   Got resource"),
        Err(e) => println!("   Error: {}", e),
    }

    println!();
}

async fn concurrent_access() {
    println!("3. Concurrent Access:");

    let config = PoolConfiguration::new()
        .with_partition_count(2)
        .with_max_size(2)
        .with_max_wait(Duration::from_secs(2));
    let pool = Pool::new(FnFactory::new(|| Ok(0u64)), config).unwrap();

    let mut tasks = Vec::new();
    for i in 0..10u64 {
        let pool = pool.clone();
        tasks.push(tokio::spawn(async move {
            let mut obj = pool.borrow_async().await?;
            *obj += i;
            sleep(Duration::from_millis(10)).await;
            Ok::<u64, partition_pool::PoolError>(*obj)
        }));
    }

    for task in tasks {
        match task.await {
            Ok(Ok(value)) => println!("   Task saw value {}", value),
            Ok(Err(e)) => println!("   Task failed: {}", e),
            Err(e) => println!("   Task panicked: {}", e),
        }
    }

    let metrics = pool.get_metrics();
    println!("   Borrowed: {}, created: {}", metrics.total_borrowed, metrics.total_created);
}
