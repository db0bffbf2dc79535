// Partition Pool
// Partitioned, thread-safe pool for scarce resources

// This is just a binary wrapper - the actual library is in lib.rs
// Run examples with: cargo run --example basic

use partition_pool::{FnFactory, Pool, PoolConfiguration};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== Partition Pool ===");
    println!("See demos/ directory for usage examples");
    println!("Run: cargo run --example basic");
    println!();

    // Quick demo
    println!("Quick Demo:");
    let next = AtomicUsize::new(1);
    let factory = FnFactory::new(move || Ok(format!("conn-{}", next.fetch_add(1, Ordering::Relaxed))));
    let config = PoolConfiguration::new().with_partition_count(2).with_max_size(2);
    let pool = match Pool::new(factory, config) {
        Ok(pool) => pool,
        Err(err) => {
            eprintln!("  Could not build pool: {err}");
            return;
        }
    };

    match pool.borrow() {
        Ok(conn) => println!("  Got resource: {} from partition {}", *conn, conn.partition()),
        Err(err) => println!("  Borrow failed: {err}"),
    }

    println!("  Idle after return: {}", pool.idle_count());
    pool.close();
}
