//! # Partition Pool
//!
//! Partitioned, thread-safe pool for scarce, expensive-to-create resources
//! such as database connections.
//!
//! ## Features
//!
//! - Independently locked partitions to spread contention
//! - Bounded size per partition with blocking borrow and timeout
//! - Validation of idle resources before reuse, silent replacement on failure
//! - Automatic return of resources via RAII (Drop trait)
//! - Explicit return, invalidate and detach of borrowed resources
//! - Idempotent close that wakes blocked borrowers
//! - Pool warm-up, idle eviction and max lifetime
//! - Metrics, Prometheus export and health status
//! - Pooled data source façade for database connections
//!
//! ## Quick Start
//!
//! ```rust
//! use partition_pool::{FnFactory, Pool, PoolConfiguration};
//!
//! let factory = FnFactory::new(|| Ok(String::from("connection")))
//!     .with_validate(|conn: &String| !conn.is_empty());
//! let pool = Pool::new(factory, PoolConfiguration::default()).unwrap();
//! {
//!     let conn = pool.borrow().unwrap();
//!     println!("Got: {}", *conn);
//!     // Resource automatically returned when `conn` goes out of scope
//! }
//! assert_eq!(pool.idle_count(), 1);
//! ```

mod pool;
mod partition;
mod handle;
mod factory;
mod config;
mod metrics;
mod health;
mod eviction;
mod datasource;
mod errors;

pub use pool::Pool;
pub use partition::PartitionStats;
pub use handle::PooledObject;
pub use factory::{FnFactory, ObjectFactory};
pub use config::PoolConfiguration;
pub use metrics::PoolMetrics;
#[cfg(feature = "metrics")]
pub use metrics::MetricsExporter;
pub use health::HealthStatus;
pub use eviction::EvictionPolicy;
pub use datasource::{Connection, Connector, DataSourceConfig, PooledDataSource};
pub use errors::{BoxError, PoolError, PoolResult};
