//! Error types for the partitioned pool

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Error type returned by resource factories and connectors.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

#[derive(Error, Debug, Clone)]
pub enum PoolError {
    /// The factory failed to produce a resource. Not retried by the pool.
    #[error("Failed to create pooled resource: {0}")]
    Create(#[source] Arc<dyn StdError + Send + Sync + 'static>),

    #[error("No resource became available within {0:?}")]
    Exhausted(Duration),

    #[error("Pool is closed")]
    Closed,

    /// A handle that is not checked out from this pool was returned or invalidated.
    #[error("Handle is not checked out from this pool")]
    InvalidHandle,

    #[error("Invalid pool configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Operation not supported: {0}")]
    Unsupported(&'static str),

    #[error("Metrics export failed: {0}")]
    Metrics(String),

    #[error("Failed to start evictor thread: {0}")]
    EvictorSpawn(String),

    #[error("Operation was cancelled")]
    Cancelled,
}

impl PoolError {
    pub(crate) fn create(err: BoxError) -> Self {
        PoolError::Create(Arc::from(err))
    }

    /// Whether the caller may reasonably retry the same call later.
    ///
    /// Only exhaustion is transient; a closed pool or a bad handle never heals.
    pub fn is_transient(&self) -> bool {
        matches!(self, PoolError::Exhausted(_))
    }
}

pub type PoolResult<T> = Result<T, PoolError>;
