//! Pool configuration options

use std::time::Duration;

use crate::errors::{PoolError, PoolResult};
use crate::eviction::EvictionPolicy;

/// Configuration for a partitioned pool
///
/// Sizes are per partition: a pool with `partition_count = 4` and
/// `max_size = 8` holds at most 32 resources.
///
/// # Examples
///
/// ```
/// use partition_pool::PoolConfiguration;
/// use std::time::Duration;
///
/// let config = PoolConfiguration::new()
///     .with_partition_count(4)
///     .with_max_size(16)
///     .with_min_size(2)
///     .with_max_wait(Duration::from_millis(250));
///
/// assert_eq!(config.max_size, 16);
/// assert_eq!(config.max_capacity(), 64);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct PoolConfiguration {
    /// Number of independently locked partitions
    pub partition_count: usize,

    /// Resources pre-created in every partition at startup
    pub min_size: usize,

    /// Hard cap on resources (idle plus active) in every partition
    pub max_size: usize,

    /// Borrow timeout used by `Pool::borrow`
    pub max_wait: Duration,

    /// Re-run validation when a resource is given back
    pub test_on_return: bool,

    /// Validate idle resources during eviction sweeps
    pub test_while_idle: bool,

    /// Destroy idle resources that were not used for this long
    pub idle_timeout: Option<Duration>,

    /// Destroy resources older than this, idle or on return
    pub max_lifetime: Option<Duration>,

    /// Period of the background eviction sweep
    pub eviction_interval: Duration,
}

impl Default for PoolConfiguration {
    fn default() -> Self {
        Self {
            partition_count: 1,
            min_size: 0,
            max_size: 8,
            max_wait: Duration::from_millis(6000),
            test_on_return: false,
            test_while_idle: false,
            idle_timeout: None,
            max_lifetime: None,
            eviction_interval: Duration::from_secs(30),
        }
    }
}

impl PoolConfiguration {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of partitions
    pub fn with_partition_count(mut self, count: usize) -> Self {
        self.partition_count = count;
        self
    }

    /// Set the number of resources pre-created per partition
    pub fn with_min_size(mut self, size: usize) -> Self {
        self.min_size = size;
        self
    }

    /// Set the maximum number of resources per partition
    pub fn with_max_size(mut self, size: usize) -> Self {
        self.max_size = size;
        self
    }

    /// Set the default borrow timeout
    ///
    /// `Duration::ZERO` makes `borrow` fail fast instead of blocking.
    pub fn with_max_wait(mut self, wait: Duration) -> Self {
        self.max_wait = wait;
        self
    }

    /// Validate resources again when they are returned
    pub fn with_test_on_return(mut self, enabled: bool) -> Self {
        self.test_on_return = enabled;
        self
    }

    /// Validate idle resources during eviction sweeps
    pub fn with_test_while_idle(mut self, enabled: bool) -> Self {
        self.test_while_idle = enabled;
        self
    }

    /// Set idle timeout for resources
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Set maximum lifetime for resources
    pub fn with_max_lifetime(mut self, lifetime: Duration) -> Self {
        self.max_lifetime = Some(lifetime);
        self
    }

    /// Set how often the evictor sweeps idle resources
    pub fn with_eviction_interval(mut self, interval: Duration) -> Self {
        self.eviction_interval = interval;
        self
    }

    /// Total number of resources the pool may hold across all partitions
    pub fn max_capacity(&self) -> usize {
        self.partition_count.saturating_mul(self.max_size)
    }

    /// Check the configuration for values the pool cannot honour
    pub fn validate(&self) -> PoolResult<()> {
        if self.partition_count == 0 {
            return Err(PoolError::InvalidConfiguration(
                "partition_count must be greater than 0".to_string(),
            ));
        }
        if self.max_size == 0 {
            return Err(PoolError::InvalidConfiguration(
                "max_size must be greater than 0".to_string(),
            ));
        }
        if self.min_size > self.max_size {
            return Err(PoolError::InvalidConfiguration(format!(
                "min_size ({}) must not exceed max_size ({})",
                self.min_size, self.max_size
            )));
        }
        if self.eviction_interval.is_zero() {
            return Err(PoolError::InvalidConfiguration(
                "eviction_interval must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// The expiry rule derived from `idle_timeout` and `max_lifetime`
    pub fn eviction_policy(&self) -> EvictionPolicy {
        match (self.max_lifetime, self.idle_timeout) {
            (Some(ttl), Some(idle_timeout)) => EvictionPolicy::Combined { ttl, idle_timeout },
            (Some(ttl), None) => EvictionPolicy::TimeToLive(ttl),
            (None, Some(idle)) => EvictionPolicy::IdleTimeout(idle),
            (None, None) => EvictionPolicy::None,
        }
    }

    /// Whether a background evictor thread is needed
    pub(crate) fn needs_evictor(&self) -> bool {
        self.test_while_idle || !matches!(self.eviction_policy(), EvictionPolicy::None)
    }
}
