//! Point-in-time health report built from partition counters

use crate::partition::PartitionStats;

const UTILIZATION_LIMIT: f64 = 0.9;

/// Health of a pool as seen across all of its partitions
///
/// # Examples
///
/// ```
/// use partition_pool::{FnFactory, Pool, PoolConfiguration};
///
/// let config = PoolConfiguration::new().with_min_size(3);
/// let pool = Pool::new(FnFactory::new(|| Ok(1u32)), config).unwrap();
///
/// let health = pool.get_health_status();
/// assert!(health.is_healthy());
/// assert_eq!(health.idle_objects, 3);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HealthStatus {
    pub is_healthy: bool,

    /// Borrowed resources over total capacity, 0.0 to 1.0
    pub utilization: f64,

    pub idle_objects: usize,
    pub active_objects: usize,
    pub total_capacity: usize,

    /// Partitions with no idle resource and no free slot
    pub exhausted_partitions: usize,

    /// Threads blocked in a borrow when the report was taken
    pub waiters: usize,

    pub closed: bool,

    /// Human-readable reasons behind the verdict
    pub warnings: Vec<String>,
}

impl HealthStatus {
    pub(crate) fn from_partitions(stats: &[PartitionStats], capacity: usize, closed: bool) -> Self {
        let idle_objects = stats.iter().map(|s| s.idle).sum();
        let active_objects: usize = stats.iter().map(|s| s.active).sum();
        let waiters = stats.iter().map(|s| s.waiters).sum();
        let exhausted_partitions = stats
            .iter()
            .filter(|s| s.idle == 0 && s.capacity > 0 && s.created >= s.capacity)
            .count();
        let utilization = if capacity == 0 {
            0.0
        } else {
            active_objects as f64 / capacity as f64
        };

        let mut warnings = Vec::new();
        if closed {
            warnings.push("pool is closed".to_string());
        }
        if utilization > UTILIZATION_LIMIT {
            warnings.push(format!("utilization at {:.1}%", utilization * 100.0));
        }
        if !closed && exhausted_partitions > 0 {
            warnings.push(format!(
                "{exhausted_partitions} of {} partitions exhausted, {waiters} borrowers waiting",
                stats.len()
            ));
        }

        Self {
            is_healthy: !closed && utilization <= UTILIZATION_LIMIT,
            utilization,
            idle_objects,
            active_objects,
            total_capacity: capacity,
            exhausted_partitions,
            waiters,
            closed,
            warnings,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.is_healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(index: usize, idle: usize, active: usize, waiters: usize) -> PartitionStats {
        PartitionStats {
            index,
            idle,
            active,
            created: idle + active,
            capacity: 2,
            waiters,
            closed: false,
        }
    }

    #[test]
    fn test_fully_borrowed_pool_is_unhealthy() {
        let status = HealthStatus::from_partitions(&[stats(0, 0, 2, 3), stats(1, 0, 2, 0)], 4, false);
        assert!(!status.is_healthy());
        assert_eq!(status.exhausted_partitions, 2);
        assert_eq!(status.waiters, 3);
        assert_eq!(status.warnings.len(), 2);
    }

    #[test]
    fn test_one_hot_partition_warns_but_stays_healthy() {
        let status = HealthStatus::from_partitions(&[stats(0, 0, 2, 1), stats(1, 2, 0, 0)], 4, false);
        assert!(status.is_healthy());
        assert_eq!(status.exhausted_partitions, 1);
        assert_eq!(status.warnings.len(), 1);
        assert!(status.warnings[0].starts_with("1 of 2 partitions"));
    }

    #[test]
    fn test_closed_pool_is_unhealthy() {
        let status = HealthStatus::from_partitions(&[], 4, true);
        assert!(!status.is_healthy());
        assert_eq!(status.warnings, vec!["pool is closed".to_string()]);
    }
}
