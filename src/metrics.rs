//! Metrics collection and export for partitioned pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Metrics snapshot for a pool
///
/// # Examples
///
/// ```
/// use partition_pool::{FnFactory, Pool, PoolConfiguration};
///
/// let pool = Pool::new(FnFactory::new(|| Ok(1u32)), PoolConfiguration::default()).unwrap();
///
/// {
///     let _obj = pool.borrow().unwrap();
///     let metrics = pool.get_metrics();
///     assert_eq!(metrics.total_borrowed, 1);
///     assert_eq!(metrics.total_created, 1);
///     assert_eq!(metrics.active_objects, 1);
/// }
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolMetrics {
    /// Total successful borrows
    pub total_borrowed: usize,

    /// Total resources given back healthy or not
    pub total_returned: usize,

    /// Total resources produced by the factory
    pub total_created: usize,

    /// Total resources handed to the factory for destruction
    pub total_destroyed: usize,

    /// Idle resources removed by the evictor
    pub total_evicted: usize,

    /// Resources that failed validation
    pub validation_failures: usize,

    /// Factory create calls that failed
    pub creation_failures: usize,

    /// Borrows that gave up waiting
    pub exhausted_events: usize,

    /// Current active (checked out) resources
    pub active_objects: usize,

    /// Current idle resources
    pub idle_objects: usize,

    /// Current live resources, idle plus active
    pub created_objects: usize,

    /// Maximum pool capacity across partitions
    pub max_capacity: usize,

    /// Pool utilization ratio (0.0 to 1.0)
    pub utilization: f64,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("total_borrowed".to_string(), self.total_borrowed.to_string());
        metrics.insert("total_returned".to_string(), self.total_returned.to_string());
        metrics.insert("total_created".to_string(), self.total_created.to_string());
        metrics.insert("total_destroyed".to_string(), self.total_destroyed.to_string());
        metrics.insert("total_evicted".to_string(), self.total_evicted.to_string());
        metrics.insert("validation_failures".to_string(), self.validation_failures.to_string());
        metrics.insert("creation_failures".to_string(), self.creation_failures.to_string());
        metrics.insert("exhausted_events".to_string(), self.exhausted_events.to_string());
        metrics.insert("active_objects".to_string(), self.active_objects.to_string());
        metrics.insert("idle_objects".to_string(), self.idle_objects.to_string());
        metrics.insert("created_objects".to_string(), self.created_objects.to_string());
        metrics.insert("max_capacity".to_string(), self.max_capacity.to_string());
        metrics.insert("utilization".to_string(), format!("{:.2}", self.utilization));
        metrics
    }
}

/// Metrics exporter for Prometheus format
#[cfg(feature = "metrics")]
pub struct MetricsExporter;

#[cfg(feature = "metrics")]
impl MetricsExporter {
    /// Export metrics in Prometheus exposition format
    ///
    /// # Examples
    ///
    /// ```
    /// use partition_pool::{FnFactory, Pool, PoolConfiguration};
    /// use std::collections::HashMap;
    ///
    /// let pool = Pool::new(FnFactory::new(|| Ok(1u32)), PoolConfiguration::default()).unwrap();
    ///
    /// let mut tags = HashMap::new();
    /// tags.insert("service".to_string(), "api".to_string());
    ///
    /// let output = pool.export_metrics_prometheus("orders_db", Some(&tags)).unwrap();
    /// assert!(output.contains("partition_pool_objects_active"));
    /// assert!(output.contains("service=\"api\""));
    /// ```
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> crate::PoolResult<String> {
        use prometheus::{Encoder, TextEncoder};

        let registry = prometheus::Registry::new();
        let labels = Self::labels(pool_name, tags);
        let export = Export { registry: &registry, labels: &labels };

        export.gauge("partition_pool_objects_active", "Current active objects", metrics.active_objects)?;
        export.gauge("partition_pool_objects_idle", "Current idle objects", metrics.idle_objects)?;
        export.gauge("partition_pool_objects_created", "Current live objects", metrics.created_objects)?;
        export.gauge("partition_pool_capacity", "Maximum pool capacity", metrics.max_capacity)?;
        export.ratio("partition_pool_utilization", "Pool utilization ratio", metrics.utilization)?;

        export.counter("partition_pool_borrowed_total", "Total objects borrowed", metrics.total_borrowed)?;
        export.counter("partition_pool_returned_total", "Total objects returned", metrics.total_returned)?;
        export.counter("partition_pool_created_total", "Total objects created", metrics.total_created)?;
        export.counter("partition_pool_destroyed_total", "Total objects destroyed", metrics.total_destroyed)?;
        export.counter("partition_pool_evicted_total", "Idle objects evicted", metrics.total_evicted)?;
        export.counter(
            "partition_pool_validation_failures_total",
            "Validation failures",
            metrics.validation_failures,
        )?;
        export.counter(
            "partition_pool_creation_failures_total",
            "Factory create failures",
            metrics.creation_failures,
        )?;
        export.counter(
            "partition_pool_exhausted_total",
            "Borrows that timed out",
            metrics.exhausted_events,
        )?;

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .map_err(metrics_error)?;
        String::from_utf8(buffer).map_err(|e| crate::PoolError::Metrics(e.to_string()))
    }

    fn labels(pool_name: &str, tags: Option<&HashMap<String, String>>) -> HashMap<String, String> {
        let mut labels = tags.cloned().unwrap_or_default();
        labels.insert("pool".to_string(), pool_name.to_string());
        labels
    }
}

#[cfg(feature = "metrics")]
struct Export<'a> {
    registry: &'a prometheus::Registry,
    labels: &'a HashMap<String, String>,
}

#[cfg(feature = "metrics")]
impl Export<'_> {
    fn opts(&self, name: &str, help: &str) -> prometheus::Opts {
        prometheus::Opts::new(name, help).const_labels(self.labels.clone())
    }

    fn gauge(&self, name: &str, help: &str, value: usize) -> crate::PoolResult<()> {
        let gauge = prometheus::IntGauge::with_opts(self.opts(name, help)).map_err(metrics_error)?;
        gauge.set(i64::try_from(value).unwrap_or(i64::MAX));
        self.registry.register(Box::new(gauge)).map_err(metrics_error)
    }

    fn ratio(&self, name: &str, help: &str, value: f64) -> crate::PoolResult<()> {
        let gauge = prometheus::Gauge::with_opts(self.opts(name, help)).map_err(metrics_error)?;
        gauge.set(value);
        self.registry.register(Box::new(gauge)).map_err(metrics_error)
    }

    fn counter(&self, name: &str, help: &str, value: usize) -> crate::PoolResult<()> {
        let counter = prometheus::IntCounter::with_opts(self.opts(name, help)).map_err(metrics_error)?;
        counter.inc_by(value as u64);
        self.registry.register(Box::new(counter)).map_err(metrics_error)
    }
}

#[cfg(feature = "metrics")]
fn metrics_error(err: prometheus::Error) -> crate::PoolError {
    crate::PoolError::Metrics(err.to_string())
}

/// Internal metrics tracker
#[derive(Default)]
pub(crate) struct MetricsTracker {
    pub total_borrowed: AtomicUsize,
    pub total_returned: AtomicUsize,
    pub total_created: AtomicUsize,
    pub total_destroyed: AtomicUsize,
    pub total_evicted: AtomicUsize,
    pub validation_failures: AtomicUsize,
    pub creation_failures: AtomicUsize,
    pub exhausted_events: AtomicUsize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_metrics(&self, active: usize, idle: usize, created: usize, capacity: usize) -> PoolMetrics {
        let utilization = if capacity > 0 {
            active as f64 / capacity as f64
        } else {
            0.0
        };

        PoolMetrics {
            total_borrowed: self.total_borrowed.load(Ordering::Relaxed),
            total_returned: self.total_returned.load(Ordering::Relaxed),
            total_created: self.total_created.load(Ordering::Relaxed),
            total_destroyed: self.total_destroyed.load(Ordering::Relaxed),
            total_evicted: self.total_evicted.load(Ordering::Relaxed),
            validation_failures: self.validation_failures.load(Ordering::Relaxed),
            creation_failures: self.creation_failures.load(Ordering::Relaxed),
            exhausted_events: self.exhausted_events.load(Ordering::Relaxed),
            active_objects: active,
            idle_objects: idle,
            created_objects: created,
            max_capacity: capacity,
            utilization,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_utilization() {
        let tracker = MetricsTracker::new();
        MetricsTracker::record(&tracker.total_borrowed);
        MetricsTracker::record(&tracker.total_borrowed);

        let metrics = tracker.get_metrics(3, 1, 4, 12);
        assert_eq!(metrics.total_borrowed, 2);
        assert!((metrics.utilization - 0.25).abs() < f64::EPSILON);
        assert_eq!(metrics.export().get("utilization").map(String::as_str), Some("0.25"));
    }

    #[test]
    fn test_zero_capacity_has_zero_utilization() {
        let metrics = MetricsTracker::new().get_metrics(0, 0, 0, 0);
        assert_eq!(metrics.utilization, 0.0);
    }

    #[cfg(feature = "metrics")]
    #[test]
    fn test_prometheus_export_contains_counters() {
        let tracker = MetricsTracker::new();
        MetricsTracker::record(&tracker.exhausted_events);
        let metrics = tracker.get_metrics(1, 0, 1, 2);

        let output = MetricsExporter::export_prometheus(&metrics, "orders", None).unwrap();
        assert!(output.contains("partition_pool_exhausted_total{pool=\"orders\"} 1"));
        assert!(output.contains("# TYPE partition_pool_objects_active gauge"));
    }

    #[cfg(feature = "metrics")]
    #[test]
    fn test_prometheus_rejects_bad_label_names() {
        let metrics = MetricsTracker::new().get_metrics(0, 0, 0, 1);
        let mut tags = HashMap::new();
        tags.insert("not a label".to_string(), "x".to_string());
        assert!(matches!(
            MetricsExporter::export_prometheus(&metrics, "orders", Some(&tags)),
            Err(crate::PoolError::Metrics(_))
        ));
    }
}
