//! Pool coordinator: partition selection, bounded blocking borrow, shutdown

use crate::config::PoolConfiguration;
use crate::errors::{PoolError, PoolResult};
use crate::eviction::{EvictionPolicy, Evictor};
use crate::factory::{self, ObjectFactory};
use crate::handle::PooledObject;
use crate::health::HealthStatus;
use crate::metrics::{MetricsTracker, PoolMetrics};
use crate::partition::{Checkout, IdleEntry, Partition, PartitionStats, Wait};

use crossbeam::utils::CachePadded;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared state behind every `Pool` clone and every outstanding handle
pub(crate) struct PoolInner<T: Send + 'static> {
    partitions: Box<[CachePadded<Partition<T>>]>,
    factory: Box<dyn ObjectFactory<T>>,
    config: PoolConfiguration,
    policy: EvictionPolicy,
    closed: AtomicBool,
    next_partition: AtomicUsize,
    next_resource_id: AtomicU64,
    /// Resource id -> partition index for everything currently borrowed
    checked_out: DashMap<u64, usize>,
    metrics: MetricsTracker,
    evictor: Mutex<Option<Evictor>>,
}

impl<T: Send + 'static> PoolInner<T> {
    fn select_partition(&self) -> &Partition<T> {
        let index = self.next_partition.fetch_add(1, Ordering::Relaxed) % self.partitions.len();
        &*self.partitions[index]
    }

    /// Run the factory for a slot already reserved in `partition`. On failure
    /// the reservation is handed back.
    fn create(&self, partition: &Partition<T>) -> PoolResult<IdleEntry<T>> {
        match factory::create_guarded(self.factory.as_ref()) {
            Ok(value) => {
                let id = self.next_resource_id.fetch_add(1, Ordering::Relaxed);
                MetricsTracker::record(&self.metrics.total_created);
                tracing::debug!(resource = id, partition = partition.index(), "created resource");
                Ok(IdleEntry::new(id, value))
            }
            Err(err) => {
                partition.release_slot();
                MetricsTracker::record(&self.metrics.creation_failures);
                tracing::warn!(partition = partition.index(), error = %err, "failed to create resource");
                Err(PoolError::create(err))
            }
        }
    }

    fn destroy(&self, entry: IdleEntry<T>) {
        MetricsTracker::record(&self.metrics.total_destroyed);
        factory::destroy_guarded(self.factory.as_ref(), entry.value, entry.id);
    }

    /// Destroy a resource that was counted active and free its slot.
    fn discard_active(&self, partition: &Partition<T>, entry: IdleEntry<T>) {
        self.destroy(entry);
        partition.release_slot();
    }

    fn acquire(self: &Arc<Self>, timeout: Duration) -> PoolResult<PooledObject<T>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PoolError::Closed);
        }

        let partition = self.select_partition();
        let wait = Wait::from_timeout(timeout);

        loop {
            let entry = match partition.checkout(wait, timeout) {
                Ok(Checkout::Idle(entry)) => {
                    if self.policy.is_expired(entry.created_at, entry.last_used) {
                        tracing::debug!(resource = entry.id, "idle resource expired");
                        MetricsTracker::record(&self.metrics.total_evicted);
                        self.discard_active(partition, entry);
                        continue;
                    }
                    if !factory::validate_guarded(self.factory.as_ref(), &entry.value) {
                        tracing::debug!(resource = entry.id, "idle resource failed validation");
                        MetricsTracker::record(&self.metrics.validation_failures);
                        self.discard_active(partition, entry);
                        continue;
                    }
                    entry
                }
                // New resources are handed out without validation.
                Ok(Checkout::Reserved) => self.create(partition)?,
                Err(err) => {
                    if let PoolError::Exhausted(waited) = &err {
                        MetricsTracker::record(&self.metrics.exhausted_events);
                        tracing::warn!(partition = partition.index(), ?waited, "pool exhausted");
                    }
                    return Err(err);
                }
            };

            self.checked_out.insert(entry.id, partition.index());
            MetricsTracker::record(&self.metrics.total_borrowed);
            tracing::trace!(resource = entry.id, partition = partition.index(), "borrowed resource");
            return Ok(PooledObject::new(entry, partition.index(), Arc::clone(self)));
        }
    }

    fn take_lease(&self, id: u64) -> PoolResult<&Partition<T>> {
        match self.checked_out.remove(&id) {
            Some((_, index)) => Ok(&*self.partitions[index]),
            None => {
                tracing::error!(resource = id, "resource is not checked out from this pool");
                Err(PoolError::InvalidHandle)
            }
        }
    }

    /// Take back a borrowed resource.
    pub(crate) fn give_back(&self, id: u64, value: T, created_at: Instant) -> PoolResult<()> {
        let entry = IdleEntry::returned(id, value, created_at);
        let partition = match self.take_lease(id) {
            Ok(partition) => partition,
            Err(err) => {
                self.destroy(entry);
                return Err(err);
            }
        };
        MetricsTracker::record(&self.metrics.total_returned);

        let mut healthy = !self.policy.is_past_lifetime(created_at);
        if healthy
            && self.config.test_on_return
            && !factory::validate_guarded(self.factory.as_ref(), &entry.value)
        {
            MetricsTracker::record(&self.metrics.validation_failures);
            healthy = false;
        }

        tracing::trace!(resource = id, partition = partition.index(), healthy, "returned resource");
        if !healthy {
            self.discard_active(partition, entry);
        } else if let Some(rejected) = partition.give(entry) {
            // The partition closed while this resource was out.
            self.destroy(rejected);
        }
        Ok(())
    }

    /// Destroy a borrowed resource the caller reports as broken.
    pub(crate) fn discard(&self, id: u64, value: T, created_at: Instant) -> PoolResult<()> {
        let entry = IdleEntry::returned(id, value, created_at);
        match self.take_lease(id) {
            Ok(partition) => {
                tracing::debug!(resource = id, partition = partition.index(), "invalidated resource");
                self.discard_active(partition, entry);
                Ok(())
            }
            Err(err) => {
                self.destroy(entry);
                Err(err)
            }
        }
    }

    /// Drop a borrowed resource from the books without destroying it.
    pub(crate) fn forget(&self, id: u64) -> PoolResult<()> {
        let partition = self.take_lease(id)?;
        tracing::debug!(resource = id, partition = partition.index(), "detached resource");
        partition.release_slot();
        Ok(())
    }

    /// Bring `partition` up to `min_size` idle resources.
    fn fill(&self, partition: &Partition<T>) -> PoolResult<usize> {
        let reserved = partition.reserve_fill(self.config.min_size);
        for filled in 0..reserved {
            match self.create(partition) {
                Ok(entry) => {
                    if let Some(rejected) = partition.give(entry) {
                        self.destroy(rejected);
                    }
                }
                Err(err) => {
                    for _ in filled + 1..reserved {
                        partition.release_slot();
                    }
                    return Err(err);
                }
            }
        }
        Ok(reserved)
    }

    /// One pass of background maintenance. Only idle resources are touched.
    fn evict(&self) {
        for partition in self.partitions.iter() {
            for entry in partition.drain_expired(&self.policy) {
                tracing::debug!(resource = entry.id, partition = partition.index(), "evicted idle resource");
                MetricsTracker::record(&self.metrics.total_evicted);
                self.destroy(entry);
            }

            if self.config.test_while_idle {
                self.test_idle(partition);
            }

            if self.closed.load(Ordering::Acquire) {
                return;
            }
            if let Err(err) = self.fill(partition) {
                tracing::warn!(partition = partition.index(), error = %err, "failed to refill partition");
            }
        }
    }

    /// Check idle resources one at a time so the rest stay borrowable.
    fn test_idle(&self, partition: &Partition<T>) {
        for id in partition.idle_ids() {
            if self.closed.load(Ordering::Acquire) {
                return;
            }
            // Borrowed since the snapshot.
            let Some(entry) = partition.claim_for_test(id) else {
                continue;
            };
            if factory::validate_guarded(self.factory.as_ref(), &entry.value) {
                if let Some(rejected) = partition.restore_tested(entry) {
                    self.destroy(rejected);
                }
            } else {
                tracing::debug!(resource = entry.id, "idle resource failed validation");
                MetricsTracker::record(&self.metrics.validation_failures);
                MetricsTracker::record(&self.metrics.total_evicted);
                self.destroy(entry);
                partition.drop_tested();
            }
        }
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::info!(partitions = self.partitions.len(), "closing pool");

        // A sweep in progress sees the closed flag and winds down on its own.
        if let Some(evictor) = self.evictor.lock().take() {
            evictor.signal_stop();
        }
        self.shutdown_partitions();
    }

    fn shutdown_partitions(&self) {
        for partition in self.partitions.iter() {
            for entry in partition.close_all() {
                self.destroy(entry);
            }
        }
    }

    fn partition_stats(&self) -> Vec<PartitionStats> {
        self.partitions.iter().map(|p| p.stats()).collect()
    }
}

impl<T: Send + 'static> Drop for PoolInner<T> {
    fn drop(&mut self) {
        // Nothing is borrowed any more: every handle holds a reference.
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.shutdown_partitions();
        }
    }
}

/// Partitioned, thread-safe pool of factory-made resources
///
/// Cloning a `Pool` is cheap; clones share the same partitions.
///
/// # Examples
///
/// ```
/// use partition_pool::{FnFactory, Pool, PoolConfiguration};
/// use std::time::Duration;
///
/// let factory = FnFactory::new(|| Ok(Vec::<u8>::with_capacity(1024)));
/// let config = PoolConfiguration::new()
///     .with_max_size(2)
///     .with_max_wait(Duration::from_millis(50));
/// let pool = Pool::new(factory, config).unwrap();
///
/// let mut buffer = pool.borrow().unwrap();
/// buffer.extend_from_slice(b"hello");
/// pool.return_object(buffer).unwrap();
///
/// assert_eq!(pool.idle_count(), 1);
/// pool.close();
/// assert!(pool.borrow().is_err());
/// ```
pub struct Pool<T: Send + 'static> {
    inner: Arc<PoolInner<T>>,
}

impl<T: Send + 'static> Clone for Pool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + 'static> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("partitions", &self.inner.partitions.len())
            .field("max_size", &self.inner.config.max_size)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> Pool<T> {
    /// Create a pool, pre-creating `min_size` resources in every partition
    ///
    /// Fails with `InvalidConfiguration` for unusable settings and with
    /// `Create` if warm-up cannot build a resource; anything already built
    /// is destroyed in that case.
    pub fn new<F>(factory: F, config: PoolConfiguration) -> PoolResult<Self>
    where
        F: ObjectFactory<T>,
    {
        config.validate()?;

        let partitions = (0..config.partition_count)
            .map(|index| CachePadded::new(Partition::new(index, config.max_size)))
            .collect();

        let inner = Arc::new(PoolInner {
            partitions,
            factory: Box::new(factory),
            policy: config.eviction_policy(),
            config,
            closed: AtomicBool::new(false),
            next_partition: AtomicUsize::new(0),
            next_resource_id: AtomicU64::new(1),
            checked_out: DashMap::new(),
            metrics: MetricsTracker::new(),
            evictor: Mutex::new(None),
        });

        for partition in inner.partitions.iter() {
            if let Err(err) = inner.fill(partition) {
                inner.close();
                return Err(err);
            }
        }
        tracing::debug!(
            partitions = inner.partitions.len(),
            min_size = inner.config.min_size,
            max_size = inner.config.max_size,
            "pool ready"
        );

        if inner.config.needs_evictor() {
            let weak = Arc::downgrade(&inner);
            let evictor = Evictor::spawn(
                "partition-pool-evictor".to_string(),
                inner.config.eviction_interval,
                move || match weak.upgrade() {
                    Some(inner) => {
                        inner.evict();
                        true
                    }
                    None => false,
                },
            )
            .map_err(|e| PoolError::EvictorSpawn(e.to_string()))?;
            *inner.evictor.lock() = Some(evictor);
        }

        Ok(Self { inner })
    }

    /// Borrow a resource, waiting up to the configured `max_wait`
    pub fn borrow(&self) -> PoolResult<PooledObject<T>> {
        self.inner.acquire(self.inner.config.max_wait)
    }

    /// Borrow a resource, waiting up to `timeout`
    ///
    /// `Duration::ZERO` never blocks. A timeout too large to form a deadline
    /// (such as `Duration::MAX`) waits until a resource frees up or the pool
    /// closes.
    pub fn borrow_timeout(&self, timeout: Duration) -> PoolResult<PooledObject<T>> {
        self.inner.acquire(timeout)
    }

    /// Borrow without blocking
    pub fn try_borrow(&self) -> Option<PooledObject<T>> {
        self.borrow_timeout(Duration::ZERO).ok()
    }

    /// Borrow from async code without parking a runtime worker
    pub async fn borrow_async(&self) -> PoolResult<PooledObject<T>> {
        let pool = self.clone();
        tokio::task::spawn_blocking(move || pool.borrow())
            .await
            .map_err(|_| PoolError::Cancelled)?
    }

    /// Give a healthy resource back to the partition it came from
    ///
    /// A handle borrowed from a different pool is rejected with
    /// `InvalidHandle` and goes back to its own pool when dropped.
    pub fn return_object(&self, handle: PooledObject<T>) -> PoolResult<()> {
        self.check_owner(&handle)?;
        handle.release()
    }

    /// Destroy a borrowed resource the caller found broken
    pub fn invalidate(&self, handle: PooledObject<T>) -> PoolResult<()> {
        self.check_owner(&handle)?;
        handle.invalidate()
    }

    /// Close the pool. Idempotent.
    ///
    /// Idle resources are destroyed now, borrowed ones when they come back,
    /// and blocked borrowers fail with `Closed`.
    pub fn close(&self) {
        self.inner.close();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    fn check_owner(&self, handle: &PooledObject<T>) -> PoolResult<()> {
        if handle.belongs_to(&self.inner) {
            Ok(())
        } else {
            tracing::error!(resource = handle.id(), "handle was not borrowed from this pool");
            Err(PoolError::InvalidHandle)
        }
    }

    pub fn config(&self) -> &PoolConfiguration {
        &self.inner.config
    }

    pub fn partition_count(&self) -> usize {
        self.inner.partitions.len()
    }

    pub fn max_capacity(&self) -> usize {
        self.inner.config.max_capacity()
    }

    /// Per-partition counters, each read under that partition's lock
    pub fn partition_stats(&self) -> Vec<PartitionStats> {
        self.inner.partition_stats()
    }

    /// Resources currently borrowed, summed over partitions
    pub fn active_count(&self) -> usize {
        self.partition_stats().iter().map(|s| s.active).sum()
    }

    /// Resources waiting in idle queues, ready to hand out
    pub fn idle_count(&self) -> usize {
        self.partition_stats().iter().map(|s| s.idle).sum()
    }

    /// Live resources, idle plus active
    pub fn created_count(&self) -> usize {
        self.partition_stats().iter().map(|s| s.created).sum()
    }

    /// Lifetime counters plus a current-load snapshot
    pub fn get_metrics(&self) -> PoolMetrics {
        let stats = self.partition_stats();
        self.inner.metrics.get_metrics(
            stats.iter().map(|s| s.active).sum(),
            stats.iter().map(|s| s.idle).sum(),
            stats.iter().map(|s| s.created).sum(),
            self.max_capacity(),
        )
    }

    /// Metrics as a flat name to value map
    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.get_metrics().export()
    }

    /// Metrics in the Prometheus text format, labelled with `pool_name`
    /// and any extra `tags`
    #[cfg(feature = "metrics")]
    pub fn export_metrics_prometheus(
        &self,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> PoolResult<String> {
        crate::metrics::MetricsExporter::export_prometheus(&self.get_metrics(), pool_name, tags)
    }

    /// Healthy unless closed or more than 90% borrowed
    pub fn get_health_status(&self) -> HealthStatus {
        HealthStatus::from_partitions(&self.partition_stats(), self.max_capacity(), self.is_closed())
    }
}
