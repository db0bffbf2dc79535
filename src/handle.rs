//! Borrowed resource handle

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::errors::PoolResult;
use crate::partition::IdleEntry;
use crate::pool::PoolInner;

/// A borrowed resource that returns to its partition when dropped
///
/// The handle remembers which pool and partition it came from, so giving it
/// back needs no outside bookkeeping. Returning or invalidating consumes the
/// handle.
pub struct PooledObject<T: Send + 'static> {
    value: Option<T>,
    id: u64,
    partition: usize,
    created_at: Instant,
    borrowed_at: Instant,
    pool: Arc<PoolInner<T>>,
}

impl<T: Send + 'static> PooledObject<T> {
    pub(crate) fn new(entry: IdleEntry<T>, partition: usize, pool: Arc<PoolInner<T>>) -> Self {
        Self {
            value: Some(entry.value),
            id: entry.id,
            partition,
            created_at: entry.created_at,
            borrowed_at: Instant::now(),
            pool,
        }
    }

    /// Pool-unique id of the underlying resource
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Index of the partition the resource belongs to
    pub fn partition(&self) -> usize {
        self.partition
    }

    /// Time since the factory created the resource
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Time since this borrow started
    pub fn borrowed_for(&self) -> Duration {
        self.borrowed_at.elapsed()
    }

    /// Destroy the resource instead of returning it, e.g. after a dead
    /// connection was detected
    pub fn invalidate(mut self) -> PoolResult<()> {
        let value = self.take_value();
        self.pool.discard(self.id, value, self.created_at)
    }

    /// Take the resource out of the pool for good
    ///
    /// Its slot is freed for a new resource and the pool will never destroy
    /// the detached one; that becomes the caller's job.
    pub fn detach(mut self) -> T {
        let value = self.take_value();
        // Only fails if the lease is missing, which `forget` already logs.
        let _ = self.pool.forget(self.id);
        value
    }

    pub(crate) fn release(mut self) -> PoolResult<()> {
        let value = self.take_value();
        self.pool.give_back(self.id, value, self.created_at)
    }

    pub(crate) fn belongs_to(&self, pool: &Arc<PoolInner<T>>) -> bool {
        Arc::ptr_eq(&self.pool, pool)
    }

    fn take_value(&mut self) -> T {
        self.value.take().expect("Value already taken")
    }
}

impl<T: Send + 'static> Deref for PooledObject<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.value.as_ref().expect("Value already taken")
    }
}

impl<T: Send + 'static> DerefMut for PooledObject<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.value.as_mut().expect("Value already taken")
    }
}

impl<T: Send + 'static> Drop for PooledObject<T> {
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            let _ = self.pool.give_back(self.id, value, self.created_at);
        }
    }
}

impl<T: Send + fmt::Debug + 'static> fmt::Debug for PooledObject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledObject")
            .field("value", &self.value)
            .field("id", &self.id)
            .field("partition", &self.partition)
            .field("age", &self.age())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use crate::{FnFactory, Pool, PoolConfiguration};
    use std::time::Duration;

    #[test]
    fn test_handle_derefs_and_returns_on_drop() {
        let pool = Pool::new(FnFactory::new(|| Ok(String::from("conn"))), PoolConfiguration::default())
            .unwrap();

        {
            let mut conn = pool.borrow().unwrap();
            conn.push_str("-1");
            assert_eq!(conn.as_str(), "conn-1");
            assert_eq!(conn.partition(), 0);
            assert_eq!(pool.active_count(), 1);
        }

        assert_eq!(pool.active_count(), 0);
        assert_eq!(pool.idle_count(), 1);
        assert_eq!(*pool.borrow().unwrap(), "conn-1");
    }

    #[test]
    fn test_handle_timings() {
        let pool = Pool::new(FnFactory::new(|| Ok(0u8)), PoolConfiguration::default()).unwrap();
        let conn = pool.borrow().unwrap();
        std::thread::sleep(Duration::from_millis(5));
        assert!(conn.borrowed_for() >= Duration::from_millis(5));
        assert!(conn.age() >= Duration::from_millis(5));
    }

    #[test]
    fn test_handle_invalidate_destroys() {
        let pool = Pool::new(FnFactory::new(|| Ok(0u8)), PoolConfiguration::default()).unwrap();
        pool.borrow().unwrap().invalidate().unwrap();
        assert_eq!(pool.created_count(), 0);
        assert_eq!(pool.get_metrics().total_destroyed, 1);
    }
}
