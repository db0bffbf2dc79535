//! Eviction policies and the background idle sweeper

use std::io;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Expiry rule for pooled resources
///
/// # Examples
///
/// ```
/// use partition_pool::{EvictionPolicy, PoolConfiguration};
/// use std::time::Duration;
///
/// let config = PoolConfiguration::new()
///     .with_max_lifetime(Duration::from_secs(3600));
///
/// // Resources are destroyed once they are an hour old
/// assert!(matches!(config.eviction_policy(), EvictionPolicy::TimeToLive(_)));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EvictionPolicy {
    /// No eviction
    #[default]
    None,

    /// Time-to-live: resources expire a fixed duration after creation
    TimeToLive(Duration),

    /// Idle timeout: resources expire after sitting unused in the pool
    IdleTimeout(Duration),

    /// Combined: TTL or idle timeout, whichever hits first
    Combined {
        ttl: Duration,
        idle_timeout: Duration,
    },
}

impl EvictionPolicy {
    /// Whether a resource created at `created_at` and last given back at
    /// `last_used` should be destroyed rather than handed out again.
    pub fn is_expired(&self, created_at: Instant, last_used: Instant) -> bool {
        match *self {
            EvictionPolicy::None => false,
            EvictionPolicy::TimeToLive(ttl) => created_at.elapsed() > ttl,
            EvictionPolicy::IdleTimeout(timeout) => last_used.elapsed() > timeout,
            EvictionPolicy::Combined { ttl, idle_timeout } => {
                created_at.elapsed() > ttl || last_used.elapsed() > idle_timeout
            }
        }
    }

    /// Only the lifetime half of the policy; applies to resources coming back
    /// from a borrower, whose idle clock restarts on return.
    pub fn is_past_lifetime(&self, created_at: Instant) -> bool {
        match *self {
            EvictionPolicy::TimeToLive(ttl) | EvictionPolicy::Combined { ttl, .. } => {
                created_at.elapsed() > ttl
            }
            EvictionPolicy::None | EvictionPolicy::IdleTimeout(_) => false,
        }
    }
}

#[derive(Default)]
struct StopSignal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

/// Owner side of the evictor thread
///
/// The thread is detached: stopping never waits for a sweep in progress.
pub(crate) struct Evictor {
    signal: Arc<StopSignal>,
}

impl Evictor {
    /// Start a thread that calls `sweep` every `interval` until stopped.
    ///
    /// `sweep` returns `false` once the pool it serves is gone.
    pub fn spawn<F>(name: String, interval: Duration, mut sweep: F) -> io::Result<Self>
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let signal = Arc::new(StopSignal::default());
        let thread_signal = Arc::clone(&signal);

        thread::Builder::new().name(name).spawn(move || {
            loop {
                {
                    let mut stopped = thread_signal.stopped.lock();
                    if !*stopped {
                        thread_signal.wake.wait_for(&mut stopped, interval);
                    }
                    if *stopped {
                        break;
                    }
                }
                if !sweep() {
                    break;
                }
            }
            tracing::debug!("evictor stopped");
        })?;

        Ok(Self { signal })
    }

    /// Ask the thread to exit without waiting for it.
    pub fn signal_stop(&self) {
        *self.signal.stopped.lock() = true;
        self.signal.wake.notify_all();
    }
}

impl Drop for Evictor {
    fn drop(&mut self) {
        self.signal_stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_policy_none_never_expires() {
        let earlier = Instant::now();
        thread::sleep(Duration::from_millis(5));
        assert!(!EvictionPolicy::None.is_expired(earlier, earlier));
        assert!(!EvictionPolicy::None.is_past_lifetime(earlier));
    }

    #[test]
    fn test_idle_timeout_uses_last_used() {
        let policy = EvictionPolicy::IdleTimeout(Duration::from_millis(2));
        let earlier = Instant::now();
        thread::sleep(Duration::from_millis(10));
        assert!(policy.is_expired(Instant::now(), earlier));
        assert!(!policy.is_expired(earlier, Instant::now()));
        assert!(!policy.is_past_lifetime(earlier));
    }

    #[test]
    fn test_ttl_uses_created_at() {
        let policy = EvictionPolicy::Combined {
            ttl: Duration::from_millis(2),
            idle_timeout: Duration::from_secs(600),
        };
        let earlier = Instant::now();
        thread::sleep(Duration::from_millis(10));
        assert!(policy.is_expired(earlier, Instant::now()));
        assert!(policy.is_past_lifetime(earlier));
        assert!(!policy.is_past_lifetime(Instant::now()));
    }

    #[test]
    fn test_evictor_sweeps_until_stopped() {
        let sweeps = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&sweeps);
        let evictor = Evictor::spawn("test-evictor".to_string(), Duration::from_millis(5), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        })
        .unwrap();

        thread::sleep(Duration::from_millis(60));
        evictor.signal_stop();
        thread::sleep(Duration::from_millis(10));
        let after_stop = sweeps.load(Ordering::SeqCst);
        assert!(after_stop >= 1);

        thread::sleep(Duration::from_millis(30));
        assert_eq!(sweeps.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn test_evictor_exits_when_sweep_reports_gone() {
        let evictor = Evictor::spawn("gone-evictor".to_string(), Duration::from_millis(1), || false)
            .unwrap();
        thread::sleep(Duration::from_millis(20));
        drop(evictor);
    }
}
