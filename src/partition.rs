//! One independently locked shard of the pool
//!
//! A partition only does bookkeeping under its lock. Factory calls
//! (create, validate, destroy) always happen with the lock released; the
//! partition hands resources out or back and the coordinator decides what
//! to do with them.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::errors::{PoolError, PoolResult};
use crate::eviction::EvictionPolicy;

/// A resource sitting in a partition's idle queue
pub(crate) struct IdleEntry<T> {
    pub id: u64,
    pub value: T,
    pub created_at: Instant,
    pub last_used: Instant,
}

impl<T> IdleEntry<T> {
    pub fn new(id: u64, value: T) -> Self {
        let now = Instant::now();
        Self {
            id,
            value,
            created_at: now,
            last_used: now,
        }
    }

    /// An entry coming back from a borrower, keeping its original `created_at`.
    pub fn returned(id: u64, value: T, created_at: Instant) -> Self {
        Self {
            id,
            value,
            created_at,
            last_used: Instant::now(),
        }
    }
}

/// What a borrower got out of `checkout`
pub(crate) enum Checkout<T> {
    /// The oldest idle resource, not yet validated
    Idle(IdleEntry<T>),
    /// A reserved creation slot; the caller must create the resource or
    /// hand the slot back with `release_slot`
    Reserved,
}

/// How long `checkout` may block
#[derive(Debug, Clone, Copy)]
pub(crate) enum Wait {
    Never,
    Until(Instant),
    Forever,
}

impl Wait {
    pub fn from_timeout(timeout: Duration) -> Self {
        if timeout.is_zero() {
            return Wait::Never;
        }
        match Instant::now().checked_add(timeout) {
            Some(deadline) => Wait::Until(deadline),
            None => Wait::Forever,
        }
    }
}

/// Point-in-time view of one partition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PartitionStats {
    pub index: usize,
    pub idle: usize,
    pub active: usize,
    pub created: usize,
    /// Most resources this partition may hold at once
    pub capacity: usize,
    pub waiters: usize,
    pub closed: bool,
}

struct PartitionState<T> {
    idle: VecDeque<IdleEntry<T>>,
    active: usize,
    created: usize,
    /// Idle resources taken out for a liveness check; counted in `created`
    /// but neither idle nor active
    testing: usize,
    waiters: usize,
    closed: bool,
}

impl<T> PartitionState<T> {
    fn take_slot(&mut self) {
        debug_assert!(self.active > 0 && self.created > 0);
        self.active = self.active.saturating_sub(1);
        self.created = self.created.saturating_sub(1);
    }
}

pub(crate) struct Partition<T> {
    index: usize,
    max_size: usize,
    state: Mutex<PartitionState<T>>,
    available: Condvar,
}

impl<T> Partition<T> {
    pub fn new(index: usize, max_size: usize) -> Self {
        Self {
            index,
            max_size,
            state: Mutex::new(PartitionState {
                idle: VecDeque::new(),
                active: 0,
                created: 0,
                testing: 0,
                waiters: 0,
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Take the oldest idle resource, or reserve a creation slot, or block
    /// until one of those becomes possible.
    ///
    /// The deadline is checked under the lock after the idle queue, so a
    /// resource given back at the moment of timeout is either delivered here
    /// or stays queued for the next borrower.
    pub fn checkout(&self, wait: Wait, timeout: Duration) -> PoolResult<Checkout<T>> {
        let mut state = self.state.lock();
        let mut expired = false;

        loop {
            if state.closed {
                return Err(PoolError::Closed);
            }
            if let Some(entry) = state.idle.pop_front() {
                state.active += 1;
                return Ok(Checkout::Idle(entry));
            }
            if state.created < self.max_size {
                state.created += 1;
                state.active += 1;
                return Ok(Checkout::Reserved);
            }
            if expired {
                return Err(PoolError::Exhausted(timeout));
            }

            match wait {
                Wait::Never => return Err(PoolError::Exhausted(timeout)),
                Wait::Until(deadline) => {
                    state.waiters += 1;
                    expired = self.available.wait_until(&mut state, deadline).timed_out();
                    state.waiters -= 1;
                }
                Wait::Forever => {
                    state.waiters += 1;
                    self.available.wait(&mut state);
                    state.waiters -= 1;
                }
            }
        }
    }

    /// Drop one active resource from the books: a failed create, a resource
    /// that failed validation, an invalidated or detached handle.
    pub fn release_slot(&self) {
        let mut state = self.state.lock();
        state.take_slot();
        drop(state);
        self.available.notify_one();
    }

    /// Put a healthy resource back at the end of the idle queue.
    ///
    /// A closed partition refuses it and hands it back for the caller to
    /// destroy, with the counters already settled.
    pub fn give(&self, entry: IdleEntry<T>) -> Option<IdleEntry<T>> {
        let mut state = self.state.lock();
        let rejected = if state.closed {
            state.take_slot();
            Some(entry)
        } else {
            state.active = state.active.saturating_sub(1);
            state.idle.push_back(entry);
            None
        };
        drop(state);
        self.available.notify_one();
        rejected
    }

    /// Mark the partition closed and hand back every idle resource for
    /// destruction. Active resources are destroyed as they come back.
    pub fn close_all(&self) -> Vec<IdleEntry<T>> {
        let mut state = self.state.lock();
        state.closed = true;
        let drained: Vec<_> = state.idle.drain(..).collect();
        state.created = state.created.saturating_sub(drained.len());
        drop(state);
        self.available.notify_all();
        drained
    }

    /// Remove idle resources the policy considers expired.
    pub fn drain_expired(&self, policy: &EvictionPolicy) -> Vec<IdleEntry<T>> {
        if matches!(policy, EvictionPolicy::None) {
            return Vec::new();
        }

        let mut state = self.state.lock();
        let mut expired = Vec::new();
        let mut kept = VecDeque::with_capacity(state.idle.len());
        for entry in state.idle.drain(..) {
            if policy.is_expired(entry.created_at, entry.last_used) {
                expired.push(entry);
            } else {
                kept.push_back(entry);
            }
        }
        state.idle = kept;
        state.created = state.created.saturating_sub(expired.len());
        expired
    }

    /// Ids of the resources currently idle, oldest first.
    pub fn idle_ids(&self) -> Vec<u64> {
        self.state.lock().idle.iter().map(|entry| entry.id).collect()
    }

    /// Take one idle resource out for a liveness check, if it is still idle.
    /// Every other idle resource stays available to borrowers.
    pub fn claim_for_test(&self, id: u64) -> Option<IdleEntry<T>> {
        let mut state = self.state.lock();
        if state.closed {
            return None;
        }
        let position = state.idle.iter().position(|entry| entry.id == id)?;
        let entry = state.idle.remove(position)?;
        state.testing += 1;
        Some(entry)
    }

    /// Put a resource that passed its check back in `last_used` order, so it
    /// keeps its turn ahead of resources returned after it.
    ///
    /// A closed partition hands it back for destruction instead.
    pub fn restore_tested(&self, entry: IdleEntry<T>) -> Option<IdleEntry<T>> {
        let mut state = self.state.lock();
        state.testing = state.testing.saturating_sub(1);
        let rejected = if state.closed {
            state.created = state.created.saturating_sub(1);
            Some(entry)
        } else {
            let position = state.idle.partition_point(|idle| idle.last_used <= entry.last_used);
            state.idle.insert(position, entry);
            None
        };
        drop(state);
        self.available.notify_one();
        rejected
    }

    /// Forget a resource that failed its check; the caller destroys it.
    pub fn drop_tested(&self) {
        let mut state = self.state.lock();
        state.testing = state.testing.saturating_sub(1);
        state.created = state.created.saturating_sub(1);
        drop(state);
        self.available.notify_one();
    }

    /// Reserve creation slots needed to bring the idle queue up to `min_idle`.
    pub fn reserve_fill(&self, min_idle: usize) -> usize {
        let mut state = self.state.lock();
        if state.closed {
            return 0;
        }
        let wanted = min_idle.saturating_sub(state.idle.len());
        let reserved = wanted.min(self.max_size.saturating_sub(state.created));
        state.created += reserved;
        state.active += reserved;
        reserved
    }

    pub fn stats(&self) -> PartitionStats {
        let state = self.state.lock();
        PartitionStats {
            index: self.index,
            idle: state.idle.len(),
            active: state.active,
            created: state.created,
            capacity: self.max_size,
            waiters: state.waiters,
            closed: state.closed,
        }
    }
}
