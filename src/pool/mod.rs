//! Bounded connection pool
//!
//! Owns a fixed set of pre-established remote connections and hands out
//! exclusive, scoped leases. Every connection is dialed at construction;
//! a single dial or login failure aborts construction, so a usable pool
//! always has its full complement of slots.
//!
//! Waiters park on a condvar until a lease is returned. The pool size is
//! the hard cap on concurrent in-flight remote operations.

use crate::error::{ParputError, Result};
use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::{Condvar, Mutex};
use std::time::Duration;
use tracing::debug;

/// One pooled connection together with its fixed slot index
struct Slot<C> {
    index: usize,
    conn: C,
}

struct PoolInner<C> {
    free: VecDeque<Slot<C>>,
    leased: usize,
}

/// Fixed-size pool of remote connections
pub struct ConnectionPool<C> {
    inner: Mutex<PoolInner<C>>,
    available: Condvar,
    size: usize,
}

impl<C> ConnectionPool<C> {
    /// Establish `size` connections through `factory`, sequentially.
    ///
    /// Fails on the first connection that cannot be established; already
    /// dialed connections are dropped and the pool is never usable.
    pub fn new<F>(size: usize, mut factory: F) -> Result<Self>
    where
        F: FnMut() -> Result<C>,
    {
        if size == 0 {
            return Err(ParputError::config("Pool size must be at least 1"));
        }

        let mut free = VecDeque::with_capacity(size);
        for index in 0..size {
            let conn = factory()?;
            debug!(slot = index, "connection established");
            free.push_back(Slot { index, conn });
        }

        Ok(Self {
            inner: Mutex::new(PoolInner { free, leased: 0 }),
            available: Condvar::new(),
            size,
        })
    }

    /// Number of slots in the pool
    pub fn size(&self) -> usize {
        self.size
    }

    /// Block until a slot is free and lease it.
    ///
    /// Never fails once the pool is constructed; with every slot held by
    /// a stalled holder this waits indefinitely. Use
    /// [`acquire_timeout`](Self::acquire_timeout) to bound the wait.
    pub fn acquire(&self) -> ConnectionLease<'_, C> {
        let mut inner = self.inner.lock().unwrap();
        loop {
            if let Some(slot) = inner.free.pop_front() {
                inner.leased += 1;
                return ConnectionLease {
                    pool: self,
                    slot: Some(slot),
                };
            }
            inner = self.available.wait(inner).unwrap();
        }
    }

    /// Lease a slot if one is free right now
    pub fn try_acquire(&self) -> Option<ConnectionLease<'_, C>> {
        let mut inner = self.inner.lock().unwrap();
        inner.free.pop_front().map(|slot| {
            inner.leased += 1;
            ConnectionLease {
                pool: self,
                slot: Some(slot),
            }
        })
    }

    /// Block up to `timeout` for a free slot
    pub fn acquire_timeout(&self, timeout: Duration) -> Option<ConnectionLease<'_, C>> {
        let deadline = std::time::Instant::now() + timeout;
        let mut inner = self.inner.lock().unwrap();
        loop {
            if let Some(slot) = inner.free.pop_front() {
                inner.leased += 1;
                return Some(ConnectionLease {
                    pool: self,
                    slot: Some(slot),
                });
            }

            let now = std::time::Instant::now();
            if now >= deadline {
                return None;
            }
            let (guard, result) = self.available.wait_timeout(inner, deadline - now).unwrap();
            inner = guard;
            if result.timed_out() && inner.free.is_empty() {
                return None;
            }
        }
    }

    /// Snapshot of slot occupancy
    pub fn stats(&self) -> PoolStats {
        let inner = self.inner.lock().unwrap();
        PoolStats {
            total: self.size,
            available: inner.free.len(),
            leased: inner.leased,
        }
    }

    fn release(&self, slot: Slot<C>) {
        let mut inner = self.inner.lock().unwrap();
        inner.leased -= 1;
        inner.free.push_back(slot);
        drop(inner);
        self.available.notify_one();
    }
}

/// Pool occupancy statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Slots in the pool
    pub total: usize,
    /// Slots free right now
    pub available: usize,
    /// Slots currently leased
    pub leased: usize,
}

/// Exclusive, scoped lease on one pooled connection.
///
/// Derefs to the connection; the slot returns to the pool on drop, on
/// every exit path.
pub struct ConnectionLease<'a, C> {
    pool: &'a ConnectionPool<C>,
    slot: Option<Slot<C>>,
}

impl<C> ConnectionLease<'_, C> {
    /// Index of the slot this lease is bound to
    pub fn slot_index(&self) -> usize {
        self.slot.as_ref().map(|s| s.index).unwrap_or_default()
    }
}

impl<C> Deref for ConnectionLease<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.slot.as_ref().expect("lease already released").conn
    }
}

impl<C> DerefMut for ConnectionLease<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.slot.as_mut().expect("lease already released").conn
    }
}

impl<C> Drop for ConnectionLease<'_, C> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            self.pool.release(slot);
        }
    }
}
