//! Lock-based ring buffer pool.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::conn::Connection;

use super::{ConnectionPool, IdleConnection, close_evicted, effective_capacity};

/// Inner ring state.
struct Ring {
    /// Fixed-size slot buffer.
    slots: Vec<Option<IdleConnection>>,
    /// Next slot `get` reads from; always the oldest live entry.
    read: usize,
    /// Next slot `put` writes to.
    write: usize,
    /// Number of occupied slots.
    len: usize,
}

impl Ring {
    fn new(capacity: usize) -> Self {
        Self {
            slots: std::iter::repeat_with(|| None).take(capacity).collect(),
            read: 0,
            write: 0,
            len: 0,
        }
    }

    fn advance(&self, index: usize) -> usize {
        if index + 1 < self.slots.len() {
            index + 1
        } else {
            0
        }
    }

    /// Store `conn`, returning the connection it displaced.
    fn push(&mut self, conn: IdleConnection) -> Option<IdleConnection> {
        let evicted = self.slots[self.write].replace(conn);
        if evicted.is_some() {
            // The overwritten slot held the oldest entry.
            self.read = self.advance(self.read);
        } else {
            self.len += 1;
        }
        self.write = self.advance(self.write);
        evicted
    }

    fn pop(&mut self) -> Option<IdleConnection> {
        let conn = self.slots[self.read].take()?;
        self.read = self.advance(self.read);
        self.len -= 1;
        Some(conn)
    }
}

/// A connection pool backed by a fixed-capacity ring buffer.
///
/// `put` and `get` run entirely under one mutex, so ordering is strict FIFO:
/// when full, `put` evicts exactly the oldest connection.
pub struct RingPool {
    inner: Mutex<Ring>,
    capacity: usize,
}

impl RingPool {
    /// Create a pool holding at most `capacity` connections (at least 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = effective_capacity(capacity);
        Self {
            inner: Mutex::new(Ring::new(capacity)),
            capacity,
        }
    }

    /// Visit every slot in buffer order while holding the pool lock.
    ///
    /// The callback sees a consistent snapshot: no `put` or `get` can run
    /// until it returns. Intended for diagnostics and tests.
    pub fn for_each_slot<F>(&self, mut f: F)
    where
        F: FnMut(usize, Option<&dyn Connection>),
    {
        let ring = self.lock();
        for (index, slot) in ring.slots.iter().enumerate() {
            f(index, slot.as_ref().map(IdleConnection::connection));
        }
    }

    fn lock(&self) -> MutexGuard<'_, Ring> {
        // Ring updates never panic midway, so a poisoned lock is still consistent.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ConnectionPool for RingPool {
    fn put(&self, idle: IdleConnection) {
        let evicted = self.lock().push(idle);
        if let Some(old) = evicted {
            close_evicted(old);
        }
    }

    fn get(&self) -> Option<IdleConnection> {
        self.lock().pop()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn len(&self) -> usize {
        self.lock().len
    }

    fn close_all(&self) -> usize {
        let drained: Vec<_> = {
            let mut ring = self.lock();
            std::iter::from_fn(|| ring.pop()).collect()
        };
        let count = drained.len();
        drained.into_iter().for_each(close_evicted);
        count
    }
}

impl fmt::Debug for RingPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ring = self.lock();
        f.debug_struct("RingPool")
            .field("capacity", &self.capacity)
            .field("len", &ring.len)
            .field("read", &ring.read)
            .field("write", &ring.write)
            .finish()
    }
}
