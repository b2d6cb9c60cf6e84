//! Channel-backed pool.

use std::fmt;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use super::{ConnectionPool, IdleConnection, close_evicted, effective_capacity};

/// A connection pool backed by a bounded MPMC channel.
///
/// `get` is a non-blocking receive. `put` is a non-blocking send; when the
/// channel is full it receives and closes one buffered connection, then
/// retries. Without contention the displaced connection is the oldest one;
/// under concurrent `put`s which entry gets displaced is unspecified, but the
/// capacity bound always holds.
pub struct ChannelPool {
    tx: Sender<IdleConnection>,
    rx: Receiver<IdleConnection>,
    capacity: usize,
}

impl ChannelPool {
    /// Create a pool holding at most `capacity` connections (at least 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = effective_capacity(capacity);
        let (tx, rx) = bounded(capacity);
        Self { tx, rx, capacity }
    }
}

impl ConnectionPool for ChannelPool {
    fn put(&self, idle: IdleConnection) {
        let mut conn = idle;
        loop {
            match self.tx.try_send(conn) {
                Ok(()) => return,
                Err(TrySendError::Full(rejected)) => {
                    conn = rejected;
                    // A concurrent get may have made room already.
                    if let Ok(displaced) = self.rx.try_recv() {
                        close_evicted(displaced);
                    }
                }
                // Both ends live in self.
                Err(TrySendError::Disconnected(rejected)) => {
                    close_evicted(rejected);
                    return;
                }
            }
        }
    }

    fn get(&self) -> Option<IdleConnection> {
        self.rx.try_recv().ok()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn len(&self) -> usize {
        self.rx.len()
    }

    fn close_all(&self) -> usize {
        let mut count = 0;
        while let Ok(conn) = self.rx.try_recv() {
            close_evicted(conn);
            count += 1;
        }
        count
    }
}

impl fmt::Debug for ChannelPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelPool")
            .field("capacity", &self.capacity)
            .field("len", &self.rx.len())
            .finish()
    }
}
