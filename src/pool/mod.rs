//! Bounded pools of idle connections.
//!
//! Two interchangeable implementations share the [`ConnectionPool`] contract:
//!
//! - [`RingPool`]: a mutex-guarded ring buffer with strict FIFO eviction.
//! - [`ChannelPool`]: a bounded channel; lower contention, but under capacity
//!   pressure the entry displaced by a `put` is whichever one wins the race.
//!
//! Both store [`IdleConnection`]s (the innermost undecorated connection plus
//! the endpoint it was dialed to), close every connection they evict, and
//! never hold more than their capacity.
//!
//! # Example
//!
//! ```
//! use clusterdial::pool::{ConnectionPool, RingPool};
//!
//! let pool = RingPool::new(3);
//! assert!(pool.get().is_none());
//! assert_eq!(pool.capacity(), 3);
//! ```

mod channel;
mod ring;

pub use channel::ChannelPool;
pub use ring::RingPool;

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::config::{PoolConfig, PoolStrategy};
use crate::conn::Connection;
use crate::endpoint::Endpoint;

/// Upper bound on decorator layers stripped by [`innermost`].
pub const MAX_UNWRAP_DEPTH: usize = 16;

/// A bounded, thread-safe store of idle connections.
pub trait ConnectionPool: Send + Sync + fmt::Debug {
    /// Store a connection, evicting (and closing) an older one when full.
    fn put(&self, idle: IdleConnection);

    /// Take an idle connection, or `None` when the pool is empty.
    ///
    /// Never blocks waiting for a connection to be returned.
    fn get(&self) -> Option<IdleConnection>;

    /// Maximum number of idle connections held.
    fn capacity(&self) -> usize;

    /// Number of idle connections currently held.
    fn len(&self) -> usize;

    /// Check if the pool holds no connections.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close every pooled connection.
    ///
    /// Returns the number of connections closed.
    fn close_all(&self) -> usize;
}

/// A pooled connection and the endpoint it was dialed to.
pub struct IdleConnection {
    conn: Box<dyn Connection>,
    endpoint: Option<Endpoint>,
}

impl IdleConnection {
    /// Strip `conn` down to its innermost layer and pair it with `endpoint`.
    pub fn new(conn: Box<dyn Connection>, endpoint: Option<Endpoint>) -> Self {
        Self {
            conn: innermost(conn),
            endpoint,
        }
    }

    /// The pooled connection.
    pub fn connection(&self) -> &dyn Connection {
        &*self.conn
    }

    /// Endpoint the connection was dialed to, when known.
    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    /// Split into the connection and its endpoint.
    pub fn into_parts(self) -> (Box<dyn Connection>, Option<Endpoint>) {
        (self.conn, self.endpoint)
    }
}

impl From<Box<dyn Connection>> for IdleConnection {
    fn from(conn: Box<dyn Connection>) -> Self {
        Self::new(conn, None)
    }
}

impl fmt::Debug for IdleConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdleConnection")
            .field("conn", &self.conn)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Build the pool described by `config`.
pub fn from_config(config: &PoolConfig) -> Arc<dyn ConnectionPool> {
    match config.strategy {
        PoolStrategy::Ring => Arc::new(RingPool::new(config.capacity)),
        PoolStrategy::Channel => Arc::new(ChannelPool::new(config.capacity)),
    }
}

/// Strip decorators until the raw connection is reached.
///
/// Stops after [`MAX_UNWRAP_DEPTH`] layers so a self-wrapping decorator
/// cannot loop forever.
pub fn innermost(mut conn: Box<dyn Connection>) -> Box<dyn Connection> {
    for _ in 0..MAX_UNWRAP_DEPTH {
        conn = match conn.into_inner() {
            Ok(inner) => inner,
            Err(raw) => return raw,
        };
    }
    debug!(depth = MAX_UNWRAP_DEPTH, "decorator chain too deep, pooling as is");
    conn
}

/// Close a connection pushed out of a pool. Failures are only logged.
pub(crate) fn close_evicted(idle: IdleConnection) {
    let (conn, endpoint) = idle.into_parts();
    if let Err(e) = conn.close() {
        debug!(?endpoint, error = %e, "closing evicted connection failed");
    }
}

/// Clamp a configured capacity to something a pool can hold.
pub(crate) fn effective_capacity(capacity: usize) -> usize {
    capacity.max(1)
}
