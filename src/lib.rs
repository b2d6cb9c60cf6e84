//! Cluster-aware TCP dialing built on std::net.
//!
//! This crate dials a set of equivalent backend endpoints (replicas of one
//! cache, database or service) through a single dial function, and keeps
//! healthy connections around for reuse.
//!
//! # Features
//!
//! - Pluggable endpoint selection with a thread-safe round-robin default
//! - Optional lifecycle notifications for selectors that track health
//! - Bounded idle-connection pools with FIFO eviction
//! - Connections that are discarded instead of pooled once they see an I/O error
//! - TCP keep-alive, linger and no-delay tuning applied to every new connection
//! - Cancellable dials and per-dialer reuse counters
//! - An async facade behind the `tokio` feature
//!
//! # Example
//!
//! ```no_run
//! use std::io::{Read, Write};
//! use std::sync::Arc;
//! use clusterdial::{ClusterConfig, ClusterDialer, RoundRobin};
//!
//! let selector = RoundRobin::default();
//! selector.append_tcp_address("tcp", "10.0.0.1:11211").unwrap();
//! selector.append_tcp_address("tcp", "10.0.0.2:11211").unwrap();
//!
//! let dialer = ClusterDialer::new(ClusterConfig::pooled(), Arc::new(selector));
//!
//! let mut conn = dialer.dial("").unwrap();
//! conn.write_all(b"version\r\n").unwrap();
//! let mut buf = [0u8; 64];
//! let n = conn.read(&mut buf).unwrap();
//! println!("{}", String::from_utf8_lossy(&buf[..n]));
//!
//! // Clean connections go back to the pool.
//! dialer.close(conn).unwrap();
//! println!("{}", dialer.metrics());
//! ```
//!
//! # Connection lifecycle
//!
//! ```text
//!            dial()
//!              |
//!      pool hit? ---- yes ---> reset timeouts --ok--> hand out
//!              |                     |
//!              no                  stale: close, fall through
//!              |                     |
//!      select endpoint <-------------+
//!              |
//!      connect, tune socket, set timeouts ---> hand out
//!
//!            close()
//!              |
//!      broken or no pool? -- yes --> close socket, notify selector
//!              |
//!              no --> pool (evicting the oldest idle connection when full)
//! ```

pub mod cluster;
pub mod config;
pub mod conn;
pub mod endpoint;
pub mod error;
pub mod metrics;
pub mod pool;
pub mod selector;
pub mod transport;

// Async facade (requires tokio feature)
#[cfg(feature = "tokio")]
pub mod cluster_async;

// Re-export commonly used types at the crate root
pub use cluster::ClusterDialer;
pub use config::{ClusterConfig, PoolConfig, PoolStrategy, TcpTuning};
pub use conn::{AcceptCallback, Connection, Listener, ManagedConnection};
pub use endpoint::{Endpoint, Network};
pub use error::{ClusterError, Result};
pub use metrics::DialMetrics;
pub use pool::{ChannelPool, ConnectionPool, IdleConnection, RingPool};
pub use selector::{AddressSelector, LifecycleObserver, RoundRobin};
pub use transport::{CancelToken, TcpTransport, Transport, dial, dial_timeout};

#[cfg(feature = "tokio")]
pub use cluster_async::AsyncClusterDialer;
