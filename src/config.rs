//! Dialer configuration types.

use std::io;
use std::net::TcpStream;
use std::time::Duration;

use socket2::{SockRef, TcpKeepalive};

/// Keep-alive is enabled on freshly dialed TCP connections by default.
pub const DEFAULT_TCP_KEEP_ALIVE: bool = true;
/// Default idle time before keep-alive probes are sent.
pub const DEFAULT_TCP_KEEP_ALIVE_PERIOD: Duration = Duration::from_secs(3);
/// Default `SO_LINGER` value.
pub const DEFAULT_TCP_LINGER: Option<Duration> = Some(Duration::from_secs(1));
/// Nagle's algorithm is disabled by default.
pub const DEFAULT_TCP_NO_DELAY: bool = true;

/// Socket options applied to every new direct TCP dial.
///
/// Pooled connections keep the options they were dialed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpTuning {
    /// Enable `SO_KEEPALIVE`.
    pub keep_alive: bool,
    /// Idle time before the first keep-alive probe. Only applied when
    /// `keep_alive` is set.
    pub keep_alive_period: Duration,
    /// `SO_LINGER`. `None` leaves the OS default behaviour.
    pub linger: Option<Duration>,
    /// `TCP_NODELAY`.
    pub no_delay: bool,
}

impl Default for TcpTuning {
    fn default() -> Self {
        Self {
            keep_alive: DEFAULT_TCP_KEEP_ALIVE,
            keep_alive_period: DEFAULT_TCP_KEEP_ALIVE_PERIOD,
            linger: DEFAULT_TCP_LINGER,
            no_delay: DEFAULT_TCP_NO_DELAY,
        }
    }
}

impl TcpTuning {
    /// Apply the options to a stream, stopping at the first failure.
    ///
    /// Order is fixed: keep-alive, keep-alive period, linger, no-delay. On
    /// error the name of the failing option is returned alongside the cause.
    pub(crate) fn apply(&self, stream: &TcpStream) -> Result<(), (&'static str, io::Error)> {
        let sock = SockRef::from(stream);

        sock.set_keepalive(self.keep_alive)
            .map_err(|e| ("keep-alive", e))?;

        // set_tcp_keepalive turns SO_KEEPALIVE back on
        if self.keep_alive {
            let params = TcpKeepalive::new().with_time(self.keep_alive_period);
            sock.set_tcp_keepalive(&params)
                .map_err(|e| ("keep-alive period", e))?;
        }

        sock.set_linger(self.linger).map_err(|e| ("linger", e))?;
        sock.set_nodelay(self.no_delay).map_err(|e| ("no-delay", e))?;
        Ok(())
    }
}

/// Concurrency strategy of the connection pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PoolStrategy {
    /// Mutex-guarded ring buffer with strict FIFO eviction.
    #[default]
    Ring,
    /// Bounded channel; FIFO only in the absence of capacity pressure.
    Channel,
}

/// Connection pool configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Maximum number of idle connections held. Clamped to at least 1.
    pub capacity: usize,
    /// Which pool implementation to build.
    pub strategy: PoolStrategy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            strategy: PoolStrategy::Ring,
        }
    }
}

impl PoolConfig {
    /// Set the pool capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the pool strategy.
    pub fn with_strategy(mut self, strategy: PoolStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

/// Cluster dialer configuration.
///
/// A zero duration means "no timeout" for the corresponding operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterConfig {
    /// Timeout for establishing a new transport connection.
    pub dial_timeout: Duration,
    /// Read timeout installed on every connection handed out.
    pub read_timeout: Duration,
    /// Write timeout installed on every connection handed out.
    pub write_timeout: Duration,
    /// Pool settings. `None` makes every dial direct and every close final.
    pub pool: Option<PoolConfig>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            dial_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
            pool: None,
        }
    }
}

impl ClusterConfig {
    /// Default timeouts with a default ring pool.
    pub fn pooled() -> Self {
        Self::default().with_pool(PoolConfig::default())
    }

    /// Set the dial timeout.
    pub fn with_dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }

    /// Set the read timeout.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the write timeout.
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Enable pooling.
    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Disable pooling.
    pub fn without_pool(mut self) -> Self {
        self.pool = None;
        self
    }
}

/// Map a configured duration to the `Option` form std sockets expect.
pub(crate) fn non_zero(timeout: Duration) -> Option<Duration> {
    (!timeout.is_zero()).then_some(timeout)
}
