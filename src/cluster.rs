//! Cluster dialing with connection reuse.

use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::config::{ClusterConfig, TcpTuning, non_zero};
use crate::conn::{Connection, ManagedConnection};
use crate::endpoint::Endpoint;
use crate::error::{ClusterError, Result};
use crate::metrics::{DialCounters, DialMetrics};
use crate::pool::{self, ConnectionPool, IdleConnection};
use crate::selector::AddressSelector;
use crate::transport::{CancelToken, TcpTransport, Transport};

/// Close policy shared by a dialer and the connections it hands out.
pub(crate) struct Recycler {
    pool: Option<Arc<dyn ConnectionPool>>,
    selector: Arc<dyn AddressSelector>,
}

impl Recycler {
    /// Return a clean connection to the pool, close everything else.
    pub(crate) fn release(
        &self,
        conn: Box<dyn Connection>,
        endpoint: Option<&Endpoint>,
        broken: bool,
    ) -> io::Result<()> {
        if !broken {
            if let Some(pool) = &self.pool {
                pool.put(IdleConnection::new(conn, endpoint.copied()));
                return Ok(());
            }
        }
        trace!(?endpoint, broken, "closing connection");
        let result = conn.close();
        self.notify_disconnected(endpoint);
        result
    }

    fn discard(&self, conn: Box<dyn Connection>, endpoint: Option<&Endpoint>) {
        if let Err(e) = conn.close() {
            debug!(?endpoint, error = %e, "closing discarded connection failed");
        }
        self.notify_disconnected(endpoint);
    }

    fn notify_disconnected(&self, endpoint: Option<&Endpoint>) {
        if let (Some(endpoint), Some(observer)) = (endpoint, self.selector.observer()) {
            observer.disconnected(endpoint);
        }
    }
}

impl fmt::Debug for Recycler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recycler")
            .field("pool", &self.pool)
            .finish()
    }
}

/// Dials a cluster of equivalent endpoints, reusing idle connections.
///
/// Each [`dial`](Self::dial) first tries the idle pool; on a miss it asks the
/// [`AddressSelector`] for an endpoint, connects, applies [`TcpTuning`] and
/// installs the configured read/write timeouts. Connections go back to the
/// pool when closed cleanly and are discarded once they have seen an I/O
/// error.
///
/// The dialer is `Send + Sync`; share it behind an `Arc`. Socket-tuning
/// setters take `&mut self` and therefore can only run before the dialer is
/// shared. They affect subsequent direct dials, never connections already in
/// the pool.
///
/// # Example
///
/// ```no_run
/// use std::io::Write;
/// use std::sync::Arc;
/// use clusterdial::{ClusterConfig, ClusterDialer, PoolConfig, RoundRobin};
///
/// let selector = RoundRobin::default();
/// selector.append_tcp_address("tcp", "10.0.0.1:6379").unwrap();
/// selector.append_tcp_address("tcp", "10.0.0.2:6379").unwrap();
///
/// let config = ClusterConfig::default().with_pool(PoolConfig::default().with_capacity(32));
/// let dialer = ClusterDialer::new(config, Arc::new(selector));
///
/// let mut conn = dialer.dial("").unwrap();
/// conn.write_all(b"PING\r\n").unwrap();
/// dialer.close(conn).unwrap();
/// ```
pub struct ClusterDialer {
    dial_timeout: Duration,
    read_timeout: Duration,
    write_timeout: Duration,
    tuning: TcpTuning,
    selector: Arc<dyn AddressSelector>,
    transport: Arc<dyn Transport>,
    recycler: Arc<Recycler>,
    counters: DialCounters,
}

impl ClusterDialer {
    /// Create a dialer using the TCP transport.
    pub fn new(config: ClusterConfig, selector: Arc<dyn AddressSelector>) -> Self {
        Self::with_transport(config, selector, Arc::new(TcpTransport))
    }

    /// Create a dialer with a custom transport.
    pub fn with_transport(
        config: ClusterConfig,
        selector: Arc<dyn AddressSelector>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let pool = config.pool.as_ref().map(pool::from_config);
        Self {
            dial_timeout: config.dial_timeout,
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
            tuning: TcpTuning::default(),
            selector: selector.clone(),
            transport,
            recycler: Arc::new(Recycler { pool, selector }),
            counters: DialCounters::default(),
        }
    }

    /// The address selector.
    pub fn selector(&self) -> &Arc<dyn AddressSelector> {
        &self.selector
    }

    /// The idle connection pool, if pooling is enabled.
    pub fn pool(&self) -> Option<&Arc<dyn ConnectionPool>> {
        self.recycler.pool.as_ref()
    }

    /// Current socket tuning.
    pub fn tcp_tuning(&self) -> TcpTuning {
        self.tuning
    }

    /// Enable or disable TCP keep-alive. Enabled by default; changing it
    /// affects how fast dead peers are noticed.
    pub fn set_tcp_keep_alive(&mut self, keep_alive: bool) {
        self.tuning.keep_alive = keep_alive;
    }

    /// Set the keep-alive idle period. Defaults to 3 seconds.
    pub fn set_tcp_keep_alive_period(&mut self, period: Duration) {
        self.tuning.keep_alive_period = period;
    }

    /// Set `SO_LINGER`. Defaults to one second; `None` restores the OS
    /// behaviour.
    pub fn set_tcp_linger(&mut self, linger: Option<Duration>) {
        self.tuning.linger = linger;
    }

    /// Enable or disable `TCP_NODELAY`. Enabled by default.
    pub fn set_tcp_no_delay(&mut self, no_delay: bool) {
        self.tuning.no_delay = no_delay;
    }

    /// Get a connection to the cluster.
    ///
    /// `hint` is ignored: unlike conventional dial APIs, the target is
    /// always chosen by the [`AddressSelector`]. The parameter exists so the
    /// dialer can stand in where an address-taking dial function is
    /// expected.
    pub fn dial(&self, hint: &str) -> Result<ManagedConnection> {
        self.dial_with_cancel(hint, &CancelToken::new())
    }

    /// Like [`dial`](Self::dial), aborting a pending connect once `cancel`
    /// fires.
    pub fn dial_with_cancel(&self, _hint: &str, cancel: &CancelToken) -> Result<ManagedConnection> {
        if let Some(conn) = self.reuse_pooled() {
            return Ok(conn);
        }
        self.dial_direct(cancel)
    }

    /// Release a connection: pool it when clean, close it otherwise.
    ///
    /// The policy of this dialer applies even when `conn` came from another
    /// dialer or a [`Listener`](crate::Listener).
    pub fn close(&self, conn: ManagedConnection) -> Result<()> {
        match conn.into_parts() {
            Some((raw, endpoint, broken)) => {
                Ok(self.recycler.release(raw, endpoint.as_ref(), broken)?)
            }
            None => Ok(()),
        }
    }

    /// Snapshot of the dial counters.
    pub fn metrics(&self) -> DialMetrics {
        self.counters.snapshot()
    }

    /// Close every idle connection in the pool.
    ///
    /// Returns the number of connections closed.
    pub fn close_idle(&self) -> usize {
        self.pool().map_or(0, |pool| pool.close_all())
    }

    fn reuse_pooled(&self) -> Option<ManagedConnection> {
        let pool = self.pool()?;
        let (conn, endpoint) = pool.get()?.into_parts();

        if let Err(e) = self.reset_timeouts(&*conn) {
            debug!(?endpoint, error = %e, "pooled connection is stale, dialing directly");
            self.recycler.discard(conn, endpoint.as_ref());
            return None;
        }

        self.counters.record_reuse();
        trace!(?endpoint, "reusing pooled connection");
        Some(ManagedConnection::recycled(conn, endpoint, self.recycler.clone()))
    }

    fn dial_direct(&self, cancel: &CancelToken) -> Result<ManagedConnection> {
        let endpoint = self.selector.select_next().ok_or(ClusterError::NoEndpoints)?;
        let observer = self.selector.observer();

        let connected = self
            .transport
            .connect(&endpoint, non_zero(self.dial_timeout), cancel)
            .and_then(|conn| {
                if cancel.is_cancelled() {
                    // Finished connecting as the caller gave up.
                    if let Err(e) = conn.close() {
                        debug!(%endpoint, error = %e, "closing cancelled connection failed");
                    }
                    return Err(ClusterError::Cancelled { endpoint });
                }
                Ok(conn)
            });
        let conn = match connected {
            Ok(conn) => conn,
            Err(e) => {
                debug!(%endpoint, error = %e, "dial failed");
                if let Some(observer) = observer {
                    observer.failure(&endpoint, &e);
                }
                return Err(e);
            }
        };
        if let Some(observer) = observer {
            observer.connected(&endpoint);
        }

        if let Some(stream) = conn.as_tcp() {
            if let Err((option, source)) = self.tuning.apply(stream) {
                warn!(%endpoint, option, error = %source, "socket tuning failed");
                self.recycler.discard(conn, Some(&endpoint));
                return Err(ClusterError::SocketConfig {
                    endpoint,
                    option,
                    source,
                });
            }
        }

        if let Err(source) = self.reset_timeouts(&*conn) {
            self.recycler.discard(conn, Some(&endpoint));
            return Err(ClusterError::DeadlineInit { endpoint, source });
        }

        self.counters.record_direct();
        debug!(%endpoint, "dialed new connection");
        Ok(ManagedConnection::recycled(
            conn,
            Some(endpoint),
            self.recycler.clone(),
        ))
    }

    // Pooled and fresh connections get the same timeout pair.
    fn reset_timeouts(&self, conn: &dyn Connection) -> io::Result<()> {
        conn.set_read_timeout(non_zero(self.read_timeout))?;
        conn.set_write_timeout(non_zero(self.write_timeout))
    }
}

impl fmt::Debug for ClusterDialer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterDialer")
            .field("dial_timeout", &self.dial_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("write_timeout", &self.write_timeout)
            .field("tuning", &self.tuning)
            .field("selector", &self.selector)
            .field("pool", &self.recycler.pool)
            .field("metrics", &self.metrics())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;
    use crate::conn::testing::{CloseLog, MockConn, tag_of};
    use crate::endpoint::Network;
    use crate::selector::{LifecycleObserver, RoundRobin};
    use std::io::{Read, Write};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicU16, AtomicUsize, Ordering};
    use std::thread;
    use std::time::Instant;

    /// Round-robin selector that counts selections and records events.
    #[derive(Debug)]
    struct RecordingSelector {
        inner: RoundRobin,
        selects: AtomicUsize,
        events: Mutex<Vec<String>>,
        observed: Mutex<Vec<Endpoint>>,
    }

    impl RecordingSelector {
        fn new(ports: &[u16]) -> Arc<Self> {
            let endpoints = ports
                .iter()
                .map(|p| Endpoint::tcp(format!("127.0.0.1:{p}").parse().unwrap()))
                .collect();
            Self::with_endpoints(endpoints)
        }

        fn with_endpoints(endpoints: Vec<Endpoint>) -> Arc<Self> {
            Arc::new(Self {
                inner: RoundRobin::new(endpoints),
                selects: AtomicUsize::new(0),
                events: Mutex::new(Vec::new()),
                observed: Mutex::new(Vec::new()),
            })
        }

        /// Every endpoint passed to the observer, in order.
        fn observed(&self) -> Vec<Endpoint> {
            self.observed.lock().unwrap().clone()
        }

        fn record(&self, kind: &str, endpoint: &Endpoint) {
            self.events.lock().unwrap().push(format!("{kind} {}", endpoint.addr().port()));
            self.observed.lock().unwrap().push(*endpoint);
        }

        fn selects(&self) -> usize {
            self.selects.load(Ordering::SeqCst)
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl AddressSelector for RecordingSelector {
        fn select_next(&self) -> Option<Endpoint> {
            self.selects.fetch_add(1, Ordering::SeqCst);
            self.inner.select_next()
        }

        fn observer(&self) -> Option<&dyn LifecycleObserver> {
            Some(self)
        }
    }

    impl LifecycleObserver for RecordingSelector {
        fn connected(&self, endpoint: &Endpoint) {
            self.record("connected", endpoint);
        }

        fn disconnected(&self, endpoint: &Endpoint) {
            self.record("disconnected", endpoint);
        }

        fn failure(&self, endpoint: &Endpoint, cause: &ClusterError) {
            let kind = if cause.is_cancelled() { "cancelled" } else { "failure" };
            self.record(kind, endpoint);
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Mode {
        Connect,
        Refuse,
        BlockUntilCancelled,
    }

    /// Transport handing out tagged mock connections.
    #[derive(Debug)]
    struct MockTransport {
        mode: Mode,
        connects: AtomicUsize,
        next_tag: AtomicU16,
        log: CloseLog,
        fail_io: bool,
        stale: Arc<AtomicBool>,
    }

    impl MockTransport {
        fn new(mode: Mode) -> Arc<Self> {
            Arc::new(Self {
                mode,
                connects: AtomicUsize::new(0),
                next_tag: AtomicU16::new(1),
                log: CloseLog::default(),
                fail_io: false,
                stale: Arc::new(AtomicBool::new(false)),
            })
        }

        fn failing_io() -> Arc<Self> {
            let mut transport = Arc::into_inner(Self::new(Mode::Connect)).unwrap();
            transport.fail_io = true;
            Arc::new(transport)
        }

        fn connects(&self) -> usize {
            self.connects.load(Ordering::SeqCst)
        }
    }

    impl Transport for MockTransport {
        fn connect(
            &self,
            endpoint: &Endpoint,
            timeout: Option<Duration>,
            cancel: &CancelToken,
        ) -> Result<Box<dyn Connection>> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            match self.mode {
                Mode::Connect => {}
                Mode::Refuse => {
                    return Err(ClusterError::dial(
                        *endpoint,
                        io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
                    ));
                }
                Mode::BlockUntilCancelled => {
                    let deadline = Instant::now() + timeout.unwrap_or(Duration::from_secs(10));
                    while Instant::now() < deadline {
                        if cancel.is_cancelled() {
                            return Err(ClusterError::Cancelled {
                                endpoint: *endpoint,
                            });
                        }
                        thread::sleep(Duration::from_millis(1));
                    }
                    return Err(ClusterError::dial(
                        *endpoint,
                        io::Error::new(io::ErrorKind::TimedOut, "timed out"),
                    ));
                }
            }
            let tag = self.next_tag.fetch_add(1, Ordering::SeqCst);
            let mut conn = MockConn::new(tag, &self.log).stale_when(&self.stale);
            if self.fail_io {
                conn = conn.failing_io();
            }
            Ok(Box::new(conn))
        }
    }

    fn pooled_config() -> ClusterConfig {
        ClusterConfig::default().with_pool(PoolConfig::default().with_capacity(2))
    }

    #[test]
    fn test_reuse_before_dial() {
        let selector = RecordingSelector::new(&[7001]);
        let transport = MockTransport::new(Mode::Connect);
        let dialer = ClusterDialer::with_transport(pooled_config(), selector.clone(), transport.clone());

        let conn = dialer.dial("ignored:1").unwrap();
        assert_eq!(tag_of(&conn), 1);
        dialer.close(conn).unwrap();
        assert_eq!(dialer.pool().unwrap().len(), 1);

        let conn = dialer.dial("").unwrap();
        assert_eq!(tag_of(&conn), 1);
        assert_eq!(selector.selects(), 1);
        assert_eq!(transport.connects(), 1);
        assert_eq!(
            dialer.metrics(),
            DialMetrics {
                direct_dials: 1,
                pool_reuses: 1
            }
        );
        assert_eq!(selector.events(), vec!["connected 7001"]);
    }

    #[test]
    fn test_broken_connection_is_discarded() {
        let selector = RecordingSelector::new(&[7001]);
        let transport = MockTransport::failing_io();
        let dialer = ClusterDialer::with_transport(pooled_config(), selector.clone(), transport.clone());

        let mut conn = dialer.dial("").unwrap();
        assert!(conn.write(b"payload").is_err());
        assert!(conn.is_broken());
        dialer.close(conn).unwrap();

        assert!(dialer.pool().unwrap().is_empty());
        assert_eq!(transport.log.closed(), vec![1]);
        assert_eq!(selector.events(), vec!["connected 7001", "disconnected 7001"]);

        // The next dial cannot be served from the pool.
        let conn = dialer.dial("").unwrap();
        assert_eq!(tag_of(&conn), 2);
        assert_eq!(dialer.metrics().pool_reuses, 0);
    }

    #[test]
    fn test_drop_returns_to_pool() {
        let selector = RecordingSelector::new(&[7001]);
        let transport = MockTransport::new(Mode::Connect);
        let dialer = ClusterDialer::with_transport(pooled_config(), selector, transport.clone());

        let mut conn = dialer.dial("").unwrap();
        let mut buf = [0u8; 4];
        conn.read_exact(&mut buf).unwrap();
        drop(conn);

        assert_eq!(dialer.pool().unwrap().len(), 1);
        assert!(transport.log.closed().is_empty());
    }

    #[test]
    fn test_stale_pooled_connection_falls_back() {
        let selector = RecordingSelector::new(&[7001]);
        let transport = MockTransport::new(Mode::Connect);
        let dialer = ClusterDialer::with_transport(pooled_config(), selector.clone(), transport.clone());

        let conn = dialer.dial("").unwrap();
        conn.close().unwrap();
        transport.stale.store(true, Ordering::SeqCst);

        // Fresh connections share the stale flag, so the direct dial fails too.
        let err = dialer.dial("").unwrap_err();
        assert!(matches!(err, ClusterError::DeadlineInit { .. }));
        assert_eq!(transport.log.closed(), vec![1, 2]);
        assert_eq!(transport.connects(), 2);
        assert_eq!(dialer.metrics().pool_reuses, 0);

        // The stale pooled connection counts as a disconnect too.
        assert_eq!(
            selector.events(),
            vec!["connected 7001", "disconnected 7001", "connected 7001", "disconnected 7001"]
        );

        transport.stale.store(false, Ordering::SeqCst);
        let conn = dialer.dial("").unwrap();
        assert_eq!(tag_of(&conn), 3);
    }

    #[test]
    fn test_reused_connection_keeps_dialed_endpoint() {
        // The mock peer address (port 7000) differs from the endpoint, so only
        // the endpoint stored with the pooled connection can match.
        let endpoint = Endpoint::new(Network::Tcp4, "127.0.0.1:7001".parse().unwrap());
        let selector = RecordingSelector::with_endpoints(vec![endpoint]);
        let transport = MockTransport::new(Mode::Connect);
        let dialer = ClusterDialer::with_transport(pooled_config(), selector.clone(), transport);

        let conn = dialer.dial("").unwrap();
        assert_eq!(conn.endpoint(), Some(&endpoint));
        dialer.close(conn).unwrap();

        let mut conn = dialer.dial("").unwrap();
        assert_eq!(dialer.metrics().pool_reuses, 1);
        assert_eq!(conn.endpoint(), Some(&endpoint));
        conn.mark_broken();
        dialer.close(conn).unwrap();

        assert_eq!(selector.events(), vec!["connected 7001", "disconnected 7001"]);
        assert_eq!(selector.observed(), vec![endpoint, endpoint]);
        assert_eq!(selector.observed()[1].to_string(), "tcp4://127.0.0.1:7001");
    }

    #[test]
    fn test_stale_connection_without_endpoint_is_closed() {
        let selector = RecordingSelector::new(&[7001]);
        let transport = MockTransport::new(Mode::Connect);
        let dialer = ClusterDialer::with_transport(pooled_config(), selector.clone(), transport.clone());

        let stale = Arc::new(AtomicBool::new(true));
        let conn = MockConn::new(90, &transport.log).stale_when(&stale);
        dialer.pool().unwrap().put(IdleConnection::new(Box::new(conn), None));

        let conn = dialer.dial("").unwrap();
        assert_eq!(tag_of(&conn), 1);
        assert_eq!(transport.log.closed(), vec![90]);
        assert_eq!(selector.events(), vec!["connected 7001"]);
    }

    #[test]
    fn test_dial_failure_notifies_and_stays_usable() {
        let selector = RecordingSelector::new(&[7001, 7002]);
        let transport = MockTransport::new(Mode::Refuse);
        let dialer = ClusterDialer::with_transport(pooled_config(), selector.clone(), transport);

        let err = dialer.dial("").unwrap_err();
        assert!(matches!(err, ClusterError::Dial { .. }));
        assert!(err.is_recoverable());
        let err = dialer.dial("").unwrap_err();
        assert_eq!(err.endpoint().map(|e| e.addr().port()), Some(7002));

        assert_eq!(selector.events(), vec!["failure 7001", "failure 7002"]);
        assert_eq!(dialer.metrics(), DialMetrics::default());
    }

    #[test]
    fn test_cancellation_aborts_pending_dial() {
        let selector = RecordingSelector::new(&[7001]);
        let transport = MockTransport::new(Mode::BlockUntilCancelled);
        let config = pooled_config().with_dial_timeout(Duration::from_secs(5));
        let dialer = ClusterDialer::with_transport(config, selector.clone(), transport);

        let cancel = CancelToken::new();
        let canceller = {
            let cancel = cancel.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                cancel.cancel();
            })
        };

        let started = Instant::now();
        let err = dialer.dial_with_cancel("", &cancel).unwrap_err();
        canceller.join().unwrap();

        assert!(err.is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(selector.events(), vec!["cancelled 7001"]);
        assert_eq!(dialer.metrics().direct_dials, 0);
    }

    #[test]
    fn test_connect_completing_after_cancel_is_closed() {
        let selector = RecordingSelector::new(&[7001]);
        let transport = MockTransport::new(Mode::Connect);
        let dialer = ClusterDialer::with_transport(pooled_config(), selector.clone(), transport.clone());

        // The mock ignores the token, like a connect racing the cancel.
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = dialer.dial_with_cancel("", &cancel).unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(transport.log.closed(), vec![1]);
        assert_eq!(selector.events(), vec!["cancelled 7001"]);
    }

    #[test]
    fn test_pool_less_close_is_final() {
        let selector = RecordingSelector::new(&[7001]);
        let transport = MockTransport::new(Mode::Connect);
        let dialer =
            ClusterDialer::with_transport(ClusterConfig::default(), selector.clone(), transport.clone());
        assert!(dialer.pool().is_none());

        let conn = dialer.dial("").unwrap();
        dialer.close(conn).unwrap();
        let conn = dialer.dial("").unwrap();
        conn.close().unwrap();

        assert_eq!(transport.log.closed(), vec![1, 2]);
        assert_eq!(dialer.metrics().direct_dials, 2);
        assert_eq!(dialer.close_idle(), 0);
    }

    #[test]
    fn test_no_endpoints() {
        let selector = RecordingSelector::new(&[]);
        let transport = MockTransport::new(Mode::Connect);
        let dialer = ClusterDialer::with_transport(pooled_config(), selector, transport.clone());

        assert!(matches!(dialer.dial(""), Err(ClusterError::NoEndpoints)));
        assert_eq!(transport.connects(), 0);
    }

    #[test]
    fn test_close_idle_drains_pool() {
        let selector = RecordingSelector::new(&[7001]);
        let transport = MockTransport::new(Mode::Connect);
        let dialer = ClusterDialer::with_transport(pooled_config(), selector, transport.clone());

        let first = dialer.dial("").unwrap();
        let second = dialer.dial("").unwrap();
        dialer.close(first).unwrap();
        dialer.close(second).unwrap();

        assert_eq!(dialer.close_idle(), 2);
        assert_eq!(transport.log.closed(), vec![1, 2]);
    }

    #[test]
    fn test_setters_update_tuning() {
        let selector = RecordingSelector::new(&[7001]);
        let mut dialer = ClusterDialer::new(ClusterConfig::default(), selector);
        assert_eq!(dialer.tcp_tuning(), TcpTuning::default());

        dialer.set_tcp_keep_alive(false);
        dialer.set_tcp_keep_alive_period(Duration::from_secs(10));
        dialer.set_tcp_linger(None);
        dialer.set_tcp_no_delay(false);

        let tuning = dialer.tcp_tuning();
        assert!(!tuning.keep_alive);
        assert_eq!(tuning.keep_alive_period, Duration::from_secs(10));
        assert_eq!(tuning.linger, None);
        assert!(!tuning.no_delay);
    }

    #[test]
    fn test_concurrent_dial_close() {
        let selector = RecordingSelector::new(&[7001, 7002, 7003]);
        let transport = MockTransport::new(Mode::Connect);
        let config = ClusterConfig::default().with_pool(PoolConfig::default().with_capacity(4));
        let dialer = Arc::new(ClusterDialer::with_transport(config, selector, transport.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let dialer = dialer.clone();
                thread::spawn(move || {
                    for _ in 0..50 {
                        let mut conn = dialer.dial("").unwrap();
                        conn.write_all(b"x").unwrap();
                        dialer.close(conn).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let metrics = dialer.metrics();
        assert_eq!(metrics.total(), 400);
        let pooled = dialer.pool().unwrap().len();
        assert!(pooled <= 4);
        // Every dialed connection is either still pooled or was evicted.
        assert_eq!(metrics.direct_dials as usize, pooled + transport.log.closed().len());
    }
}
