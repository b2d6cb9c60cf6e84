//! Raw transport dialing.
//!
//! [`TcpTransport`] opens TCP connections with a non-blocking connect so an
//! in-flight attempt can be abandoned through a [`CancelToken`]. Custom
//! [`Transport`] implementations can be handed to
//! [`ClusterDialer::with_transport`](crate::ClusterDialer::with_transport).

use std::fmt;
use std::io;
use std::net::TcpStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use socket2::{Domain, Protocol, Socket, Type};
use tracing::trace;

use crate::conn::{Connection, ManagedConnection};
use crate::endpoint::Endpoint;
use crate::error::{ClusterError, Result};

/// Shortest wait between connect completion checks.
const POLL_INTERVAL_MIN: Duration = Duration::from_micros(50);
/// Longest wait between connect completion checks; bounds cancellation latency.
const POLL_INTERVAL_MAX: Duration = Duration::from_millis(5);

/// A cloneable cancellation flag shared between a dial and its caller.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel every dial observing this token.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check whether [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Opens raw connections to endpoints.
pub trait Transport: Send + Sync + fmt::Debug {
    /// Connect to `endpoint`.
    ///
    /// Must give up with [`ClusterError::Dial`] once `timeout` elapses and
    /// with [`ClusterError::Cancelled`] soon after `cancel` fires, releasing
    /// any half-open socket in both cases.
    fn connect(
        &self,
        endpoint: &Endpoint,
        timeout: Option<Duration>,
        cancel: &CancelToken,
    ) -> Result<Box<dyn Connection>>;
}

/// TCP transport built on std::net and socket2.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpTransport;

impl TcpTransport {
    /// Connect and return the concrete stream.
    pub fn connect_stream(
        &self,
        endpoint: &Endpoint,
        timeout: Option<Duration>,
        cancel: &CancelToken,
    ) -> Result<TcpStream> {
        if cancel.is_cancelled() {
            return Err(ClusterError::Cancelled {
                endpoint: *endpoint,
            });
        }

        let addr = endpoint.addr();
        let dial_err = |e| ClusterError::dial(*endpoint, e);

        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
            .map_err(dial_err)?;
        socket.set_nonblocking(true).map_err(dial_err)?;

        match socket.connect(&addr.into()) {
            Ok(()) => {}
            Err(e) if connect_in_progress(&e) => {
                wait_connected(&socket, endpoint, timeout, cancel)?;
            }
            Err(e) => return Err(dial_err(e)),
        }

        socket.set_nonblocking(false).map_err(dial_err)?;
        trace!(%endpoint, "tcp connected");
        Ok(socket.into())
    }
}

impl Transport for TcpTransport {
    fn connect(
        &self,
        endpoint: &Endpoint,
        timeout: Option<Duration>,
        cancel: &CancelToken,
    ) -> Result<Box<dyn Connection>> {
        let stream = self.connect_stream(endpoint, timeout, cancel)?;
        Ok(Box::new(stream))
    }
}

#[cfg(unix)]
fn connect_in_progress(e: &io::Error) -> bool {
    e.raw_os_error() == Some(libc::EINPROGRESS) || e.kind() == io::ErrorKind::WouldBlock
}

#[cfg(not(unix))]
fn connect_in_progress(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock
}

/// Poll a non-blocking socket until its connect completes.
fn wait_connected(
    socket: &Socket,
    endpoint: &Endpoint,
    timeout: Option<Duration>,
    cancel: &CancelToken,
) -> Result<()> {
    let deadline = timeout.map(|t| Instant::now() + t);
    let mut interval = POLL_INTERVAL_MIN;

    loop {
        if cancel.is_cancelled() {
            return Err(ClusterError::Cancelled {
                endpoint: *endpoint,
            });
        }
        if let Some(e) = socket.take_error().map_err(|e| ClusterError::dial(*endpoint, e))? {
            return Err(ClusterError::dial(*endpoint, e));
        }
        match socket.peer_addr() {
            Ok(_) => return Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotConnected => {}
            Err(e) => return Err(ClusterError::dial(*endpoint, e)),
        }

        let mut wait = interval;
        if let Some(deadline) = deadline {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ClusterError::dial(
                    *endpoint,
                    io::Error::new(io::ErrorKind::TimedOut, "connect timed out"),
                ));
            }
            wait = wait.min(remaining);
        }
        thread::sleep(wait);
        interval = (interval * 2).min(POLL_INTERVAL_MAX);
    }
}

/// Connect to `endpoint` without a timeout.
///
/// The returned connection is standalone: closing it closes the socket.
pub fn dial(endpoint: &Endpoint) -> Result<ManagedConnection> {
    dial_with(endpoint, None)
}

/// Connect to `endpoint`, giving up after `timeout`.
pub fn dial_timeout(endpoint: &Endpoint, timeout: Duration) -> Result<ManagedConnection> {
    dial_with(endpoint, Some(timeout))
}

fn dial_with(endpoint: &Endpoint, timeout: Option<Duration>) -> Result<ManagedConnection> {
    let stream = TcpTransport.connect_stream(endpoint, timeout, &CancelToken::new())?;
    Ok(ManagedConnection::from_stream(stream).with_endpoint(*endpoint))
}
