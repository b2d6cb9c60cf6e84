//! Connection decorator handed out by the dialer.

use std::fmt;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace};

use crate::cluster::Recycler;
use crate::endpoint::Endpoint;

use super::Connection;

/// A connection wrapper that tracks whether it is still safe to reuse.
///
/// This wrapper provides:
/// - A broken flag, set on any read/write error or unexpected end-of-stream
/// - Deadline freezing, which turns timeout setters into no-ops
/// - Optional per-operation tracing events
/// - Return-or-discard on close when produced by a [`ClusterDialer`]
///
/// Dropping a `ManagedConnection` has the same effect as [`close`], with any
/// close error logged instead of returned.
///
/// [`ClusterDialer`]: crate::ClusterDialer
/// [`close`]: ManagedConnection::close
pub struct ManagedConnection {
    /// Wrapped connection. Only `None` once released.
    inner: Option<Box<dyn Connection>>,
    /// Endpoint this connection was dialed to, when known.
    endpoint: Option<Endpoint>,
    /// Set once an I/O error has been observed.
    broken: bool,
    /// When set, timeout setters are suppressed.
    frozen: bool,
    /// When set, every operation emits a tracing event.
    traced: bool,
    /// Close policy of the dialer that produced this connection.
    recycler: Option<Arc<Recycler>>,
}

impl ManagedConnection {
    /// Wrap a connection. Closing it closes the inner connection.
    pub fn new(conn: Box<dyn Connection>) -> Self {
        Self {
            inner: Some(conn),
            endpoint: None,
            broken: false,
            frozen: false,
            traced: false,
            recycler: None,
        }
    }

    /// Wrap a TCP stream.
    pub fn from_stream(stream: TcpStream) -> Self {
        Self::new(Box::new(stream))
    }

    pub(crate) fn recycled(
        conn: Box<dyn Connection>,
        endpoint: Option<Endpoint>,
        recycler: Arc<Recycler>,
    ) -> Self {
        Self {
            inner: Some(conn),
            endpoint,
            broken: false,
            frozen: false,
            traced: false,
            recycler: Some(recycler),
        }
    }

    pub(crate) fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Endpoint this connection was dialed to, when known.
    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    /// Whether an I/O error has been observed on this connection.
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    /// Flag the connection as unusable so it is never returned to a pool.
    ///
    /// Use this when a protocol-level error leaves the stream in an unknown
    /// state even though the socket itself reported no error.
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }

    /// Suppress timeout changes until [`unfreeze`](Self::unfreeze).
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Allow timeout changes again.
    pub fn unfreeze(&mut self) {
        self.frozen = false;
    }

    /// Whether timeout changes are currently suppressed.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Enable or disable per-operation tracing events.
    pub fn set_traced(&mut self, traced: bool) {
        self.traced = traced;
    }

    /// Whether per-operation tracing events are emitted.
    pub fn is_traced(&self) -> bool {
        self.traced
    }

    /// Get a reference to the wrapped connection.
    pub fn get_ref(&self) -> Option<&dyn Connection> {
        self.inner.as_deref()
    }

    /// Close the connection, returning it to the originating pool when it
    /// is clean.
    pub fn close(mut self) -> io::Result<()> {
        let peer = self.peer();
        let result = match self.inner.take() {
            Some(conn) => match self.recycler.take() {
                Some(recycler) => recycler.release(conn, self.endpoint.as_ref(), self.broken),
                None => conn.close(),
            },
            None => Ok(()),
        };
        if self.traced {
            match &result {
                Ok(()) => debug!(?peer, "close done"),
                Err(e) => debug!(?peer, error = %e, "close failed"),
            }
        }
        result
    }

    /// Take the wrapped connection out, bypassing the close policy.
    pub(crate) fn into_parts(mut self) -> Option<(Box<dyn Connection>, Option<Endpoint>, bool)> {
        let conn = self.inner.take()?;
        Some((conn, self.endpoint, self.broken))
    }

    fn conn(&self) -> io::Result<&dyn Connection> {
        self.inner
            .as_deref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "connection released"))
    }

    fn conn_mut(&mut self) -> io::Result<&mut Box<dyn Connection>> {
        self.inner
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "connection released"))
    }

    fn peer(&self) -> Option<SocketAddr> {
        self.inner.as_ref().and_then(|c| c.peer_addr().ok())
    }

    /// Record the outcome of a read or write.
    fn observe(&mut self, op: &'static str, requested: usize, result: &io::Result<usize>) {
        match result {
            // EOF on a read, or a write the peer can no longer take.
            Ok(0) if requested > 0 => self.broken = true,
            Err(e) if e.kind() != io::ErrorKind::Interrupted => self.broken = true,
            _ => {}
        }
        if self.traced {
            let peer = self.peer();
            match result {
                Ok(n) => debug!(?peer, bytes = n, "{op}"),
                Err(e) => debug!(?peer, error = %e, "{op} failed"),
            }
        }
    }

    fn set_timeout(
        &self,
        kind: &'static str,
        timeout: Option<Duration>,
        set: impl FnOnce(&dyn Connection, Option<Duration>) -> io::Result<()>,
    ) -> io::Result<()> {
        if self.frozen {
            if self.traced {
                trace!(peer = ?self.peer(), ?timeout, "{kind} suppressed on frozen connection");
            }
            return Ok(());
        }
        let result = set(self.conn()?, timeout);
        if self.traced {
            match &result {
                Ok(()) => debug!(peer = ?self.peer(), ?timeout, "{kind} set"),
                Err(e) => debug!(peer = ?self.peer(), ?timeout, error = %e, "{kind} failed"),
            }
        }
        result
    }
}

impl Read for ManagedConnection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let result = self.conn_mut()?.read(buf);
        self.observe("read", buf.len(), &result);
        result
    }
}

impl Write for ManagedConnection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let result = self.conn_mut()?.write(buf);
        self.observe("write", buf.len(), &result);
        result
    }

    fn flush(&mut self) -> io::Result<()> {
        let result = self.conn_mut()?.flush();
        if let Err(e) = &result {
            if e.kind() != io::ErrorKind::Interrupted {
                self.broken = true;
            }
        }
        result
    }
}

impl Connection for ManagedConnection {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.set_timeout("read timeout", timeout, |c, t| c.set_read_timeout(t))
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.set_timeout("write timeout", timeout, |c, t| c.set_write_timeout(t))
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.conn()?.local_addr()
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.conn()?.peer_addr()
    }

    fn close(self: Box<Self>) -> io::Result<()> {
        ManagedConnection::close(*self)
    }

    fn as_tcp(&self) -> Option<&TcpStream> {
        self.inner.as_ref().and_then(|c| c.as_tcp())
    }

    fn into_inner(mut self: Box<Self>) -> Result<Box<dyn Connection>, Box<dyn Connection>> {
        match self.inner.take() {
            Some(conn) => Ok(conn),
            None => Err(self),
        }
    }
}

impl Drop for ManagedConnection {
    fn drop(&mut self) {
        let Some(conn) = self.inner.take() else {
            return;
        };
        let result = match self.recycler.take() {
            Some(recycler) => recycler.release(conn, self.endpoint.as_ref(), self.broken),
            None => conn.close(),
        };
        if let Err(e) = result {
            debug!(endpoint = ?self.endpoint, error = %e, "closing dropped connection failed");
        }
    }
}

impl fmt::Debug for ManagedConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedConnection")
            .field("endpoint", &self.endpoint)
            .field("broken", &self.broken)
            .field("frozen", &self.frozen)
            .field("traced", &self.traced)
            .field("pooled", &self.recycler.is_some())
            .finish()
    }
}
