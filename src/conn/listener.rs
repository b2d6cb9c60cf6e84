//! Passive listener producing managed connections.

use std::fmt;
use std::io;
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};

use tracing::debug;

use crate::error::{ClusterError, Result};

use super::ManagedConnection;

/// Callback run on every accepted connection before it is handed out.
pub type AcceptCallback = Box<dyn Fn(&mut ManagedConnection) -> io::Result<()> + Send + Sync>;

/// A TCP listener whose accepted connections are [`ManagedConnection`]s.
pub struct Listener {
    listener: TcpListener,
    local_addr: SocketAddr,
    on_accept: Option<AcceptCallback>,
}

impl Listener {
    /// Bind to an address and start listening.
    pub fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        Self::from_std(TcpListener::bind(addr)?)
    }

    /// Wrap an existing listener.
    pub fn from_std(listener: TcpListener) -> Result<Self> {
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
            on_accept: None,
        })
    }

    /// Get the local address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Get a reference to the underlying listener.
    pub fn get_ref(&self) -> &TcpListener {
        &self.listener
    }

    /// Run `f` on every accepted connection.
    ///
    /// If the callback fails, the connection is closed and the error is
    /// returned from [`accept`](Self::accept).
    pub fn set_accept_callback<F>(&mut self, f: F)
    where
        F: Fn(&mut ManagedConnection) -> io::Result<()> + Send + Sync + 'static,
    {
        self.on_accept = Some(Box::new(f));
    }

    /// Accept a new connection.
    pub fn accept(&self) -> Result<(ManagedConnection, SocketAddr)> {
        let (stream, addr) = self.listener.accept()?;
        let mut conn = ManagedConnection::from_stream(stream).with_endpoint(addr.into());
        if let Some(callback) = &self.on_accept {
            if let Err(e) = callback(&mut conn) {
                if let Err(close_err) = conn.close() {
                    debug!(%addr, error = %close_err, "closing rejected connection failed");
                }
                return Err(ClusterError::Io(e));
            }
        }
        Ok((conn, addr))
    }

    /// Get an iterator over incoming connections.
    pub fn incoming(&self) -> impl Iterator<Item = Result<ManagedConnection>> + '_ {
        std::iter::repeat_with(move || self.accept().map(|(conn, _)| conn))
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("local_addr", &self.local_addr)
            .field("accept_callback", &self.on_accept.is_some())
            .finish()
    }
}
