//! Connection types.
//!
//! [`Connection`] is the raw bidirectional stream the rest of the crate works
//! with. It is implemented for [`std::net::TcpStream`]; decorators such as
//! [`ManagedConnection`] implement it as well and expose their inner stream
//! through [`Connection::into_inner`].

mod listener;
mod managed;

pub use listener::{AcceptCallback, Listener};
pub use managed::ManagedConnection;

use std::fmt;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

/// A raw bidirectional byte stream.
pub trait Connection: Read + Write + Send + fmt::Debug {
    /// Set the read timeout. `None` blocks indefinitely.
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;

    /// Set the write timeout. `None` blocks indefinitely.
    fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;

    /// Local address of the connection.
    fn local_addr(&self) -> io::Result<SocketAddr>;

    /// Remote address of the connection.
    fn peer_addr(&self) -> io::Result<SocketAddr>;

    /// Close the connection.
    fn close(self: Box<Self>) -> io::Result<()>;

    /// The underlying TCP stream, if this connection is one.
    fn as_tcp(&self) -> Option<&TcpStream> {
        None
    }

    /// Strip one layer of decoration.
    ///
    /// Decorators return `Ok(inner)`; undecorated connections return
    /// `Err(self)`.
    fn into_inner(self: Box<Self>) -> Result<Box<dyn Connection>, Box<dyn Connection>>;
}

impl Connection for TcpStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_read_timeout(self, timeout)
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_write_timeout(self, timeout)
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        TcpStream::local_addr(self)
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        TcpStream::peer_addr(self)
    }

    fn close(self: Box<Self>) -> io::Result<()> {
        match self.shutdown(Shutdown::Both) {
            // Peer already gone; dropping the stream releases the descriptor.
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }

    fn as_tcp(&self) -> Option<&TcpStream> {
        Some(self)
    }

    fn into_inner(self: Box<Self>) -> Result<Box<dyn Connection>, Box<dyn Connection>> {
        Err(self)
    }
}
