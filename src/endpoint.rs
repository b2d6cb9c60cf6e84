//! Dialable endpoints.

use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;

use crate::error::{ClusterError, Result};

/// Transport type of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Network {
    /// TCP over either address family.
    #[default]
    Tcp,
    /// TCP restricted to IPv4.
    Tcp4,
    /// TCP restricted to IPv6.
    Tcp6,
}

impl Network {
    /// The canonical name of this network.
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Tcp => "tcp",
            Network::Tcp4 => "tcp4",
            Network::Tcp6 => "tcp6",
        }
    }

    /// Check whether an address belongs to this network.
    pub fn accepts(&self, addr: &SocketAddr) -> bool {
        match self {
            Network::Tcp => true,
            Network::Tcp4 => addr.is_ipv4(),
            Network::Tcp6 => addr.is_ipv6(),
        }
    }
}

impl FromStr for Network {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" | "tcp" => Ok(Network::Tcp),
            "tcp4" => Ok(Network::Tcp4),
            "tcp6" => Ok(Network::Tcp6),
            other => Err(ClusterError::UnsupportedNetwork(other.to_string())),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved network address plus transport type.
///
/// Endpoints are plain values: they are resolved once and copied freely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    network: Network,
    addr: SocketAddr,
}

impl Endpoint {
    /// Create an endpoint from an already resolved address.
    pub fn new(network: Network, addr: SocketAddr) -> Self {
        Self { network, addr }
    }

    /// Create a TCP endpoint.
    pub fn tcp(addr: SocketAddr) -> Self {
        Self::new(Network::Tcp, addr)
    }

    /// Resolve `address` (e.g. `"db-1.internal:5432"`) for the named network.
    ///
    /// Resolution happens exactly once; the first address matching the
    /// network's family is used.
    pub fn resolve(network: &str, address: &str) -> Result<Self> {
        let network: Network = network.parse()?;
        let addr = address
            .to_socket_addrs()
            .map_err(|e| ClusterError::invalid_address(format!("{address}: {e}")))?
            .find(|addr| network.accepts(addr))
            .ok_or_else(|| {
                ClusterError::invalid_address(format!("{address}: no {network} address found"))
            })?;
        Ok(Self::new(network, addr))
    }

    /// Transport type.
    pub fn network(&self) -> Network {
        self.network
    }

    /// Socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Self::tcp(addr)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.network, self.addr)
    }
}
