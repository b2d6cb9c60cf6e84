//! Error types for cluster dialing.

use std::io;
use thiserror::Error;

use crate::endpoint::Endpoint;

/// Errors that can occur while dialing or managing cluster connections.
#[derive(Error, Debug)]
pub enum ClusterError {
    /// I/O error outside of a specific dial attempt.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The transport could not connect to the selected endpoint.
    #[error("Dial {endpoint} failed: {source}")]
    Dial {
        endpoint: Endpoint,
        #[source]
        source: io::Error,
    },

    /// The dial was cancelled before the connection was handed out.
    #[error("Dial {endpoint} cancelled")]
    Cancelled { endpoint: Endpoint },

    /// A socket option could not be applied to a freshly dialed connection.
    ///
    /// The connection has already been closed when this is returned.
    #[error("Setting {option} on {endpoint} failed: {source}")]
    SocketConfig {
        endpoint: Endpoint,
        option: &'static str,
        #[source]
        source: io::Error,
    },

    /// Read/write timeouts could not be initialised on a fresh connection.
    #[error("Initialising timeouts on {endpoint} failed: {source}")]
    DeadlineInit {
        endpoint: Endpoint,
        #[source]
        source: io::Error,
    },

    /// The address selector has no endpoint to offer.
    #[error("No endpoints configured")]
    NoEndpoints,

    /// Network name is not one of the supported transports.
    #[error("Unsupported network: {0}")]
    UnsupportedNetwork(String),

    /// Address string did not resolve to a usable socket address.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

/// Result type alias for cluster operations.
pub type Result<T> = std::result::Result<T, ClusterError>;

impl ClusterError {
    /// Create a new dial error for an endpoint.
    pub fn dial(endpoint: Endpoint, source: io::Error) -> Self {
        Self::Dial { endpoint, source }
    }

    /// Create a new invalid address error.
    pub fn invalid_address(msg: impl Into<String>) -> Self {
        Self::InvalidAddress(msg.into())
    }

    /// Check if this error was caused by cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// The endpoint a dial-time error refers to, if any.
    pub fn endpoint(&self) -> Option<&Endpoint> {
        match self {
            Self::Dial { endpoint, .. }
            | Self::Cancelled { endpoint }
            | Self::SocketConfig { endpoint, .. }
            | Self::DeadlineInit { endpoint, .. } => Some(endpoint),
            _ => None,
        }
    }

    /// Check if this error is recoverable (transient).
    ///
    /// A recoverable error means a later dial, possibly to another endpoint,
    /// has a reasonable chance of succeeding.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io(e) | Self::Dial { source: e, .. } => matches!(
                e.kind(),
                io::ErrorKind::WouldBlock
                    | io::ErrorKind::TimedOut
                    | io::ErrorKind::Interrupted
                    | io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::ConnectionReset
            ),
            _ => false,
        }
    }
}
