//! Async facade over [`ClusterDialer`] (requires the `tokio` feature).
//!
//! Dials run on tokio's blocking pool. Dropping a pending [`dial`] future
//! cancels the connect attempt; a connection that completes anyway is
//! released through the dialer's close policy.
//!
//! [`dial`]: AsyncClusterDialer::dial

use std::io;
use std::sync::Arc;

use tokio::task;

use crate::cluster::ClusterDialer;
use crate::conn::ManagedConnection;
use crate::error::{ClusterError, Result};
use crate::metrics::DialMetrics;
use crate::transport::CancelToken;

/// Cancels its token when dropped.
struct CancelOnDrop(CancelToken);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// Async cluster dialer.
#[derive(Debug, Clone)]
pub struct AsyncClusterDialer {
    inner: Arc<ClusterDialer>,
}

impl AsyncClusterDialer {
    /// Wrap a configured dialer.
    pub fn new(dialer: ClusterDialer) -> Self {
        Self::from_arc(Arc::new(dialer))
    }

    /// Share a dialer with synchronous callers.
    pub fn from_arc(inner: Arc<ClusterDialer>) -> Self {
        Self { inner }
    }

    /// Get a reference to the synchronous dialer.
    pub fn get_ref(&self) -> &ClusterDialer {
        &self.inner
    }

    /// Get a connection to the cluster.
    pub async fn dial(&self) -> Result<ManagedConnection> {
        let cancel = CancelToken::new();
        let _guard = CancelOnDrop(cancel.clone());
        let dialer = self.inner.clone();
        task::spawn_blocking(move || dialer.dial_with_cancel("", &cancel))
            .await
            .map_err(join_error)?
    }

    /// Release a connection through the dialer's close policy.
    pub async fn close(&self, conn: ManagedConnection) -> Result<()> {
        let dialer = self.inner.clone();
        task::spawn_blocking(move || dialer.close(conn))
            .await
            .map_err(join_error)?
    }

    /// Snapshot of the dial counters.
    pub fn metrics(&self) -> DialMetrics {
        self.inner.metrics()
    }
}

fn join_error(e: task::JoinError) -> ClusterError {
    ClusterError::Io(io::Error::other(e))
}
