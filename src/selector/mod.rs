//! Endpoint selection strategies.
//!
//! An [`AddressSelector`] hands the dialer the next endpoint to connect to.
//! Selectors that want to react to connection outcomes (health checks,
//! backoff, circuit breaking) additionally implement [`LifecycleObserver`]
//! and expose it through [`AddressSelector::observer`]; the dialer probes for
//! it on every event and skips notification when it is absent.

mod round_robin;

pub use round_robin::RoundRobin;

use std::fmt;

use crate::endpoint::Endpoint;
use crate::error::ClusterError;

/// Strategy producing the next endpoint to dial.
pub trait AddressSelector: Send + Sync + fmt::Debug {
    /// Return the next endpoint, or `None` when nothing is configured.
    fn select_next(&self) -> Option<Endpoint>;

    /// Lifecycle notifications capability, if supported.
    fn observer(&self) -> Option<&dyn LifecycleObserver> {
        None
    }
}

/// Callbacks describing what happened to a selected endpoint.
pub trait LifecycleObserver: Send + Sync {
    /// A connection to `endpoint` was established.
    fn connected(&self, endpoint: &Endpoint);

    /// A connection to `endpoint` was closed rather than pooled.
    fn disconnected(&self, endpoint: &Endpoint);

    /// Connecting to `endpoint` failed.
    fn failure(&self, endpoint: &Endpoint, cause: &ClusterError);
}
