//! Round-robin selection.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::endpoint::Endpoint;
use crate::error::Result;

use super::AddressSelector;

#[derive(Debug, Default)]
struct Rotation {
    endpoints: Vec<Endpoint>,
    /// Index of the last endpoint handed out; `None` before the first call.
    cursor: Option<usize>,
}

/// Cycles through a list of endpoints in order.
///
/// Endpoints may be appended while other threads are selecting.
#[derive(Debug, Default)]
pub struct RoundRobin {
    inner: Mutex<Rotation>,
}

impl RoundRobin {
    /// Create a selector over `endpoints`.
    pub fn new(endpoints: Vec<Endpoint>) -> Self {
        Self {
            inner: Mutex::new(Rotation {
                endpoints,
                cursor: None,
            }),
        }
    }

    /// Add an endpoint at the end of the rotation.
    pub fn append(&self, endpoint: Endpoint) {
        self.lock().endpoints.push(endpoint);
    }

    /// Resolve `address` once and add it to the rotation.
    pub fn append_tcp_address(&self, network: &str, address: &str) -> Result<Endpoint> {
        let endpoint = Endpoint::resolve(network, address)?;
        self.append(endpoint);
        Ok(endpoint)
    }

    /// Number of endpoints in the rotation.
    pub fn len(&self) -> usize {
        self.lock().endpoints.len()
    }

    /// Check if the rotation is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().endpoints.is_empty()
    }

    /// Snapshot of the configured endpoints.
    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.lock().endpoints.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Rotation> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AddressSelector for RoundRobin {
    fn select_next(&self) -> Option<Endpoint> {
        let mut rotation = self.lock();
        if rotation.endpoints.is_empty() {
            return None;
        }
        let next = match rotation.cursor {
            Some(i) if i + 1 < rotation.endpoints.len() => i + 1,
            _ => 0,
        };
        rotation.cursor = Some(next);
        Some(rotation.endpoints[next])
    }
}
