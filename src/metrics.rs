//! Dial counters.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time snapshot of a dialer's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DialMetrics {
    /// Connections established through the transport.
    pub direct_dials: u64,
    /// Dials served from the idle pool.
    pub pool_reuses: u64,
}

impl DialMetrics {
    /// Total number of connections handed out.
    pub fn total(&self) -> u64 {
        self.direct_dials + self.pool_reuses
    }

    /// Fraction of dials served from the pool, in `[0, 1]`.
    pub fn reuse_ratio(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.pool_reuses as f64 / total as f64,
        }
    }
}

impl fmt::Display for DialMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "dial_direct={} dial_pool_reuse={}",
            self.direct_dials, self.pool_reuses
        )
    }
}

/// Monotonic counters owned by a dialer.
#[derive(Debug, Default)]
pub(crate) struct DialCounters {
    direct: AtomicU64,
    reused: AtomicU64,
}

impl DialCounters {
    pub(crate) fn record_direct(&self) {
        self.direct.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reuse(&self) {
        self.reused.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> DialMetrics {
        DialMetrics {
            direct_dials: self.direct.load(Ordering::Relaxed),
            pool_reuses: self.reused.load(Ordering::Relaxed),
        }
    }
}
