//! Memory-usage notification seam.
//!
//! Trait-only definitions so components can depend on the notification
//! contract without pulling in the concrete pool watcher.

use std::sync::Arc;

use crate::error::Result;

/// Snapshot of the watched pool at notification time.
#[derive(Debug, Clone)]
pub struct PoolUsage {
    pub pool: String,
    pub used: usize,
    pub capacity: usize,
}

/// Receives threshold-exceeded events.
///
/// Called from the monitor's own thread. Implementations must be cheap
/// and must not block or perform I/O; set a flag and hand off to a
/// worker.
pub trait ThresholdListener: Send + Sync {
    fn threshold_exceeded(&self, usage: PoolUsage);
}

/// Subscription handle returned by `MemoryMonitor::subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(pub(crate) u64);

/// Host service that watches memory pools and delivers threshold events.
///
/// Threshold-exceeded is the only event. Subscribing arms a threshold at
/// `fraction` of the largest threshold-capable pool's capacity; it fails
/// when no such pool exists, which callers treat as a configuration
/// error.
pub trait MemoryMonitor: Send + Sync {
    fn subscribe(&self, fraction: f64, listener: Arc<dyn ThresholdListener>) -> Result<WatchId>;

    /// Stop delivering events for `id`. Unknown ids are ignored.
    fn unsubscribe(&self, id: WatchId);
}
