//! Cheap stage metrics.
//!
//! Purposefully avoids pulling a telemetry stack; wire these to
//! OpenTelemetry/Prometheus in the host layer if desired.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use spillsort_mem::PeakTracker;

/// Monotonic counter, cloneable across threads.
#[derive(Clone, Debug, Default)]
pub struct Counter(Arc<AtomicU64>);

impl Counter {
    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Counters every sorter exposes.
#[derive(Clone, Debug, Default)]
pub struct SortMetrics {
    /// Temporary run files written by spills.
    pub files_written: Counter,
    /// K-way merge passes over on-disk runs (compaction and final drain).
    pub combine_steps: Counter,
    /// High-water mark of records buffered in memory.
    pub peak_buffered: Arc<PeakTracker>,
}
