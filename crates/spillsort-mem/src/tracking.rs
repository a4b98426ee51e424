//! Lightweight high-water-mark tracking.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Records the peak of a monotonically sampled figure, such as the
/// number of records a stage holds in memory.
#[derive(Debug, Default)]
pub struct PeakTracker {
    peak: AtomicUsize,
}

impl PeakTracker {
    pub fn new() -> Self {
        Self {
            peak: AtomicUsize::new(0),
        }
    }

    /// Record a new sample; updates the peak if higher.
    pub fn record(&self, value: usize) {
        self.peak.fetch_max(value, Ordering::AcqRel);
        #[cfg(feature = "tracing")]
        tracing::trace!(value, peak = self.peak(), "peak sample");
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Relaxed)
    }
}
