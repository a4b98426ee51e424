#![forbid(unsafe_code)]
//! spillsort-mem: memory pools and usage-threshold notification.
//!
//! The sorter never measures memory itself; it subscribes to a
//! `MemoryMonitor` and reacts to threshold-exceeded events. This crate
//! holds that seam plus a concrete monitor (`HeapPools`) built on named
//! pools with atomically tracked usage and a polling watcher thread.
//!
//! No file I/O lives here. Listeners are called from the watcher's
//! thread and must hand real work off to a worker.

pub mod error;
pub mod pool;
pub mod tracking;
pub mod watch;

pub use pool::{HeapPools, MemoryPool};
pub use tracking::PeakTracker;
pub use watch::{MemoryMonitor, PoolUsage, ThresholdListener, WatchId};
