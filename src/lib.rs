#![forbid(unsafe_code)]
//! spillsort: an external-memory sorting stage for record dataflows.
//!
//! The stage consumes an unbounded stream of records through
//! [`Processor::process`], sorts them under a caller-supplied total
//! order, optionally collapses combinable records through a
//! [`Reducer`], and on [`Processor::close`] streams the sorted result to
//! a downstream processor. Peak memory stays bounded: sorted runs spill
//! to temporary files when limits or host memory pressure demand it, and
//! a cascading compaction keeps the final k-way merge under the
//! configured fan-in.
//!
//! This facade re-exports the workspace layers; see `spillsort-core`,
//! `spillsort-mem`, `spillsort-io`, and `spillsort-engine` for the
//! pieces.
//!
//! ```no_run
//! use std::sync::Arc;
//! use spillsort::{natural_order, HeapPools, MemoryPool, Processor, SortConfig, Sorter, VecSink};
//!
//! # fn main() -> spillsort::Result<()> {
//! let pools = HeapPools::new();
//! pools.add_pool(MemoryPool::new("heap", 512 * 1024 * 1024));
//!
//! let mut sorter = Sorter::builder(natural_order::<i64>(), VecSink::new())
//!     .config(SortConfig::default())
//!     .monitor(Arc::new(pools))
//!     .build()?;
//!
//! for n in [3i64, 1, 2] {
//!     sorter.process(n)?;
//! }
//! sorter.close()?;
//! # Ok(())
//! # }
//! ```

pub use spillsort_core::config::SortConfig;
pub use spillsort_core::error::{Error, Result};
pub use spillsort_core::order::{natural_order, order_by_key, CompareFn, Reducer};
pub use spillsort_core::processor::{Processor, VecSink};
pub use spillsort_core::record::Record;
pub use spillsort_core::registry::SortRegistry;

pub use spillsort_engine::{merge_runs, Counter, RunCursor, RunPool, SortMetrics, Sorter, SorterBuilder, VecCursor};

pub use spillsort_io::run::{RunHeader, RunReader, RunWriter};
pub use spillsort_io::temp::TempFileProvider;

pub use spillsort_mem::{HeapPools, MemoryMonitor, MemoryPool, PeakTracker, PoolUsage, ThresholdListener, WatchId};
