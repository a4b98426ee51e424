#![forbid(unsafe_code)]
//! spillsort-engine: the sorting stage and its merge/spill machinery.
//!
//! The stage accepts records through `Processor::process`, seals sorted
//! runs in memory, spills runs to temporary files when a limit or a
//! memory-pressure signal demands it, and on `close` streams a k-way
//! merge of everything into the downstream processor.

pub mod merge;
pub mod metrics;
pub mod runs;
pub mod sorter;
pub mod spill;

pub use merge::{merge_runs, RunCursor};
pub use metrics::{Counter, SortMetrics};
pub use runs::{RunPool, VecCursor};
pub use sorter::{Sorter, SorterBuilder};
