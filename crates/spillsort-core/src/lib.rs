#![forbid(unsafe_code)]
//! spillsort-core: shared vocabulary for the sorting stage.
//!
//! Everything the other crates agree on lives here: the error taxonomy,
//! the stage configuration, the `Processor` seam between dataflow stages,
//! the comparator/reducer contracts, and the assembly-time registry.
//! No I/O and no threads in this crate.

pub mod config;
pub mod error;
pub mod order;
pub mod prelude;
pub mod processor;
pub mod record;
pub mod registry;

pub use config::SortConfig;
pub use error::{Error, Result};
pub use order::{natural_order, order_by_key, CompareFn, Reducer};
pub use processor::{Processor, VecSink};
pub use record::Record;
pub use registry::SortRegistry;
