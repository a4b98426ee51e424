//! Convenient re-exports for downstream crates.

pub use crate::config::SortConfig;
pub use crate::error::{Error, Result};
pub use crate::order::{natural_order, order_by_key, CompareFn, Reducer};
pub use crate::processor::{Processor, VecSink};
pub use crate::record::Record;
pub use crate::registry::SortRegistry;
