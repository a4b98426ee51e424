//! The record bound shared by every sorter component.

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Anything the stage can buffer, spill to disk, and read back.
///
/// Blanket-implemented; user types only need serde derives.
pub trait Record: Serialize + DeserializeOwned + Send + 'static {}

impl<T> Record for T where T: Serialize + DeserializeOwned + Send + 'static {}
