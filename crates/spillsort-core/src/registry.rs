//! Tag-to-constructor registry used at stage assembly.
//!
//! Hosts configure orders and reducers by name. The registry resolves
//! those names to function values before a sorter is built, so the stage
//! itself never sees a string. Unknown tags are configuration errors
//! surfaced at assembly time, not at first use.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::order::{CompareFn, Reducer};

type OrderFactory<T> = Arc<dyn Fn() -> CompareFn<T> + Send + Sync>;
type ReducerFactory<T> = Arc<dyn Fn() -> Arc<dyn Reducer<T>> + Send + Sync>;

pub struct SortRegistry<T> {
    orders: HashMap<String, OrderFactory<T>>,
    reducers: HashMap<String, ReducerFactory<T>>,
}

impl<T> Default for SortRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SortRegistry<T> {
    pub fn new() -> Self {
        Self {
            orders: HashMap::new(),
            reducers: HashMap::new(),
        }
    }

    pub fn register_order<F>(&mut self, tag: impl Into<String>, factory: F)
    where
        F: Fn() -> CompareFn<T> + Send + Sync + 'static,
    {
        self.orders.insert(tag.into(), Arc::new(factory));
    }

    pub fn register_reducer<F>(&mut self, tag: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn Reducer<T>> + Send + Sync + 'static,
    {
        self.reducers.insert(tag.into(), Arc::new(factory));
    }

    /// Resolve an order tag to a comparator.
    pub fn order(&self, tag: &str) -> Result<CompareFn<T>> {
        self.orders
            .get(tag)
            .map(|factory| (**factory)())
            .ok_or_else(|| Error::Config(format!("unknown order '{tag}'")))
    }

    /// Resolve a reducer tag.
    pub fn reducer(&self, tag: &str) -> Result<Arc<dyn Reducer<T>>> {
        self.reducers
            .get(tag)
            .map(|factory| (**factory)())
            .ok_or_else(|| Error::Config(format!("unknown reducer '{tag}'")))
    }
}
