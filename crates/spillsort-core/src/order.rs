//! Comparator and reducer contracts.

use std::cmp::Ordering;
use std::sync::Arc;

/// User-supplied total order over records.
///
/// Records comparing `Equal` are equivalent; the sorter promises no
/// stability between them. Callers that need a deterministic order for
/// equal keys must fold a tie-break into the comparator itself.
pub type CompareFn<T> = Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// Total order from the type's own `Ord` instance.
pub fn natural_order<T: Ord>() -> CompareFn<T> {
    Arc::new(|a: &T, b: &T| a.cmp(b))
}

/// Total order over a derived key.
pub fn order_by_key<T, K, F>(key: F) -> CompareFn<T>
where
    K: Ord,
    F: Fn(&T) -> K + Send + Sync + 'static,
{
    Arc::new(move |a: &T, b: &T| key(a).cmp(&key(b)))
}

/// Collapses a sorted batch into an observationally equivalent, usually
/// shorter, sorted batch.
///
/// The input arrives non-decreasing under the stage comparator, so
/// equal-keyed records are adjacent. The output must be non-decreasing
/// too; the reducer must never manufacture records that would break the
/// order.
pub trait Reducer<T>: Send + Sync {
    fn reduce(&self, batch: Vec<T>) -> Vec<T>;
}

impl<T, F> Reducer<T> for F
where
    F: Fn(Vec<T>) -> Vec<T> + Send + Sync,
{
    fn reduce(&self, batch: Vec<T>) -> Vec<T> {
        (self)(batch)
    }
}
