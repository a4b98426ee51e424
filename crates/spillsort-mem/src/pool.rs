//! Named memory pools and the polling threshold watcher.
//!
//! A `MemoryPool` is a capacity plus an atomically tracked usage figure
//! that the host updates as it allocates and frees. `HeapPools` watches
//! the registered pools from a background thread and delivers
//! edge-triggered threshold events to subscribers: a watch fires once
//! when usage crosses its threshold and re-arms only after usage drops
//! back below it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::watch::{MemoryMonitor, PoolUsage, ThresholdListener, WatchId};

struct PoolInner {
    name: String,
    capacity: usize,
    used: AtomicUsize,
    supports_threshold: bool,
}

/// Shared handle to one named pool.
#[derive(Clone)]
pub struct MemoryPool {
    inner: Arc<PoolInner>,
}

impl MemoryPool {
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                name: name.into(),
                capacity,
                used: AtomicUsize::new(0),
                supports_threshold: true,
            }),
        }
    }

    /// A pool that cannot be watched; subscribers skip it.
    pub fn without_threshold(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                name: name.into(),
                capacity,
                used: AtomicUsize::new(0),
                supports_threshold: false,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn used(&self) -> usize {
        self.inner.used.load(Ordering::Relaxed)
    }

    pub fn supports_threshold(&self) -> bool {
        self.inner.supports_threshold
    }

    /// Overwrite the usage figure, e.g. from a sampler.
    pub fn set_used(&self, bytes: usize) {
        self.inner.used.store(bytes, Ordering::Release);
    }

    pub fn add_used(&self, bytes: usize) {
        self.inner.used.fetch_add(bytes, Ordering::AcqRel);
    }

    pub fn release(&self, bytes: usize) {
        let mut cur = self.inner.used.load(Ordering::Relaxed);
        loop {
            let next = cur.saturating_sub(bytes);
            match self.inner.used.compare_exchange(
                cur,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(observed) => cur = observed,
            }
        }
    }
}

struct Watch {
    pool: MemoryPool,
    threshold_bytes: usize,
    listener: Arc<dyn ThresholdListener>,
    armed: bool,
}

struct PoolsInner {
    pools: Mutex<Vec<MemoryPool>>,
    watches: Mutex<HashMap<u64, Watch>>,
    next_watch: AtomicU64,
    stop: AtomicBool,
}

/// Concrete `MemoryMonitor` over a set of registered pools.
///
/// Cloning shares the same watcher; the background thread exits when the
/// last handle (including subscriber-held trait objects) is dropped.
#[derive(Clone)]
pub struct HeapPools {
    inner: Arc<PoolsInner>,
}

impl Default for HeapPools {
    fn default() -> Self {
        Self::new()
    }
}

impl HeapPools {
    pub fn new() -> Self {
        Self::with_poll_interval(Duration::from_millis(20))
    }

    pub fn with_poll_interval(poll: Duration) -> Self {
        let inner = Arc::new(PoolsInner {
            pools: Mutex::new(Vec::new()),
            watches: Mutex::new(HashMap::new()),
            next_watch: AtomicU64::new(0),
            stop: AtomicBool::new(false),
        });
        let weak = Arc::downgrade(&inner);
        thread::spawn(move || watch_loop(weak, poll));
        Self { inner }
    }

    pub fn add_pool(&self, pool: MemoryPool) {
        self.inner
            .pools
            .lock()
            .expect("pool registry lock poisoned")
            .push(pool);
    }

    /// Ask the watcher thread to exit at its next tick.
    pub fn shutdown(&self) {
        self.inner.stop.store(true, Ordering::Release);
    }
}

impl MemoryMonitor for HeapPools {
    fn subscribe(&self, fraction: f64, listener: Arc<dyn ThresholdListener>) -> Result<WatchId> {
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(Error::Threshold(fraction));
        }

        // Arm the largest threshold-capable pool, so one subscription
        // covers the dominant share of process memory without
        // double-counting smaller pools.
        let pool = {
            let pools = self.inner.pools.lock().expect("pool registry lock poisoned");
            pools
                .iter()
                .filter(|p| p.supports_threshold() && p.capacity() > 0)
                .max_by_key(|p| p.capacity())
                .cloned()
        };
        let pool = pool.ok_or_else(|| {
            Error::Unsupported("no threshold-capable pool registered".into())
        })?;

        let threshold_bytes = (pool.capacity() as f64 * fraction) as usize;
        let id = self.inner.next_watch.fetch_add(1, Ordering::Relaxed);
        self.inner
            .watches
            .lock()
            .expect("watch table lock poisoned")
            .insert(
                id,
                Watch {
                    pool,
                    threshold_bytes,
                    listener,
                    armed: true,
                },
            );
        Ok(WatchId(id))
    }

    fn unsubscribe(&self, id: WatchId) {
        self.inner
            .watches
            .lock()
            .expect("watch table lock poisoned")
            .remove(&id.0);
    }
}

fn watch_loop(inner: Weak<PoolsInner>, poll: Duration) {
    loop {
        let Some(strong) = inner.upgrade() else { return };
        if strong.stop.load(Ordering::Acquire) {
            return;
        }

        let mut pending: Vec<(Arc<dyn ThresholdListener>, PoolUsage)> = Vec::new();
        {
            let mut watches = strong.watches.lock().expect("watch table lock poisoned");
            for watch in watches.values_mut() {
                let used = watch.pool.used();
                if watch.armed && used > watch.threshold_bytes {
                    watch.armed = false;
                    pending.push((
                        Arc::clone(&watch.listener),
                        PoolUsage {
                            pool: watch.pool.name().to_string(),
                            used,
                            capacity: watch.pool.capacity(),
                        },
                    ));
                } else if !watch.armed && used <= watch.threshold_bytes {
                    watch.armed = true;
                }
            }
        }
        // Listeners run outside the watch-table lock.
        drop(strong);
        for (listener, usage) in pending {
            #[cfg(feature = "tracing")]
            tracing::trace!(pool = %usage.pool, used = usage.used, "threshold exceeded");
            listener.threshold_exceeded(usage);
        }

        thread::sleep(poll);
    }
}
