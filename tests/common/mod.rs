//! Shared helpers for the integration tests.
#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use rand::Rng;

use spillsort_core::config::SortConfig;
use spillsort_core::error::{Error, Result};
use spillsort_core::processor::{Processor, VecSink};
use spillsort_mem::{HeapPools, MemoryPool};

/// Monitor with one large threshold-capable pool whose usage never moves
/// unless a test drives it.
pub fn idle_monitor() -> Arc<HeapPools> {
    let pools = HeapPools::new();
    pools.add_pool(MemoryPool::new("heap", 1 << 30));
    Arc::new(pools)
}

/// Default config pointed at a test-owned scratch directory.
pub fn config_in(dir: &Path) -> SortConfig {
    SortConfig {
        temp_dir: dir.to_path_buf(),
        ..SortConfig::default()
    }
}

pub fn random_i64s(n: usize) -> Vec<i64> {
    let mut rng = rand::thread_rng();
    (0..n).map(|_| rng.gen::<i64>()).collect()
}

/// Number of run files currently in `dir`.
pub fn run_files_in(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| entries.filter_map(|e| e.ok()).count())
        .unwrap_or(0)
}

/// Processor handle whose collected output outlives the stage that owns
/// it. The returned buffer exposes `items` and the close count.
pub struct SharedSink<T> {
    inner: Arc<Mutex<VecSink<T>>>,
}

impl<T> SharedSink<T> {
    pub fn new() -> (Self, Arc<Mutex<VecSink<T>>>) {
        let inner = Arc::new(Mutex::new(VecSink::new()));
        (
            Self {
                inner: Arc::clone(&inner),
            },
            inner,
        )
    }
}

impl<T: Send> Processor<T> for SharedSink<T> {
    fn process(&mut self, record: T) -> Result<()> {
        self.inner.lock().expect("sink lock").process(record)
    }

    fn close(&mut self) -> Result<()> {
        self.inner.lock().expect("sink lock").close()
    }
}

/// Sink that fails after accepting `accept` records.
pub struct FailingSink {
    pub accept: usize,
    pub seen: usize,
}

impl<T: Send> Processor<T> for FailingSink {
    fn process(&mut self, _record: T) -> Result<()> {
        if self.seen >= self.accept {
            return Err(Error::Protocol("downstream refused record".into()));
        }
        self.seen += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
