//! The sorting stage: buffering, reduction, spilling, final emission.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::thread;

use spillsort_core::config::SortConfig;
use spillsort_core::error::{Error, Result};
use spillsort_core::order::{CompareFn, Reducer};
use spillsort_core::processor::Processor;
use spillsort_core::record::Record;
use spillsort_io::temp::TempFileProvider;
use spillsort_mem::{MemoryMonitor, PoolUsage, ThresholdListener, WatchId};

use crate::merge::{merge_runs, RunCursor};
use crate::metrics::SortMetrics;
use crate::runs::{RunPool, VecCursor};
use crate::spill::SpillSet;

/// External-memory sorting stage.
///
/// Records stream in through `process`; on `close` they stream out to
/// the downstream processor in comparator order. In between, the stage
/// seals sorted runs in memory, spills them to temporary files when the
/// configured limits or an asynchronous memory-pressure signal demand
/// it, and compacts on-disk runs so the final merge never exceeds the
/// fan-in bound.
///
/// All mutable state sits behind one coarse lock, taken for the duration
/// of each public operation and of each pressure-initiated spill. The
/// pressure flag lives outside the lock so the memory notifier is never
/// blocked.
pub struct Sorter<T: Record> {
    shared: Arc<Shared<T>>,
    monitor: Arc<dyn MemoryMonitor>,
    watch: Option<WatchId>,
}

struct Shared<T: Record> {
    state: Mutex<State<T>>,
    /// Set by the memory listener; cleared when a spill completes.
    pressure: AtomicBool,
    metrics: SortMetrics,
}

struct State<T: Record> {
    ingest: Vec<T>,
    runs: RunPool<T>,
    spills: SpillSet,
    cmp: CompareFn<T>,
    reducer: Option<Arc<dyn Reducer<T>>>,
    downstream: Box<dyn Processor<T>>,
    object_limit: usize,
    reduce_interval: usize,
    closed: bool,
    /// First failure observed on the pressure worker, surfaced on the
    /// next caller operation.
    deferred: Option<Error>,
}

impl<T: Record> State<T> {
    fn total_buffered(&self) -> usize {
        self.ingest.len() + self.runs.records()
    }
}

/// Assembles a [`Sorter`]. A memory monitor is mandatory: a host without
/// one cannot run this stage.
pub struct SorterBuilder<T: Record> {
    config: SortConfig,
    cmp: CompareFn<T>,
    reducer: Option<Arc<dyn Reducer<T>>>,
    downstream: Box<dyn Processor<T>>,
    monitor: Option<Arc<dyn MemoryMonitor>>,
}

impl<T: Record> Sorter<T> {
    pub fn builder(
        cmp: CompareFn<T>,
        downstream: impl Processor<T> + 'static,
    ) -> SorterBuilder<T> {
        SorterBuilder {
            config: SortConfig::default(),
            cmp,
            reducer: None,
            downstream: Box::new(downstream),
            monitor: None,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.shared.state.lock().expect("sorter state lock poisoned")
    }

    /// Accept one record. May reduce or spill before returning.
    pub fn process(&mut self, record: T) -> Result<()> {
        let mut state = self.lock();
        if state.closed {
            return Err(Error::Protocol("process called after close".into()));
        }
        if let Some(e) = state.deferred.take() {
            return Err(e);
        }
        state.ingest.push(record);
        self.shared.metrics.peak_buffered.record(state.total_buffered());
        Self::flush_if_necessary(&self.shared, &mut state)
    }

    /// Finish sorting and stream everything downstream.
    ///
    /// The memory listener is deregistered first, so a late notification
    /// can never race a half-torn-down stage; the close path is then
    /// free to hold the lock through downstream emission.
    pub fn close(&mut self) -> Result<()> {
        if let Some(watch) = self.watch.take() {
            self.monitor.unsubscribe(watch);
        }

        let mut state = self.lock();
        if state.closed {
            return Err(Error::Protocol("close called twice".into()));
        }
        state.closed = true;

        if let Some(e) = state.deferred.take() {
            state.spills.cleanup();
            return Err(e);
        }

        if let Err(e) = Self::emit_all(&self.shared, &mut state) {
            state.spills.cleanup();
            return Err(e);
        }
        state.downstream.close()
    }

    /// Clone of the stage's counters.
    pub fn metrics(&self) -> SortMetrics {
        self.shared.metrics.clone()
    }

    /// Records currently held in memory (ingest buffer + run pool).
    pub fn buffered_records(&self) -> usize {
        self.lock().total_buffered()
    }

    /// Temporary run files currently on disk.
    pub fn spill_file_count(&self) -> usize {
        self.lock().spills.len()
    }

    fn needs_flush(shared: &Shared<T>, state: &State<T>) -> bool {
        shared.pressure.load(Ordering::Acquire)
            || state.ingest.len() > state.reduce_interval
            || state.total_buffered() > state.object_limit
    }

    fn flush_if_necessary(shared: &Shared<T>, state: &mut State<T>) -> Result<()> {
        if Self::needs_flush(shared, state) {
            // Reduce first: it reclaims memory by itself and leaves the
            // pool pre-sorted, so a spill that still proves necessary
            // streams without sorting under pressure.
            Self::reduce(state);
            if Self::needs_flush(shared, state) {
                Self::spill(shared, state)?;
            }
        }
        Ok(())
    }

    /// Seal the ingest buffer into a sorted in-memory run.
    ///
    /// Sorting happens here, while the records are cache-warm. The
    /// reducer sees the sorted batch, with equal keys adjacent.
    fn reduce(state: &mut State<T>) {
        if state.ingest.is_empty() {
            return;
        }
        let mut batch = std::mem::take(&mut state.ingest);
        let cmp = Arc::clone(&state.cmp);
        batch.sort_unstable_by(|a, b| (*cmp)(a, b));
        if let Some(reducer) = &state.reducer {
            batch = reducer.reduce(batch);
        }
        state.runs.push(batch);
    }

    /// Write the whole run pool to one on-disk run and clear it.
    fn spill(shared: &Shared<T>, state: &mut State<T>) -> Result<()> {
        Self::reduce(state);
        if !state.runs.is_empty() {
            let cmp = Arc::clone(&state.cmp);
            let runs = state.runs.take();
            state.spills.spill_runs(runs, &cmp)?;
            #[cfg(feature = "tracing")]
            tracing::debug!(files = state.spills.len(), "spilled run pool");
        }
        shared.pressure.store(false, Ordering::Release);
        Ok(())
    }

    fn emit_all(shared: &Shared<T>, state: &mut State<T>) -> Result<()> {
        if !state.spills.is_empty() {
            // Residual in-memory records join the spill set, the cascade
            // brings the file count under the fan-in bound, and one
            // final merge streams from disk to downstream.
            Self::spill(shared, state)?;
            let cmp = Arc::clone(&state.cmp);
            state.spills.compact::<T>(&cmp)?;
            let State {
                spills, downstream, ..
            } = state;
            spills.merge_into(&cmp, downstream.as_mut())
        } else {
            Self::reduce(state);
            let cmp = Arc::clone(&state.cmp);
            let cursors: Vec<Box<dyn RunCursor<T>>> = state
                .runs
                .take()
                .into_iter()
                .map(|run| Box::new(VecCursor::new(run)) as Box<dyn RunCursor<T>>)
                .collect();
            merge_runs(cursors, &cmp, state.downstream.as_mut())
        }
    }
}

impl<T: Record> Processor<T> for Sorter<T> {
    fn process(&mut self, record: T) -> Result<()> {
        Sorter::process(self, record)
    }

    fn close(&mut self) -> Result<()> {
        Sorter::close(self)
    }
}

impl<T: Record> Drop for Sorter<T> {
    fn drop(&mut self) {
        if let Some(watch) = self.watch.take() {
            self.monitor.unsubscribe(watch);
        }
        // A dropped-but-unclosed stage still honors the deletion
        // contract for its temporaries.
        if let Ok(mut state) = self.shared.state.lock() {
            if !state.closed {
                state.spills.cleanup();
            }
        }
    }
}

impl<T: Record> SorterBuilder<T> {
    #[must_use]
    pub fn config(mut self, config: SortConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn reducer(mut self, reducer: impl Reducer<T> + 'static) -> Self {
        self.reducer = Some(Arc::new(reducer));
        self
    }

    #[must_use]
    pub fn monitor(mut self, monitor: Arc<dyn MemoryMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn build(self) -> Result<Sorter<T>> {
        self.config.validate()?;
        let monitor = self
            .monitor
            .ok_or_else(|| Error::Config("a memory monitor is required".into()))?;

        let provider = TempFileProvider::new(&self.config.temp_dir)?;
        let metrics = SortMetrics::default();
        let spills = SpillSet::new(
            provider,
            self.config.file_limit,
            self.config.combine_buffer,
            metrics.clone(),
        );

        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                ingest: Vec::new(),
                runs: RunPool::new(),
                spills,
                cmp: self.cmp,
                reducer: self.reducer,
                downstream: self.downstream,
                object_limit: self.config.object_limit,
                reduce_interval: self.config.reduce_interval,
                closed: false,
                deferred: None,
            }),
            pressure: AtomicBool::new(false),
            metrics,
        });

        let listener = Arc::new(PressureSpill {
            shared: Arc::downgrade(&shared),
        });
        let watch = monitor
            .subscribe(self.config.memory_threshold, listener)
            .map_err(|e| Error::Config(e.to_string()))?;

        Ok(Sorter {
            shared,
            monitor,
            watch: Some(watch),
        })
    }
}

/// Listener registered with the host memory monitor.
///
/// Holds only a weak reference: a notification that races with teardown
/// upgrades to nothing and is dropped silently.
struct PressureSpill<T: Record> {
    shared: Weak<Shared<T>>,
}

impl<T: Record> ThresholdListener for PressureSpill<T> {
    fn threshold_exceeded(&self, _usage: PoolUsage) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        shared.pressure.store(true, Ordering::Release);

        // Spill on a worker; the notifier's thread must never touch I/O.
        thread::spawn(move || {
            let mut state = shared.state.lock().expect("sorter state lock poisoned");
            if state.closed {
                return;
            }
            if let Err(e) = Sorter::spill(&shared, &mut state) {
                state.deferred.get_or_insert(e);
            }
        });
    }
}
