//! Spill set: on-disk runs, cascade compaction, final drain.

use std::path::PathBuf;

use spillsort_core::error::Result;
use spillsort_core::order::CompareFn;
use spillsort_core::processor::Processor;
use spillsort_core::record::Record;
use spillsort_io::run::{RunReader, RunWriter};
use spillsort_io::temp::TempFileProvider;

use crate::merge::{merge_runs, RunCursor};
use crate::metrics::SortMetrics;
use crate::runs::VecCursor;

const GIB: u64 = 1024 * 1024 * 1024;

/// One sealed on-disk run.
#[derive(Debug, Clone)]
struct SpillFile {
    path: PathBuf,
    bytes: u64,
}

/// Owns every temporary run file the stage creates.
///
/// Files enter through `spill_runs`, shrink in number through `compact`,
/// and leave through `merge_into` or `cleanup`. Each file is deleted
/// exactly when it has been consumed by a merge step, or best-effort on
/// teardown.
pub struct SpillSet {
    provider: TempFileProvider,
    files: Vec<SpillFile>,
    file_limit: usize,
    combine_buffer: usize,
    metrics: SortMetrics,
}

/// Cursor over a file-backed run.
struct FileCursor<T> {
    reader: RunReader<T>,
    top: Option<T>,
}

impl<T: Record> FileCursor<T> {
    fn open(path: &std::path::Path, chunk: usize) -> Result<Self> {
        let mut reader = RunReader::open(path, chunk)?;
        let top = reader.next_record()?;
        Ok(Self { reader, top })
    }
}

impl<T: Record> RunCursor<T> for FileCursor<T> {
    fn top(&self) -> Option<&T> {
        self.top.as_ref()
    }

    fn pop(&mut self) -> Result<Option<T>> {
        let record = self.top.take();
        self.top = self.reader.next_record()?;
        Ok(record)
    }
}

impl SpillSet {
    pub fn new(
        provider: TempFileProvider,
        file_limit: usize,
        combine_buffer: usize,
        metrics: SortMetrics,
    ) -> Self {
        Self {
            provider,
            files: Vec::new(),
            file_limit,
            combine_buffer,
            metrics,
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Seal the given sorted runs into one new temporary file.
    pub fn spill_runs<T: Record>(&mut self, runs: Vec<Vec<T>>, cmp: &CompareFn<T>) -> Result<()> {
        let path = self.provider.provision()?;
        match write_merged(runs, cmp, &path) {
            Ok(bytes) => {
                self.files.push(SpillFile { path, bytes });
                self.metrics.files_written.increment();
                Ok(())
            }
            Err(e) => {
                // Partially written file; caller propagates the error.
                let _ = self.provider.remove(&path);
                Err(e)
            }
        }
    }

    /// Merge the smallest files together until at most `file_limit`
    /// remain.
    ///
    /// Smallest-first keeps write amplification low: a record is only
    /// rewritten when it sits in a small file, and freshly compacted
    /// files are large enough to stay out of the next cohort.
    pub fn compact<T: Record>(&mut self, cmp: &CompareFn<T>) -> Result<()> {
        while self.files.len() > self.file_limit {
            self.files.sort_by_key(|f| f.bytes);
            let cohort: Vec<SpillFile> = self.files.drain(..self.file_limit).collect();
            let total: u64 = cohort.iter().map(|f| f.bytes).sum();

            // Pre-reserve generously; the writer trims unused slack.
            let path = self.provider.provision_sized(total * 2 + GIB)?;
            let result = (|| {
                let mut writer = RunWriter::create(&path)?;
                self.merge_files(&cohort, cmp, &mut writer)?;
                writer.finish()
            })();

            match result {
                Ok(bytes) => {
                    self.files.push(SpillFile { path, bytes });
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        merged = self.file_limit,
                        remaining = self.files.len(),
                        "compacted spill cohort"
                    );
                }
                Err(e) => {
                    // Hand the cohort back so teardown can sweep it.
                    self.files.extend(cohort);
                    let _ = self.provider.remove(&path);
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Stream every remaining file into `output`, deleting each file
    /// once consumed.
    pub fn merge_into<T: Record>(
        &mut self,
        cmp: &CompareFn<T>,
        output: &mut dyn Processor<T>,
    ) -> Result<()> {
        let files = std::mem::take(&mut self.files);
        let result = self.merge_files(&files, cmp, output);
        if result.is_err() {
            self.files = files;
        }
        result
    }

    /// One combine step: k-way merge `files` into `output`, then delete
    /// them.
    fn merge_files<T: Record>(
        &self,
        files: &[SpillFile],
        cmp: &CompareFn<T>,
        output: &mut dyn Processor<T>,
    ) -> Result<()> {
        self.metrics.combine_steps.increment();
        let mut cursors: Vec<Box<dyn RunCursor<T>>> = Vec::with_capacity(files.len());
        for file in files {
            cursors.push(Box::new(FileCursor::open(&file.path, self.combine_buffer)?));
        }
        merge_runs(cursors, cmp, output)?;
        for file in files {
            self.provider.remove(&file.path)?;
        }
        Ok(())
    }

    /// Best-effort removal of every file still owned by the set.
    pub fn cleanup(&mut self) {
        for file in self.files.drain(..) {
            let _ = self.provider.remove(&file.path);
        }
    }
}

fn write_merged<T: Record>(
    runs: Vec<Vec<T>>,
    cmp: &CompareFn<T>,
    path: &std::path::Path,
) -> Result<u64> {
    let mut writer = RunWriter::create(path)?;
    let cursors: Vec<Box<dyn RunCursor<T>>> = runs
        .into_iter()
        .map(|run| Box::new(VecCursor::new(run)) as Box<dyn RunCursor<T>>)
        .collect();
    merge_runs(cursors, cmp, &mut writer)?;
    writer.finish()
}
