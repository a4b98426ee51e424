//! Stage configuration that hosts can serialize/deserialize.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortConfig {
    /// Hard cap on in-memory records (ingest buffer + run pool) before a
    /// forced spill.
    pub object_limit: usize,

    /// Ingest-buffer length that triggers an in-memory reduce on its own.
    pub reduce_interval: usize,

    /// Records buffered per on-disk run reader during merges.
    pub combine_buffer: usize,

    /// Most on-disk runs tolerated before cascade compaction kicks in.
    pub file_limit: usize,

    /// Fraction of the watched memory pool at which pressure fires.
    pub memory_threshold: f64,

    /// Directory for temporary run files. Shared with other stages;
    /// filenames are provisioned uniquely.
    pub temp_dir: PathBuf,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            object_limit: 50_000_000,
            reduce_interval: 100_000,
            combine_buffer: 100_000,
            file_limit: 20,
            memory_threshold: 0.70,
            temp_dir: std::env::temp_dir().join("spillsort"),
        }
    }
}

impl SortConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `SPILLSORT_OBJECT_LIMIT`: in-memory record cap
    /// - `SPILLSORT_REDUCE_INTERVAL`: ingest reduce trigger
    /// - `SPILLSORT_COMBINE_BUFFER`: merge-read buffer in records
    /// - `SPILLSORT_FILE_LIMIT`: on-disk run fan-in bound
    /// - `SPILLSORT_MEMORY_THRESHOLD`: pool fraction for pressure
    /// - `SPILLSORT_TEMP_DIR`: temporary-file directory
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("SPILLSORT_OBJECT_LIMIT") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.object_limit = v;
            }
        }

        if let Ok(s) = std::env::var("SPILLSORT_REDUCE_INTERVAL") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.reduce_interval = v;
            }
        }

        if let Ok(s) = std::env::var("SPILLSORT_COMBINE_BUFFER") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.combine_buffer = v;
            }
        }

        if let Ok(s) = std::env::var("SPILLSORT_FILE_LIMIT") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.file_limit = v;
            }
        }

        if let Ok(s) = std::env::var("SPILLSORT_MEMORY_THRESHOLD") {
            if let Ok(v) = s.parse::<f64>() {
                cfg.memory_threshold = v;
            }
        }

        if let Ok(s) = std::env::var("SPILLSORT_TEMP_DIR") {
            cfg.temp_dir = PathBuf::from(s);
        }

        cfg
    }

    /// Reject configurations the stage cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.object_limit == 0 {
            return Err(Error::Config("object_limit must be positive".into()));
        }
        if self.reduce_interval == 0 {
            return Err(Error::Config("reduce_interval must be positive".into()));
        }
        if self.combine_buffer == 0 {
            return Err(Error::Config("combine_buffer must be positive".into()));
        }
        if self.file_limit < 2 {
            return Err(Error::Config(format!(
                "file_limit {} too small: a merge needs at least 2 inputs",
                self.file_limit
            )));
        }
        if !(self.memory_threshold > 0.0 && self.memory_threshold <= 1.0) {
            return Err(Error::Config(format!(
                "memory_threshold {} outside (0, 1]",
                self.memory_threshold
            )));
        }
        Ok(())
    }
}
