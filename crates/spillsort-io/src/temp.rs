//! Temporary-file provisioning for spilled runs.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use uuid::Uuid;

use spillsort_core::error::Result;

/// Hands out uniquely named files in one scratch directory.
///
/// The directory may be shared with other stages; uniqueness comes from
/// the generated filename. Every path provisioned here is covered by the
/// owner's deletion contract: callers remove files once consumed, and
/// `remove` is idempotent so cleanup paths can overlap.
#[derive(Debug, Clone)]
pub struct TempFileProvider {
    dir: PathBuf,
}

impl TempFileProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// A fresh uniquely named path; the file is created empty.
    pub fn provision(&self) -> Result<PathBuf> {
        let path = self.dir.join(format!("run-{}.run", Uuid::new_v4()));
        File::create(&path)?;
        Ok(path)
    }

    /// A fresh path pre-sized to `size_hint` bytes.
    ///
    /// The hint is advisory: it pre-reserves space to dodge fragmentation
    /// and late ENOSPC surprises, and a filesystem that refuses it is not
    /// an error. Writers truncate unused slack when they finish.
    pub fn provision_sized(&self, size_hint: u64) -> Result<PathBuf> {
        let path = self.provision()?;
        let file = OpenOptions::new().write(true).open(&path)?;
        let _ = file.set_len(size_hint);
        Ok(path)
    }

    /// Idempotent removal of a provisioned path.
    pub fn remove(&self, path: &Path) -> Result<()> {
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}
