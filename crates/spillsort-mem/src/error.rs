use thiserror::Error;

/// Result type local to spillsort-mem.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("memory monitoring is not supported: {0}")]
    Unsupported(String),

    #[error("threshold fraction {0} outside (0, 1]")]
    Threshold(f64),
}
