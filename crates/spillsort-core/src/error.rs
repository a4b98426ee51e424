use thiserror::Error;

/// Canonical result for the sorter stack.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("record codec: {0}")]
    Codec(#[from] serde_json::Error),

    // A run file that cannot be trusted: bad magic, truncated frames,
    // or a checksum mismatch. Never retried.
    #[error("corrupt run file: {0}")]
    Corrupt(String),

    #[error("protocol violation: {0}")]
    Protocol(String),
}
