use std::io;

/// Errors from note storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The note path contains a traversal token or a path separator.
    #[error("invalid note path: {0:?}")]
    InvalidPath(String),

    /// Accepting the write would push total usage past the storage ceiling.
    #[error("storage full: write needs {needed} more bytes, ceiling is {ceiling}")]
    StorageFull { needed: i64, ceiling: i64 },

    /// A single note exceeds the per-note content cap.
    #[error("content too large: {size} bytes, cap is {max}")]
    ContentTooLarge { size: u64, max: u64 },

    /// I/O error from the underlying filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Version-log backend failure. Swallowed at the save boundary: history
    /// is best-effort and never rolls back a successful content write.
    #[error("history error: {0}")]
    History(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
