use std::path::PathBuf;

/// Commit log errors.
///
/// `EndOfIndex` belongs to the index layer; the log reports missing
/// offsets as `OffsetNotFound`.
#[derive(thiserror::Error, Debug)]
pub enum LogError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("offset not found: {0}")]
    OffsetNotFound(u64),

    #[error("index full: capacity {capacity} bytes")]
    IndexFull { capacity: u64 },

    #[error("end of index")]
    EndOfIndex,

    #[error("segment full: base offset {0}")]
    SegmentFull(u64),

    #[error("corrupt index {path:?}: size {size} is not a multiple of the entry width")]
    CorruptIndex { path: PathBuf, size: u64 },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("lock poisoned")]
    LockPoisoned,

    #[error("file already closed")]
    Closed,
}

impl LogError {
    /// True for the conditions a caller may treat as "no such record".
    pub fn is_not_found(&self) -> bool {
        matches!(self, LogError::OffsetNotFound(_) | LogError::EndOfIndex)
    }
}

impl From<LogError> for std::io::Error {
    fn from(err: LogError) -> Self {
        match err {
            LogError::Io(e) => e,
            other => std::io::Error::new(std::io::ErrorKind::Other, other),
        }
    }
}
