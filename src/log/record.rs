use crate::error::LogError;

/// A record read back from a log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    /// Opaque payload bytes.
    pub value: Vec<u8>,
    /// Offset assigned when the record was appended.
    pub offset: u64,
}

/// The record-access contract a serving layer depends on.
///
/// - `append` assigns the next offset and only fails on fatal I/O
/// - `read` fails with `OffsetNotFound` for any offset the log does not
///   hold
pub trait RecordLog: Send + Sync {
    fn append(&self, value: &[u8]) -> Result<u64, LogError>;

    fn read(&self, offset: u64) -> Result<Record, LogError>;
}
