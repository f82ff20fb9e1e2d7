use crate::error::LogError;
use crate::log::record::{Record, RecordLog};
use std::sync::Mutex;

/// In-memory log: the reference behavior for [`RecordLog`].
///
/// Offsets start at 0 and count up by one per append. Nothing is
/// persisted.
#[derive(Debug, Default)]
pub struct MemoryLog {
    records: Mutex<Vec<Record>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordLog for MemoryLog {
    fn append(&self, value: &[u8]) -> Result<u64, LogError> {
        let mut records = self.records.lock().map_err(|_| LogError::LockPoisoned)?;

        let offset = records.len() as u64;
        records.push(Record {
            value: value.to_vec(),
            offset,
        });

        Ok(offset)
    }

    fn read(&self, offset: u64) -> Result<Record, LogError> {
        let records = self.records.lock().map_err(|_| LogError::LockPoisoned)?;

        usize::try_from(offset)
            .ok()
            .and_then(|i| records.get(i))
            .cloned()
            .ok_or(LogError::OffsetNotFound(offset))
    }
}
