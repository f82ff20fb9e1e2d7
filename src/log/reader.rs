use crate::storage::store::Store;
use std::io::{self, Read};
use std::sync::Arc;

/// Raw byte stream over every store of a log, oldest segment first.
///
/// Yields the store files exactly as written: 8-byte big-endian length
/// prefixes followed by payloads. Bytes are read lazily from the stores as
/// the stream is consumed. Each call to [`crate::log::Log::reader`] starts
/// a fresh stream from the lowest retained segment.
///
/// The set of segments is fixed when the reader is created. A segment
/// removed afterwards by truncation fails the read with an error.
pub struct LogReader {
    stores: Vec<Arc<Store>>,
    current: usize,
    position: u64,
}

impl LogReader {
    pub(crate) fn new(stores: Vec<Arc<Store>>) -> Self {
        Self {
            stores,
            current: 0,
            position: 0,
        }
    }
}

impl Read for LogReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        while let Some(store) = self.stores.get(self.current) {
            let n = store.read_at(buf, self.position)?;
            if n > 0 {
                self.position += n as u64;
                return Ok(n);
            }
            self.current += 1;
            self.position = 0;
        }

        Ok(0)
    }
}
