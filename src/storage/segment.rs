use crate::config::SegmentConfig;
use crate::error::LogError;
use crate::storage::index::Index;
use crate::storage::store::Store;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const STORE_EXTENSION: &str = "store";
pub const INDEX_EXTENSION: &str = "index";

/// File name of a segment file: base offset zero-padded to 20 digits.
pub fn segment_file_name(base_offset: u64, extension: &str) -> String {
    format!("{:020}.{}", base_offset, extension)
}

/// A Segment pairs one Store and one Index sharing a base offset.
///
/// Responsibilities:
/// - Assign monotonically increasing absolute offsets
/// - Write each payload to the store and its position to the index
/// - Resolve absolute offsets back to payloads
/// - Report when it is full so the log can roll a new segment
///
/// NOT responsible for:
/// - Choosing which segment is active (Log)
/// - Locking (the Log serializes appends through &mut self)
///
/// ## On-disk layout:
/// ```text
/// 00000000000000000016.store
/// 00000000000000000016.index
/// ```
///
/// ## Offsets:
/// `next_offset = base_offset + index entries`. The index is authoritative:
/// store bytes past the last indexed frame (an append interrupted between
/// the two writes) are never referenced. New frames go after them.
pub struct Segment {
    /// Absolute offset of the first record. Encoded in both file names.
    base_offset: u64,

    /// Offset the next append will receive.
    next_offset: u64,

    /// Shared with log readers streaming raw store bytes.
    store: Arc<Store>,

    index: Index,

    config: SegmentConfig,
}

impl Segment {
    /// Open or create the segment files for `base_offset` in `dir`.
    ///
    /// Index entries are checked against the store before `next_offset` is
    /// derived, and the index is cut at the first entry that fails. Such
    /// entries come from a shutdown that skipped `close`: zero padding, an
    /// entry whose buffered frame never fully reached the store, or stale
    /// entries from an earlier crashed run.
    ///
    /// # Errors
    /// - I/O errors opening either file
    /// - `CorruptIndex` if the index size is not a whole number of entries
    pub fn open(
        dir: impl AsRef<Path>,
        base_offset: u64,
        config: SegmentConfig,
    ) -> Result<Self, LogError> {
        let dir = dir.as_ref();

        let store = Store::open(dir.join(segment_file_name(base_offset, STORE_EXTENSION)))?;
        let mut index = Index::open(
            dir.join(segment_file_name(base_offset, INDEX_EXTENSION)),
            config.max_index_bytes,
        )?;

        let valid = valid_entries(&index, &store)?;
        if valid < index.entries() {
            tracing::warn!(
                base_offset,
                kept = valid,
                dropped = index.entries() - valid,
                store_size = store.size(),
                "dropping index entries without a complete frame"
            );
            index.truncate_entries(valid);
        }

        let next_offset = match index.read(-1) {
            Ok((relative_offset, _)) => base_offset + u64::from(relative_offset) + 1,
            Err(LogError::EndOfIndex) => base_offset,
            Err(e) => return Err(e),
        };

        tracing::debug!(base_offset, next_offset, "opened segment");

        Ok(Segment {
            base_offset,
            next_offset,
            store: Arc::new(store),
            index,
            config,
        })
    }

    /// Append a payload and return its absolute offset.
    ///
    /// Write path:
    /// 1. relative offset = next_offset - base_offset
    /// 2. store append → position
    /// 3. index write (relative offset, position)
    /// 4. next_offset += 1
    ///
    /// `next_offset` only moves once both writes succeed. If the index
    /// write fails, the store keeps an unindexed frame that is never read.
    ///
    /// # Errors
    /// - `SegmentFull` if the segment is already maxed
    /// - `IndexFull` if the relative offset does not fit in 32 bits
    /// - I/O errors from either write
    pub fn append(&mut self, payload: &[u8]) -> Result<u64, LogError> {
        if self.is_maxed() {
            return Err(LogError::SegmentFull(self.base_offset));
        }

        let relative_offset =
            u32::try_from(self.next_offset - self.base_offset).map_err(|_| {
                LogError::IndexFull {
                    capacity: self.index.capacity(),
                }
            })?;

        let (_, position) = self.store.append(payload)?;
        self.index.write(relative_offset, position)?;
        self.next_offset += 1;

        Ok(self.base_offset + u64::from(relative_offset))
    }

    /// Read the payload stored at an absolute offset.
    ///
    /// # Errors
    /// - `EndOfIndex` if the offset is outside `[base_offset, next_offset)`
    /// - I/O errors reading the store
    pub fn read(&self, offset: u64) -> Result<Vec<u8>, LogError> {
        if !self.contains(offset) {
            return Err(LogError::EndOfIndex);
        }

        let relative_offset =
            i64::try_from(offset - self.base_offset).map_err(|_| LogError::EndOfIndex)?;
        let (_, position) = self.index.read(relative_offset)?;

        self.store.read(position)
    }

    /// True once the store reached its byte limit or the index has no room
    /// for another entry.
    pub fn is_maxed(&self) -> bool {
        self.store.size() >= self.config.max_store_bytes || self.index.is_full()
    }

    /// True if `offset` was assigned by this segment.
    pub fn contains(&self, offset: u64) -> bool {
        self.base_offset <= offset && offset < self.next_offset
    }

    pub fn base_offset(&self) -> u64 {
        self.base_offset
    }

    pub fn next_offset(&self) -> u64 {
        self.next_offset
    }

    /// Number of records in this segment.
    pub fn record_count(&self) -> u64 {
        self.next_offset - self.base_offset
    }

    /// Store size in bytes.
    pub fn size(&self) -> u64 {
        self.store.size()
    }

    pub fn store_path(&self) -> &Path {
        self.store.name()
    }

    pub fn index_path(&self) -> &Path {
        self.index.name()
    }

    pub(crate) fn store_handle(&self) -> Arc<Store> {
        Arc::clone(&self.store)
    }

    /// Close the index (shrinking it to its entries), then the store.
    pub fn close(&mut self) -> Result<(), LogError> {
        self.index.close()?;
        self.store.close()
    }

    /// Close the segment and delete both files.
    pub fn remove(mut self) -> Result<(), LogError> {
        self.close()?;

        let store_path: PathBuf = self.store.name().to_path_buf();
        let index_path: PathBuf = self.index.name().to_path_buf();
        fs::remove_file(&store_path)?;
        fs::remove_file(&index_path)?;

        tracing::debug!(base_offset = self.base_offset, "removed segment");
        Ok(())
    }
}

/// Number of leading index entries backed by complete store frames.
///
/// Entry `k` is valid if its frame lies entirely inside the store and
/// starts at or after the end of entry `k - 1`'s frame. Gaps are allowed:
/// an append whose index write failed leaves unindexed bytes in between.
fn valid_entries(index: &Index, store: &Store) -> Result<u64, LogError> {
    let mut previous_end = 0;
    for entry in 0..index.entries() {
        let relative_offset = i64::try_from(entry).map_err(|_| LogError::EndOfIndex)?;
        let (_, position) = index.read(relative_offset)?;
        if position < previous_end {
            return Ok(entry);
        }
        match store.frame_end(position)? {
            Some(end) => previous_end = end,
            None => return Ok(entry),
        }
    }
    Ok(index.entries())
}
