use crate::error::LogError;
use crate::storage::mmap::MmapRegion;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Width of the segment-relative offset field.
pub const OFFSET_WIDTH: u64 = 4;
/// Width of the store position field.
pub const POSITION_WIDTH: u64 = 8;
/// Width of one index entry on disk.
pub const ENTRY_WIDTH: u64 = OFFSET_WIDTH + POSITION_WIDTH;

/// An Index maps segment-relative offsets to byte positions in a store.
///
/// Purpose:
/// - O(1) offset lookup by arithmetic, no scanning
/// - The index is authoritative for how many records a segment holds
///
/// ## On-disk format:
/// File name: `<base_offset>.index`
///
/// Each entry is exactly 12 bytes:
/// ```text
/// | relative offset: u32 | position: u64 |
/// | 4 bytes (BE)         | 8 bytes (BE)  |
/// ```
///
/// Entry `k` always holds relative offset `k`: one entry per record,
/// written strictly in order, never overwritten.
///
/// ## Capacity vs used size:
/// While open, the file is grown to its full capacity and mapped once.
/// `size` counts the bytes holding real entries. `close` truncates the file
/// back to `size`, so a cleanly closed index occupies only its entries and
/// the file length alone restores the state on reopen.
///
/// ## Ownership:
/// - Index owns the file and the mapping exclusively
/// - Mutations require &mut self; the owning Segment serializes them
pub struct Index {
    path: PathBuf,

    /// None once closed.
    file: Option<File>,

    /// None once closed. Always dropped before `file` is resized.
    mmap: Option<MmapRegion>,

    /// Bytes of real entries. Always a multiple of ENTRY_WIDTH.
    size: u64,

    /// Mapped length. Always a multiple of ENTRY_WIDTH.
    capacity: u64,
}

impl Index {
    /// Open or create an index file.
    ///
    /// An existing nonzero file size is taken as the used size. The file
    /// is then grown to `max_index_bytes` (rounded down to whole entries)
    /// and mapped. An index that is already larger than that keeps its
    /// size as capacity; it is never shrunk.
    ///
    /// Zero-filled entries past the last real one are padding from a run
    /// that never reached `close`, and are not counted.
    ///
    /// # Errors
    /// - `CorruptIndex` if the file size is not a multiple of 12
    /// - `InvalidConfig` if the capacity cannot hold one entry
    /// - I/O errors from open, stat, grow or map
    pub fn open(path: impl AsRef<Path>, max_index_bytes: u64) -> Result<Self, LogError> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)?;

        let size = file.metadata()?.len();
        if size % ENTRY_WIDTH != 0 {
            return Err(LogError::CorruptIndex { path, size });
        }

        let capacity = (max_index_bytes - max_index_bytes % ENTRY_WIDTH).max(size);
        if capacity < ENTRY_WIDTH {
            return Err(LogError::InvalidConfig(format!(
                "index capacity {} cannot hold a single entry",
                max_index_bytes
            )));
        }

        file.set_len(capacity)?;
        let mmap = MmapRegion::open_mut(&file)?;

        let mut index = Index {
            path,
            file: Some(file),
            mmap: Some(mmap),
            size,
            capacity,
        };
        index.size = index.committed_entries(size / ENTRY_WIDTH) * ENTRY_WIDTH;

        Ok(index)
    }

    /// Append an entry after the last one.
    ///
    /// Not flushed here; `close` flushes the whole mapping.
    ///
    /// # Errors
    /// - `IndexFull` if no room is left in the mapping
    /// - `Closed` after `close`
    pub fn write(&mut self, relative_offset: u32, position: u64) -> Result<(), LogError> {
        let mmap = self.mmap.as_mut().ok_or(LogError::Closed)?;

        if self.size + ENTRY_WIDTH > self.capacity {
            return Err(LogError::IndexFull {
                capacity: self.capacity,
            });
        }

        let start = self.size as usize;
        let slot = &mut mmap.as_mut_slice()[start..start + ENTRY_WIDTH as usize];
        slot[..OFFSET_WIDTH as usize].copy_from_slice(&relative_offset.to_be_bytes());
        slot[OFFSET_WIDTH as usize..].copy_from_slice(&position.to_be_bytes());

        self.size += ENTRY_WIDTH;

        Ok(())
    }

    /// Read an entry.
    ///
    /// `-1` reads the last entry; any other argument is an entry number.
    ///
    /// ## Example:
    /// ```text
    /// entries: [(0, 0), (1, 10)]
    ///
    /// read(0)  → (0, 0)
    /// read(1)  → (1, 10)
    /// read(-1) → (1, 10)
    /// read(2)  → EndOfIndex
    /// ```
    ///
    /// # Errors
    /// - `EndOfIndex` if the index is empty or the entry does not exist
    /// - `Closed` after `close`
    pub fn read(&self, relative_offset: i64) -> Result<(u32, u64), LogError> {
        let mmap = self.mmap.as_ref().ok_or(LogError::Closed)?;

        if self.size == 0 {
            return Err(LogError::EndOfIndex);
        }

        let entries = self.entries();
        let entry = if relative_offset == -1 {
            entries - 1
        } else {
            u64::try_from(relative_offset).map_err(|_| LogError::EndOfIndex)?
        };

        if entry >= entries {
            return Err(LogError::EndOfIndex);
        }

        Ok(decode_entry(mmap.as_slice(), entry))
    }

    /// Path of the backing file.
    pub fn name(&self) -> &Path {
        &self.path
    }

    /// Bytes of real entries.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn entries(&self) -> u64 {
        self.size / ENTRY_WIDTH
    }

    /// True when another `write` would fail with `IndexFull`.
    pub fn is_full(&self) -> bool {
        self.size + ENTRY_WIDTH > self.capacity
    }

    /// Forget every entry from `entries` onward.
    ///
    /// Used by segment recovery only. The bytes stay in the mapping and are
    /// overwritten by later writes.
    pub(crate) fn truncate_entries(&mut self, entries: u64) {
        self.size = self.size.min(entries * ENTRY_WIDTH);
    }

    /// Flush, unmap and shrink the file to its used size.
    ///
    /// Safe to call more than once; later calls do nothing.
    pub fn close(&mut self) -> Result<(), LogError> {
        let (Some(mmap), Some(file)) = (self.mmap.take(), self.file.take()) else {
            return Ok(());
        };

        mmap.flush()?;
        file.sync_all()?;

        // Unmap before resizing the file underneath it.
        drop(mmap);

        file.set_len(self.size)?;
        file.sync_all()?;

        Ok(())
    }

    /// Count entries that were really written, out of `trusted` entries.
    ///
    /// Entry `k` holds relative offset `k`, so a trailing entry with any
    /// other value is zero padding. Entry 0 cannot be told apart from
    /// padding here; the segment checks it against its store.
    fn committed_entries(&self, trusted: u64) -> u64 {
        let Some(mmap) = self.mmap.as_ref() else {
            return 0;
        };

        let mut entries = trusted;
        while entries > 1 {
            let (relative_offset, _) = decode_entry(mmap.as_slice(), entries - 1);
            if u64::from(relative_offset) == entries - 1 {
                break;
            }
            entries -= 1;
        }
        entries
    }
}

impl Drop for Index {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(path = ?self.path, error = %e, "failed to close index on drop");
        }
    }
}

/// Decode entry number `entry` from the mapped bytes.
fn decode_entry(data: &[u8], entry: u64) -> (u32, u64) {
    let start = (entry * ENTRY_WIDTH) as usize;
    let mid = start + OFFSET_WIDTH as usize;
    let end = start + ENTRY_WIDTH as usize;

    let mut offset = [0u8; OFFSET_WIDTH as usize];
    offset.copy_from_slice(&data[start..mid]);
    let mut position = [0u8; POSITION_WIDTH as usize];
    position.copy_from_slice(&data[mid..end]);

    (u32::from_be_bytes(offset), u64::from_be_bytes(position))
}
