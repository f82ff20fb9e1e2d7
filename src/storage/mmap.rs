use std::fs::File;
use std::io;

/// A writable, fixed-length memory-mapped region of a file.
///
/// # Purpose
/// Backs the offset index. The index file is pre-grown to its full
/// capacity before mapping, so the region never needs to grow while it
/// is alive.
///
/// # Ownership & Lifetime Rules
/// - The region is OWNED by the Index (never exposed to callers)
/// - The file length must not change while the region is mapped
/// - The region must be dropped before the file is truncated
///
/// # Safety Invariants (MUST HOLD)
/// 1. File size is FIXED for the lifetime of the mapping
/// 2. No other process writes the file while it is mapped
/// 3. Every access is bounds checked by the slice API
///
/// # Drop Safety
/// `memmap2::MmapMut` unmaps on drop. Call [`MmapRegion::flush`] first if
/// the dirty pages must reach the file.
#[derive(Debug)]
pub struct MmapRegion {
    mmap: memmap2::MmapMut,
}

impl MmapRegion {
    /// Map the whole current length of `file` read/write.
    ///
    /// # Errors
    /// - File has zero length (nothing to map)
    /// - OS mmap call fails (permissions, limits, etc.)
    pub fn open_mut(file: &File) -> io::Result<Self> {
        let len = file.metadata()?.len();

        if len == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot mmap empty file",
            ));
        }

        // SAFETY: the Index owns `file` exclusively, only resizes it after
        // this region is dropped, and the log directory is not shared with
        // another writer.
        let mmap = unsafe { memmap2::MmapMut::map_mut(file)? };

        Ok(MmapRegion { mmap })
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.mmap
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.mmap
    }

    /// Length of the mapping in bytes (the file size at map time).
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Synchronously write dirty pages back to the file.
    pub fn flush(&self) -> io::Result<()> {
        self.mmap.flush()
    }
}
