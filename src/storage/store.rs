use crate::error::LogError;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Width of the length prefix in front of every payload.
pub const LEN_WIDTH: u64 = 8;

/// A Store is the append-only file holding record payloads.
///
/// ## On-disk format:
/// File name: `<base_offset>.store`
///
/// ```text
/// | length: u64 (BE) | payload: [u8; length] | length | payload | ...
/// ```
///
/// A record's position is the byte offset of its length prefix. Frames
/// carry no offset and no checksum; the paired index maps offsets to
/// positions.
///
/// ## Buffering:
/// Appends go through a `BufWriter`. Every read flushes it first, so a
/// record is readable as soon as `append` returns.
///
/// ## Thread safety:
/// The writer and the read handle sit behind one mutex, so a Store can be
/// read through `&self` from several threads and shared with log readers.
pub struct Store {
    path: PathBuf,

    /// Bytes in the file plus bytes still buffered.
    size: AtomicU64,

    inner: Mutex<StoreInner>,
}

struct StoreInner {
    writer: BufWriter<File>,
    reader: File,
    closed: bool,
}

impl Store {
    /// Open or create a store file.
    ///
    /// The current file length becomes the next append position, including
    /// any unindexed tail left by an interrupted append.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LogError> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let reader = OpenOptions::new().read(true).open(&path)?;
        let size = file.metadata()?.len();

        Ok(Store {
            path,
            size: AtomicU64::new(size),
            inner: Mutex::new(StoreInner {
                writer: BufWriter::new(file),
                reader,
                closed: false,
            }),
        })
    }

    /// Append one length-prefixed payload.
    ///
    /// # Returns
    /// `(bytes_written, position)` where position is the frame start.
    ///
    /// # Errors
    /// - I/O errors from the writer; the size is re-read so the next
    ///   frame still lands at the true end of the file
    /// - `Closed` after `close`
    pub fn append(&self, payload: &[u8]) -> Result<(u64, u64), LogError> {
        let mut inner = self.lock()?;
        if inner.closed {
            return Err(LogError::Closed);
        }

        let position = self.size.load(Ordering::Acquire);
        let written = LEN_WIDTH + payload.len() as u64;

        let result = inner
            .writer
            .write_all(&(payload.len() as u64).to_be_bytes())
            .and_then(|()| inner.writer.write_all(payload));

        if let Err(e) = result {
            let on_disk = inner.writer.get_ref().metadata()?.len();
            let buffered = inner.writer.buffer().len() as u64;
            self.size.store(on_disk + buffered, Ordering::Release);
            return Err(e.into());
        }

        self.size.store(position + written, Ordering::Release);
        Ok((written, position))
    }

    /// Read the payload of the frame starting at `position`.
    ///
    /// # Errors
    /// - `UnexpectedEof` I/O error for a truncated prefix or a length that
    ///   runs past the end of the file
    /// - `Closed` after `close`
    pub fn read(&self, position: u64) -> Result<Vec<u8>, LogError> {
        let mut guard = self.lock()?;
        let inner = &mut *guard;
        if inner.closed {
            return Err(LogError::Closed);
        }
        inner.writer.flush()?;

        let mut len_buf = [0u8; LEN_WIDTH as usize];
        inner.reader.seek(SeekFrom::Start(position))?;
        inner.reader.read_exact(&mut len_buf)?;
        let len = u64::from_be_bytes(len_buf);

        let end = position
            .checked_add(LEN_WIDTH)
            .and_then(|p| p.checked_add(len));
        match end {
            Some(end) if end <= self.size() => {}
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("frame at {} with length {} runs past end of store", position, len),
                )
                .into())
            }
        }

        let mut payload = vec![0u8; len as usize];
        inner.reader.read_exact(&mut payload)?;

        Ok(payload)
    }

    /// End position of the frame starting at `position`.
    ///
    /// `None` if the length prefix or the payload is not entirely inside
    /// the store, as after a crash that cut a buffered frame short.
    pub fn frame_end(&self, position: u64) -> Result<Option<u64>, LogError> {
        let mut guard = self.lock()?;
        let inner = &mut *guard;
        if inner.closed {
            return Err(LogError::Closed);
        }
        inner.writer.flush()?;

        let size = self.size();
        match position.checked_add(LEN_WIDTH) {
            Some(prefix_end) if prefix_end <= size => {}
            _ => return Ok(None),
        }

        let mut len_buf = [0u8; LEN_WIDTH as usize];
        inner.reader.seek(SeekFrom::Start(position))?;
        inner.reader.read_exact(&mut len_buf)?;
        let len = u64::from_be_bytes(len_buf);

        Ok(position
            .checked_add(LEN_WIDTH)
            .and_then(|p| p.checked_add(len))
            .filter(|&end| end <= size))
    }

    /// Copy raw file bytes starting at `offset` into `buf`.
    ///
    /// Returns 0 at end of file.
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize, LogError> {
        let mut guard = self.lock()?;
        let inner = &mut *guard;
        if inner.closed {
            return Err(LogError::Closed);
        }
        inner.writer.flush()?;

        let size = self.size();
        if offset >= size || buf.is_empty() {
            return Ok(0);
        }

        let n = (buf.len() as u64).min(size - offset) as usize;
        inner.reader.seek(SeekFrom::Start(offset))?;
        Ok(inner.reader.read(&mut buf[..n])?)
    }

    /// Store size in bytes, buffered bytes included.
    pub fn size(&self) -> u64 {
        self.size.load(Ordering::Acquire)
    }

    /// Path of the backing file.
    pub fn name(&self) -> &Path {
        &self.path
    }

    /// Flush buffered frames and sync. Later calls do nothing.
    pub fn close(&self) -> Result<(), LogError> {
        let mut inner = self.lock()?;
        if inner.closed {
            return Ok(());
        }

        inner.writer.flush()?;
        inner.writer.get_ref().sync_all()?;
        inner.closed = true;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreInner>, LogError> {
        self.inner.lock().map_err(|_| LogError::LockPoisoned)
    }
}
