//! The segmented commit log.
//!
//! A `Log` owns a directory of segments ordered by base offset. The last
//! segment is active and takes every append; earlier segments are sealed
//! and only read or removed.
//!
//! ```text
//! dir/
//!   00000000000000000000.store  00000000000000000000.index   sealed
//!   00000000000000000003.store  00000000000000000003.index   sealed
//!   00000000000000000006.store  00000000000000000006.index   active
//! ```

pub mod memory;
pub mod reader;
pub mod record;

use crate::config::Config;
use crate::error::LogError;
use crate::log::reader::LogReader;
use crate::log::record::{Record, RecordLog};
use crate::metrics::registry::LogMetrics;
use crate::storage::segment::{Segment, INDEX_EXTENSION, STORE_EXTENSION};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

/// What a truncation removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TruncateReport {
    pub segments_removed: u64,
    /// Store bytes of the removed segments.
    pub bytes_reclaimed: u64,
}

/// A durable, segmented, append-only log of records.
///
/// Responsibilities:
/// - Recover the segment table from the directory on open
/// - Route appends to the active segment and roll when it is maxed
/// - Route reads to the segment owning the offset
/// - Drop old segments on truncation
///
/// ## Locking:
/// One `RwLock` guards the segment list and with it the active segment.
/// `append`, `truncate` and `reset` hold it exclusively, so no reader ever
/// sees a list mid-rotation or mid-truncation. `read`, the offset queries
/// and `reader` share it.
///
/// ## Offsets:
/// Base offsets are strictly increasing and ranges never overlap. A rolled
/// segment starts at the previous active segment's `next_offset`.
pub struct Log {
    dir: PathBuf,
    config: Config,

    /// Ascending by base offset; the last one is active. Empty only after
    /// a failed reset.
    segments: RwLock<Vec<Segment>>,

    metrics: LogMetrics,
}

impl Log {
    /// Open the log stored in `dir`, creating the directory if needed.
    ///
    /// Recovery:
    /// 1. Scan `dir` for `<base>.store` / `<base>.index` files
    /// 2. Open one segment per base offset, ascending
    /// 3. With no segments, create one at `initial_offset`
    /// 4. If the last segment is already maxed, roll a new active one
    ///
    /// Files that do not look like segment files are ignored.
    ///
    /// # Errors
    /// - `InvalidConfig` for unusable segment limits
    /// - I/O and `CorruptIndex` errors from opening segments
    pub fn open(dir: impl AsRef<Path>, config: Config) -> Result<Self, LogError> {
        let config = config.normalized()?;
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let segments = load_segments(&dir, &config)?;

        tracing::info!(
            dir = ?dir,
            segments = segments.len(),
            lowest_offset = segments.first().map(Segment::base_offset),
            next_offset = segments.last().map(Segment::next_offset),
            "opened log"
        );

        Ok(Log {
            dir,
            config,
            segments: RwLock::new(segments),
            metrics: LogMetrics::new(),
        })
    }

    /// Append a record and return its offset.
    ///
    /// After the write, a maxed active segment is replaced by a new one
    /// starting at its `next_offset`. If creating that segment fails, the
    /// append still stands and the roll is retried on the next append.
    ///
    /// # Errors
    /// - I/O errors from the store or index
    /// - `Closed` if the log has no segments
    pub fn append(&self, value: &[u8]) -> Result<u64, LogError> {
        let start = Instant::now();
        let mut segments = self.write_segments()?;

        if segments.last().is_some_and(Segment::is_maxed) {
            self.roll(&mut segments)?;
        }

        let active = segments.last_mut().ok_or(LogError::Closed)?;
        let offset = active.append(value)?;

        if active.is_maxed() {
            if let Err(e) = self.roll(&mut segments) {
                tracing::warn!(error = %e, offset, "deferring segment roll");
            }
        }
        drop(segments);

        self.metrics
            .record_append(value.len() as u64, elapsed_nanos(start));
        Ok(offset)
    }

    /// Read the record at `offset`.
    ///
    /// # Errors
    /// - `OffsetNotFound` below the lowest offset, above the highest, or
    ///   inside a range removed by truncation
    /// - I/O errors from the store
    pub fn read(&self, offset: u64) -> Result<Record, LogError> {
        let start = Instant::now();
        let segments = self.read_segments()?;

        // First segment whose base is past `offset`; the owner precedes it.
        let owner = segments
            .partition_point(|s| s.base_offset() <= offset)
            .checked_sub(1)
            .map(|i| &segments[i])
            .filter(|s| s.contains(offset));

        let result = match owner {
            Some(segment) => segment.read(offset).map_err(|e| match e {
                LogError::EndOfIndex => LogError::OffsetNotFound(offset),
                other => other,
            }),
            None => Err(LogError::OffsetNotFound(offset)),
        };
        drop(segments);

        match result {
            Ok(value) => {
                self.metrics.record_read(elapsed_nanos(start));
                Ok(Record { value, offset })
            }
            Err(e) => {
                if e.is_not_found() {
                    self.metrics.inc_read_misses();
                }
                Err(e)
            }
        }
    }

    /// Base offset of the oldest retained segment.
    pub fn lowest_offset(&self) -> Result<u64, LogError> {
        let segments = self.read_segments()?;
        segments
            .first()
            .map(Segment::base_offset)
            .ok_or(LogError::Closed)
    }

    /// Offset of the last retained record, or `None` when the log retains
    /// no records.
    ///
    /// `None` covers both a log that was never appended to and one whose
    /// records were all truncated away, leaving only an empty active
    /// segment. In the second case the last assigned offset is
    /// `lowest_offset() - 1`, and the next append still receives
    /// `lowest_offset()`.
    pub fn highest_offset(&self) -> Result<Option<u64>, LogError> {
        let segments = self.read_segments()?;
        let (Some(first), Some(active)) = (segments.first(), segments.last()) else {
            return Err(LogError::Closed);
        };

        if active.next_offset() == first.base_offset() {
            Ok(None)
        } else {
            Ok(Some(active.next_offset() - 1))
        }
    }

    /// Remove every sealed segment whose records all lie below `lowest`.
    ///
    /// The active segment is kept even when it qualifies, so the log stays
    /// writable. Segments are ordered, so the removed ones are always a
    /// prefix of the list.
    ///
    /// # Errors
    /// - I/O errors deleting segment files; segments removed before the
    ///   failure stay removed
    pub fn truncate(&self, lowest: u64) -> Result<TruncateReport, LogError> {
        let mut segments = self.write_segments()?;
        let mut report = TruncateReport::default();

        while segments.len() > 1 && segments[0].next_offset() <= lowest {
            let segment = segments.remove(0);
            let bytes = segment.size();
            segment.remove()?;

            report.segments_removed += 1;
            report.bytes_reclaimed += bytes;
            self.metrics.record_removal(1, bytes);
        }

        tracing::info!(
            lowest,
            segments_removed = report.segments_removed,
            bytes_reclaimed = report.bytes_reclaimed,
            "truncated log"
        );

        Ok(report)
    }

    /// Stream the raw bytes of every store, oldest segment first.
    pub fn reader(&self) -> Result<LogReader, LogError> {
        let segments = self.read_segments()?;
        Ok(LogReader::new(
            segments.iter().map(Segment::store_handle).collect(),
        ))
    }

    /// Close every segment, oldest first.
    pub fn close(self) -> Result<(), LogError> {
        let mut segments = self
            .segments
            .into_inner()
            .map_err(|_| LogError::LockPoisoned)?;

        for segment in segments.iter_mut() {
            segment.close()?;
        }

        tracing::info!(dir = ?self.dir, "closed log");
        Ok(())
    }

    /// Close the log and delete its directory.
    pub fn remove(self) -> Result<(), LogError> {
        let dir = self.dir.clone();
        self.close()?;
        fs::remove_dir_all(&dir)?;

        tracing::info!(dir = ?dir, "removed log");
        Ok(())
    }

    /// Delete every segment and start over at `initial_offset`.
    ///
    /// Only segment files are deleted; other files in the directory stay.
    /// If a deletion fails the log is left without segments and every
    /// operation returns `Closed`.
    pub fn reset(&self) -> Result<(), LogError> {
        let mut segments = self.write_segments()?;

        for segment in segments.drain(..) {
            segment.remove()?;
        }

        fs::create_dir_all(&self.dir)?;
        segments.push(Segment::open(
            &self.dir,
            self.config.segment.initial_offset,
            self.config.segment,
        )?);

        tracing::info!(dir = ?self.dir, "reset log");
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The normalized configuration in effect.
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn segment_count(&self) -> Result<usize, LogError> {
        Ok(self.read_segments()?.len())
    }

    pub fn metrics(&self) -> &LogMetrics {
        &self.metrics
    }

    /// Add a new active segment after the current one.
    fn roll(&self, segments: &mut Vec<Segment>) -> Result<(), LogError> {
        let base_offset = segments
            .last()
            .map_or(self.config.segment.initial_offset, Segment::next_offset);

        segments.push(Segment::open(&self.dir, base_offset, self.config.segment)?);
        self.metrics.inc_segments_rolled();

        tracing::debug!(base_offset, "rolled new active segment");
        Ok(())
    }

    fn read_segments(&self) -> Result<RwLockReadGuard<'_, Vec<Segment>>, LogError> {
        self.segments.read().map_err(|_| LogError::LockPoisoned)
    }

    fn write_segments(&self) -> Result<RwLockWriteGuard<'_, Vec<Segment>>, LogError> {
        self.segments.write().map_err(|_| LogError::LockPoisoned)
    }
}

impl RecordLog for Log {
    fn append(&self, value: &[u8]) -> Result<u64, LogError> {
        Log::append(self, value)
    }

    fn read(&self, offset: u64) -> Result<Record, LogError> {
        Log::read(self, offset)
    }
}

/// Open every segment found in `dir`, or a fresh one if there are none.
fn load_segments(dir: &Path, config: &Config) -> Result<Vec<Segment>, LogError> {
    let mut base_offsets = BTreeSet::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        match parse_base_offset(&path) {
            Some(base_offset) => {
                base_offsets.insert(base_offset);
            }
            None => tracing::warn!(path = ?path, "ignoring file in log directory"),
        }
    }

    let mut segments = Vec::with_capacity(base_offsets.len() + 1);
    for base_offset in base_offsets {
        segments.push(Segment::open(dir, base_offset, config.segment)?);
    }

    if segments.is_empty() {
        segments.push(Segment::open(
            dir,
            config.segment.initial_offset,
            config.segment,
        )?);
    }

    let roll_at = segments
        .last()
        .filter(|s| s.is_maxed())
        .map(Segment::next_offset);
    if let Some(base_offset) = roll_at {
        tracing::debug!(base_offset, "last segment is full, rolling on open");
        segments.push(Segment::open(dir, base_offset, config.segment)?);
    }

    Ok(segments)
}

/// Base offset encoded in a segment file name, if `path` is one.
fn parse_base_offset(path: &Path) -> Option<u64> {
    let extension = path.extension()?.to_str()?;
    if extension != STORE_EXTENSION && extension != INDEX_EXTENSION {
        return None;
    }
    path.file_stem()?.to_str()?.parse().ok()
}

fn elapsed_nanos(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_nanos()).unwrap_or(u64::MAX)
}
