/// Integration tests for the segmented log.
///
/// These tests drive the public API only:
/// - Offset assignment and read-back
/// - Segment rotation when a segment is maxed
/// - Reopening a log from its directory
/// - Raw byte export through the log reader
/// - Concurrent appends and reads through a shared handle
use commitlog::config::Config;
use commitlog::error::LogError;
use commitlog::log::record::{Record, RecordLog};
use commitlog::log::Log;
use std::io::Read;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

/// Index room for exactly `n` entries.
fn index_bytes(n: u64) -> u64 {
    n * 12
}

/// Split raw store bytes back into payloads.
fn decode_frames(bytes: &[u8]) -> Vec<Vec<u8>> {
    let mut frames = Vec::new();
    let mut cursor = 0;
    while cursor < bytes.len() {
        let mut len = [0u8; 8];
        len.copy_from_slice(&bytes[cursor..cursor + 8]);
        let len = u64::from_be_bytes(len) as usize;
        cursor += 8;
        frames.push(bytes[cursor..cursor + len].to_vec());
        cursor += len;
    }
    frames
}

#[test]
fn test_append_assigns_sequential_offsets_from_initial() {
    let dir = TempDir::new().unwrap();
    let log = Log::open(dir.path(), Config::with_segment(1024, 1024, 16)).unwrap();

    for k in 0..10u64 {
        assert_eq!(log.append(b"hello world").unwrap(), 16 + k);
    }

    assert_eq!(log.lowest_offset().unwrap(), 16);
    assert_eq!(log.highest_offset().unwrap(), Some(25));
}

#[test]
fn test_read_returns_appended_record() {
    let dir = TempDir::new().unwrap();
    let log = Log::open(dir.path(), Config::default()).unwrap();

    log.append(b"Hello, world 1").unwrap();
    let offset = log.append(b"Hello, world 2").unwrap();
    log.append(b"Hello, world 3").unwrap();

    assert_eq!(
        log.read(offset).unwrap(),
        Record {
            value: b"Hello, world 2".to_vec(),
            offset: 1,
        }
    );
}

#[test]
fn test_read_on_empty_log_is_not_found() {
    let dir = TempDir::new().unwrap();
    let log = Log::open(dir.path(), Config::default()).unwrap();

    let err = log.read(0).unwrap_err();
    assert!(matches!(err, LogError::OffsetNotFound(0)));
    assert!(err.is_not_found());
}

#[test]
fn test_read_past_highest_offset_is_not_found() {
    let dir = TempDir::new().unwrap();
    let log = Log::open(dir.path(), Config::with_segment(1024, index_bytes(3), 0)).unwrap();

    for _ in 0..5 {
        log.append(b"record").unwrap();
    }

    assert!(matches!(log.read(5), Err(LogError::OffsetNotFound(5))));
    assert!(matches!(log.read(u64::MAX), Err(LogError::OffsetNotFound(_))));
}

#[test]
fn test_read_below_lowest_offset_is_not_found() {
    let dir = TempDir::new().unwrap();
    let log = Log::open(dir.path(), Config::with_segment(1024, 1024, 16)).unwrap();
    log.append(b"record").unwrap();

    assert!(matches!(log.read(15), Err(LogError::OffsetNotFound(15))));
}

#[test]
fn test_maxed_index_rolls_new_segment_at_next_offset() {
    let dir = TempDir::new().unwrap();
    let log = Log::open(dir.path(), Config::with_segment(1024, index_bytes(3), 0)).unwrap();

    for k in 0..7u64 {
        assert_eq!(log.append(format!("record-{}", k).as_bytes()).unwrap(), k);
    }

    // [0, 3) [3, 6) [6, 7)
    assert_eq!(log.segment_count().unwrap(), 3);
    for base in [0u64, 3, 6] {
        assert!(dir.path().join(format!("{:020}.store", base)).exists());
        assert!(dir.path().join(format!("{:020}.index", base)).exists());
    }

    for k in 0..7u64 {
        assert_eq!(log.read(k).unwrap().value, format!("record-{}", k).as_bytes());
    }
    assert_eq!(log.metrics().snapshot().segments_rolled_total, 2);
}

#[test]
fn test_maxed_store_rolls_new_segment() {
    let dir = TempDir::new().unwrap();
    // "hello world" frames are 19 bytes; two fill the store.
    let log = Log::open(dir.path(), Config::with_segment(38, 1024, 0)).unwrap();

    log.append(b"hello world").unwrap();
    assert_eq!(log.segment_count().unwrap(), 1);
    log.append(b"hello world").unwrap();
    assert_eq!(log.segment_count().unwrap(), 2);

    assert_eq!(log.append(b"hello world").unwrap(), 2);
    assert!(dir.path().join(format!("{:020}.store", 2)).exists());
}

#[test]
fn test_failed_roll_keeps_append_and_retries() {
    let dir = TempDir::new().unwrap();
    let log = Log::open(dir.path(), Config::with_segment(1024, index_bytes(2), 0)).unwrap();
    assert_eq!(log.append(b"a").unwrap(), 0);

    // A directory where the next store file belongs makes the roll fail.
    let blocker = dir.path().join(format!("{:020}.store", 2));
    std::fs::create_dir(&blocker).unwrap();

    assert_eq!(log.append(b"b").unwrap(), 1);
    assert_eq!(log.segment_count().unwrap(), 1);
    assert_eq!(log.read(1).unwrap().value, b"b");
    assert_eq!(log.metrics().snapshot().segments_rolled_total, 0);

    // Still blocked: the deferred roll fails before anything is written.
    assert!(log.append(b"c").is_err());
    assert_eq!(log.highest_offset().unwrap(), Some(1));

    std::fs::remove_dir(&blocker).unwrap();

    assert_eq!(log.append(b"c").unwrap(), 2);
    assert_eq!(log.segment_count().unwrap(), 2);
    assert!(blocker.is_file());
    assert_eq!(log.read(2).unwrap().value, b"c");
    assert_eq!(log.metrics().snapshot().segments_rolled_total, 1);
}

#[test]
fn test_reopen_recovers_segments_and_offsets() {
    let dir = TempDir::new().unwrap();
    let config = Config::with_segment(1024, index_bytes(3), 0);

    {
        let log = Log::open(dir.path(), config.clone()).unwrap();
        for k in 0..5u64 {
            log.append(format!("record-{}", k).as_bytes()).unwrap();
        }
        log.close().unwrap();
    }

    let log = Log::open(dir.path(), config).unwrap();
    assert_eq!(log.segment_count().unwrap(), 2);
    assert_eq!(log.lowest_offset().unwrap(), 0);
    assert_eq!(log.highest_offset().unwrap(), Some(4));

    for k in 0..5u64 {
        assert_eq!(log.read(k).unwrap().value, format!("record-{}", k).as_bytes());
    }
    assert_eq!(log.append(b"record-5").unwrap(), 5);
}

#[test]
fn test_reopen_with_full_last_segment_rolls_immediately() {
    let dir = TempDir::new().unwrap();

    {
        let log = Log::open(dir.path(), Config::with_segment(1024, index_bytes(3), 0)).unwrap();
        log.append(b"a").unwrap();
        log.append(b"b").unwrap();
        log.close().unwrap();
    }

    // A smaller index limit makes the reopened segment full.
    let log = Log::open(dir.path(), Config::with_segment(1024, index_bytes(2), 0)).unwrap();
    assert_eq!(log.segment_count().unwrap(), 2);
    assert_eq!(log.append(b"c").unwrap(), 2);
    assert_eq!(log.read(0).unwrap().value, b"a");
    assert_eq!(log.read(2).unwrap().value, b"c");
}

#[test]
fn test_reader_streams_all_segments_in_order() {
    let dir = TempDir::new().unwrap();
    let log = Log::open(dir.path(), Config::with_segment(1024, index_bytes(2), 0)).unwrap();

    log.append(b"A").unwrap();
    log.append(b"B").unwrap();
    log.append(b"C").unwrap();
    assert_eq!(log.segment_count().unwrap(), 2);

    let mut first = Vec::new();
    log.reader().unwrap().read_to_end(&mut first).unwrap();
    assert_eq!(
        decode_frames(&first),
        vec![b"A".to_vec(), b"B".to_vec(), b"C".to_vec()]
    );

    let mut second = Vec::new();
    log.reader().unwrap().read_to_end(&mut second).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_reader_on_empty_log_is_empty() {
    let dir = TempDir::new().unwrap();
    let log = Log::open(dir.path(), Config::default()).unwrap();

    let mut bytes = Vec::new();
    log.reader().unwrap().read_to_end(&mut bytes).unwrap();
    assert!(bytes.is_empty());
}

#[test]
fn test_reader_small_buffer_crosses_segments() {
    let dir = TempDir::new().unwrap();
    let log = Log::open(dir.path(), Config::with_segment(1024, index_bytes(1), 0)).unwrap();

    let payloads: Vec<Vec<u8>> = (0..4).map(|k| vec![k as u8; 5 + k]).collect();
    for payload in &payloads {
        log.append(payload).unwrap();
    }

    let mut reader = log.reader().unwrap();
    let mut bytes = Vec::new();
    let mut buf = [0u8; 3];
    loop {
        let n = reader.read(&mut buf).unwrap();
        if n == 0 {
            break;
        }
        bytes.extend_from_slice(&buf[..n]);
    }

    assert_eq!(decode_frames(&bytes), payloads);
}

#[test]
fn test_log_serves_record_log_contract() {
    let dir = TempDir::new().unwrap();
    let log: Box<dyn RecordLog> =
        Box::new(Log::open(dir.path(), Config::default()).unwrap());

    assert_eq!(log.append(b"via trait").unwrap(), 0);
    assert_eq!(log.read(0).unwrap().value, b"via trait");
    assert!(log.read(1).unwrap_err().is_not_found());
}

#[test]
fn test_concurrent_appends_and_reads() {
    let dir = TempDir::new().unwrap();
    let log = Arc::new(Log::open(dir.path(), Config::with_segment(4096, index_bytes(16), 0)).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let log = Arc::clone(&log);
            thread::spawn(move || {
                let mut written = Vec::new();
                for i in 0..50 {
                    let value = format!("thread-{}-record-{}", t, i).into_bytes();
                    let offset = log.append(&value).unwrap();
                    assert_eq!(log.read(offset).unwrap().value, value);
                    written.push((offset, value));
                }
                written
            })
        })
        .collect();

    let mut all: Vec<(u64, Vec<u8>)> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    all.sort_by_key(|(offset, _)| *offset);

    let offsets: Vec<u64> = all.iter().map(|(offset, _)| *offset).collect();
    assert_eq!(offsets, (0..200).collect::<Vec<u64>>());

    for (offset, value) in all {
        assert_eq!(log.read(offset).unwrap().value, value);
    }
}
