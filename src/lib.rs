//! A segmented, append-only commit log.
//!
//! Records are opaque byte payloads addressed by monotonically increasing
//! offsets. Each segment pairs a store file of length-prefixed payloads
//! with a memory-mapped index of fixed 12-byte entries, so an offset is
//! resolved to its byte position by arithmetic alone.
//!
//! ```no_run
//! use commitlog::config::Config;
//! use commitlog::log::Log;
//!
//! # fn main() -> Result<(), commitlog::error::LogError> {
//! let log = Log::open("/var/lib/app/log", Config::default())?;
//! let offset = log.append(b"hello")?;
//! assert_eq!(log.read(offset)?.value, b"hello");
//! log.close()?;
//! # Ok(())
//! # }
//! ```
pub mod config;
pub mod error;
pub mod log;
pub mod metrics;
pub mod storage;
