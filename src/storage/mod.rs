/// Storage layer for the commit log.
///
/// - Store: append-only file of length-prefixed payloads
/// - Index: offset → byte position mapping over a fixed-size mmap
/// - Mmap: writable fixed-length mapping backing the index
/// - Segment: one store + one index sharing a base offset
pub mod index;
pub mod mmap;
pub mod segment;
pub mod store;
