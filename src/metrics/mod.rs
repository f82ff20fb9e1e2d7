/// Per-log counters and latency histograms.
///
/// Each `Log` owns one `LogMetrics`; nothing here is global.
pub mod histogram;
pub mod registry;
