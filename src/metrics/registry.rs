use super::histogram::Histogram;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for one log instance.
///
/// Counters are monotonically increasing atomics updated with
/// `Ordering::Relaxed`; they are approximate across threads and never
/// synchronize anything else.
#[derive(Default)]
pub struct LogMetrics {
    records_appended_total: AtomicU64,
    bytes_appended_total: AtomicU64,
    reads_total: AtomicU64,
    read_misses_total: AtomicU64,
    segments_rolled_total: AtomicU64,
    segments_removed_total: AtomicU64,
    bytes_reclaimed_total: AtomicU64,

    append_latency_ns: Histogram,
    read_latency_ns: Histogram,
}

impl LogMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called after every successful append.
    #[inline]
    pub fn record_append(&self, payload_bytes: u64, nanos: u64) {
        self.records_appended_total.fetch_add(1, Ordering::Relaxed);
        self.bytes_appended_total
            .fetch_add(payload_bytes, Ordering::Relaxed);
        self.append_latency_ns.record(nanos);
    }

    /// Called after every successful read.
    #[inline]
    pub fn record_read(&self, nanos: u64) {
        self.reads_total.fetch_add(1, Ordering::Relaxed);
        self.read_latency_ns.record(nanos);
    }

    /// Called when a read asks for an offset the log does not hold.
    #[inline]
    pub fn inc_read_misses(&self) {
        self.read_misses_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_segments_rolled(&self) {
        self.segments_rolled_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Called by truncation with what it deleted.
    #[inline]
    pub fn record_removal(&self, segments: u64, bytes: u64) {
        self.segments_removed_total
            .fetch_add(segments, Ordering::Relaxed);
        self.bytes_reclaimed_total.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_appended_total: self.records_appended_total.load(Ordering::Relaxed),
            bytes_appended_total: self.bytes_appended_total.load(Ordering::Relaxed),
            reads_total: self.reads_total.load(Ordering::Relaxed),
            read_misses_total: self.read_misses_total.load(Ordering::Relaxed),
            segments_rolled_total: self.segments_rolled_total.load(Ordering::Relaxed),
            segments_removed_total: self.segments_removed_total.load(Ordering::Relaxed),
            bytes_reclaimed_total: self.bytes_reclaimed_total.load(Ordering::Relaxed),
        }
    }

    pub fn append_latency_percentiles(&self) -> LatencyPercentiles {
        self.append_latency_ns.percentiles()
    }

    pub fn read_latency_percentiles(&self) -> LatencyPercentiles {
        self.read_latency_ns.percentiles()
    }

    /// Export all metrics in Prometheus text format.
    ///
    /// ```text
    /// # HELP metric_name Description
    /// # TYPE metric_name counter
    /// metric_name value
    /// ```
    pub fn export_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        let mut output = String::new();

        let counters = [
            (
                "commitlog_records_appended_total",
                "Total number of records appended",
                snapshot.records_appended_total,
            ),
            (
                "commitlog_bytes_appended_total",
                "Total payload bytes appended",
                snapshot.bytes_appended_total,
            ),
            (
                "commitlog_reads_total",
                "Total number of successful reads",
                snapshot.reads_total,
            ),
            (
                "commitlog_read_misses_total",
                "Total number of reads for offsets not in the log",
                snapshot.read_misses_total,
            ),
            (
                "commitlog_segments_rolled_total",
                "Total number of segments created by rotation",
                snapshot.segments_rolled_total,
            ),
            (
                "commitlog_segments_removed_total",
                "Total number of segments removed by truncation",
                snapshot.segments_removed_total,
            ),
            (
                "commitlog_bytes_reclaimed_total",
                "Total store bytes reclaimed by truncation",
                snapshot.bytes_reclaimed_total,
            ),
        ];
        for (name, help, value) in counters {
            let _ = writeln!(output, "# HELP {} {}", name, help);
            let _ = writeln!(output, "# TYPE {} counter", name);
            let _ = writeln!(output, "{} {}", name, value);
        }

        let latencies = [
            ("commitlog_append_latency_ns", "Append", self.append_latency_percentiles()),
            ("commitlog_read_latency_ns", "Read", self.read_latency_percentiles()),
        ];
        for (name, label, p) in latencies {
            for (suffix, value) in [("p50", p.p50), ("p95", p.p95), ("p99", p.p99)] {
                let _ = writeln!(
                    output,
                    "# HELP {}_{} {} latency {} percentile (ns)",
                    name, suffix, label, suffix
                );
                let _ = writeln!(output, "# TYPE {}_{} gauge", name, suffix);
                let _ = writeln!(output, "{}_{} {}", name, suffix, value);
            }
        }

        output
    }
}

/// Counter values at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub records_appended_total: u64,
    pub bytes_appended_total: u64,
    pub reads_total: u64,
    pub read_misses_total: u64,
    pub segments_rolled_total: u64,
    pub segments_removed_total: u64,
    pub bytes_reclaimed_total: u64,
}

/// Latency percentiles in nanoseconds.
#[derive(Debug, Clone, Default)]
pub struct LatencyPercentiles {
    pub p50: u64,
    pub p95: u64,
    pub p99: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_increments() {
        let m = LogMetrics::new();

        m.record_append(10, 100);
        m.record_append(5, 100);
        m.record_read(50);
        m.inc_read_misses();
        m.inc_segments_rolled();
        m.record_removal(2, 4096);

        let snapshot = m.snapshot();
        assert_eq!(snapshot.records_appended_total, 2);
        assert_eq!(snapshot.bytes_appended_total, 15);
        assert_eq!(snapshot.reads_total, 1);
        assert_eq!(snapshot.read_misses_total, 1);
        assert_eq!(snapshot.segments_rolled_total, 1);
        assert_eq!(snapshot.segments_removed_total, 2);
        assert_eq!(snapshot.bytes_reclaimed_total, 4096);
    }

    #[test]
    fn test_prometheus_export() {
        let m = LogMetrics::new();
        m.record_append(42, 1000);

        let export = m.export_prometheus();
        assert!(export.contains("commitlog_records_appended_total 1"));
        assert!(export.contains("commitlog_bytes_appended_total 42"));
        assert!(export.contains("commitlog_append_latency_ns_p50 1000"));
        assert!(export.contains("# TYPE commitlog_reads_total counter"));
        assert!(export.contains("# TYPE commitlog_read_latency_ns_p99 gauge"));
    }
}
