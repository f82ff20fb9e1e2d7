use super::registry::LatencyPercentiles;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Number of samples kept. Older samples are overwritten.
const RING_SIZE: usize = 1024;

/// Lock-free latency histogram over a ring buffer of recent samples.
///
/// - O(1) record: one atomic slot claim, one store
/// - Percentiles sort a snapshot, so they are only computed on export
/// - Approximate: only the last RING_SIZE samples count
pub struct Histogram {
    samples: Box<[AtomicU64; RING_SIZE]>,

    /// Next slot to write (taken modulo RING_SIZE).
    index: AtomicUsize,
}

impl Histogram {
    pub fn new() -> Self {
        Self {
            samples: Box::new([(); RING_SIZE].map(|_| AtomicU64::new(0))),
            index: AtomicUsize::new(0),
        }
    }

    /// Record a sample in nanoseconds.
    ///
    /// Zero samples are indistinguishable from empty slots and are stored
    /// as 1.
    #[inline]
    pub fn record(&self, nanos: u64) {
        let idx = self.index.fetch_add(1, Ordering::Relaxed) % RING_SIZE;
        self.samples[idx].store(nanos.max(1), Ordering::Relaxed);
    }

    /// p50/p95/p99 over the samples currently in the ring.
    pub fn percentiles(&self) -> LatencyPercentiles {
        let mut values: Vec<u64> = self
            .samples
            .iter()
            .map(|s| s.load(Ordering::Relaxed))
            .filter(|&v| v > 0)
            .collect();

        if values.is_empty() {
            return LatencyPercentiles::default();
        }

        values.sort_unstable();

        let len = values.len();
        let at = |pct: usize| {
            values
                .get(((len * pct) / 100).saturating_sub(1))
                .copied()
                .unwrap_or(0)
        };

        LatencyPercentiles {
            p50: at(50),
            p95: at(95),
            p99: at(99),
        }
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}
