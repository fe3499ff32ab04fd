//! Per-sink counters, shared between a handle and its worker

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Counters of a single sink
#[derive(Debug, Default)]
pub struct SinkMetrics {
    queue_len: AtomicUsize,
    written: AtomicU64,
    failures: AtomicU64,
    dropped: AtomicU64,
    /// `f64::to_bits` of the stamp of the last written event
    last_stamp_bits: AtomicU64,
}

impl SinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    /// Count a successful write of an event stamped `stamp`
    pub fn record_written(&self, stamp: f64) {
        self.written.fetch_add(1, Ordering::Relaxed);
        self.last_stamp_bits.store(stamp.to_bits(), Ordering::Relaxed);
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn inc_failures(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn inc_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Stamp of the last written event (0 before the first write)
    pub fn last_stamp(&self) -> f64 {
        f64::from_bits(self.last_stamp_bits.load(Ordering::Relaxed))
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_len: self.queue_len(),
            written: self.written(),
            failures: self.failures(),
            dropped: self.dropped(),
            last_stamp: self.last_stamp(),
        }
    }
}

/// Point-in-time copy of [`SinkMetrics`] for reporting
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsSnapshot {
    pub queue_len: usize,
    pub written: u64,
    pub failures: u64,
    pub dropped: u64,
    pub last_stamp: f64,
}

impl MetricsSnapshot {
    /// Events that reached the sink, successfully or not
    pub fn attempted(&self) -> u64 {
        self.written + self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_tracks_counters() {
        let metrics = SinkMetrics::new();
        assert_eq!(metrics.last_stamp(), 0.0);

        metrics.record_written(1.25);
        metrics.record_written(2.5);
        metrics.inc_failures();
        metrics.inc_dropped();
        metrics.set_queue_len(3);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.written, 2);
        assert_eq!(snapshot.failures, 1);
        assert_eq!(snapshot.dropped, 1);
        assert_eq!(snapshot.queue_len, 3);
        assert_eq!(snapshot.last_stamp, 2.5);
        assert_eq!(snapshot.attempted(), 3);
    }
}
