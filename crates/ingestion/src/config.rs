//! Queue configuration and metrics

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Queue configuration
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Channel capacity (items across all lines)
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { capacity: 1024 }
    }
}

impl QueueConfig {
    pub fn new(capacity: usize) -> Self {
        Self { capacity }
    }
}

/// Ingestion metrics
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Total items offered by producers
    pub items_received: AtomicU64,

    /// Items dropped because the queue was full
    pub items_dropped: AtomicU64,

    /// Items offered after the consumer went away
    pub items_rejected: AtomicU64,

    /// Queue length seen by the last producer
    pub queue_len: AtomicUsize,
}

impl IngestionMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.items_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.items_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.items_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn update_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            items_received: self.items_received.load(Ordering::Relaxed),
            items_dropped: self.items_dropped.load(Ordering::Relaxed),
            items_rejected: self.items_rejected.load(Ordering::Relaxed),
            queue_len: self.queue_len.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub items_received: u64,
    pub items_dropped: u64,
    pub items_rejected: u64,
    pub queue_len: usize,
}
