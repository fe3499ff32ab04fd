//! Per-line item buffer with capacity-driven eviction.
//!
//! Uses index-based separation for better performance:
//! - HeapRb stores lightweight metadata (stamp + arrival sequence + slab key)
//! - Slab stores the actual TimestampedItem
//!
//! This avoids moving large payloads (images, clouds) during buffer operations.

use std::cmp::Ordering;
use std::fmt;

use contracts::TimestampedItem;
use ringbuf::{traits::*, HeapRb};
use slab::Slab;

/// Lightweight metadata stored in ring buffer
#[derive(Debug, Clone, Copy)]
struct ItemMeta {
    /// Stamp for matching
    stamp: f64,
    /// Arrival order across the buffer's lifetime (tie breaker)
    seq: u64,
    /// Key into the slab storage
    slab_key: usize,
}

/// Handle to a buffered item, valid until the item is taken or evicted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot(usize);

/// Bounded per-line FIFO; the oldest item is evicted when full.
pub struct LineBuffer<T> {
    /// Ring buffer of metadata, in arrival order
    index: HeapRb<ItemMeta>,
    /// Actual item storage
    storage: Slab<TimestampedItem<T>>,
    capacity: usize,
    next_seq: u64,
    evicted_count: u64,
    out_of_order_count: u64,
    last_stamp: Option<f64>,
}

impl<T> fmt::Debug for LineBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineBuffer")
            .field("len", &self.index.occupied_len())
            .field("capacity", &self.capacity)
            .field("evicted", &self.evicted_count)
            .finish()
    }
}

impl<T> LineBuffer<T> {
    /// Create a new buffer holding at most `capacity` items (minimum 1)
    #[inline]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            index: HeapRb::new(capacity),
            storage: Slab::with_capacity(capacity),
            capacity,
            next_seq: 0,
            evicted_count: 0,
            out_of_order_count: 0,
            last_stamp: None,
        }
    }

    /// Push an item into the buffer
    ///
    /// If the buffer is full, the oldest item is dropped permanently and
    /// returned so the caller can account for it.
    #[inline]
    pub fn push(&mut self, item: TimestampedItem<T>) -> Option<TimestampedItem<T>> {
        let stamp = item.stamp();

        if let Some(last) = self.last_stamp {
            if stamp < last {
                self.out_of_order_count += 1;
            }
        }
        self.last_stamp = Some(stamp);

        let evicted = if self.index.is_full() {
            self.evicted_count += 1;
            self.index
                .try_pop()
                .map(|old_meta| self.storage.remove(old_meta.slab_key))
        } else {
            None
        };

        let slab_key = self.storage.insert(item);
        let meta = ItemMeta {
            stamp,
            seq: self.next_seq,
            slab_key,
        };
        self.next_seq += 1;
        let _ = self.index.try_push(meta);

        evicted
    }

    /// Slot of the earliest-arrived item whose stamp is bit-identical to `stamp`
    #[inline]
    pub fn find_exact(&self, stamp: f64) -> Option<Slot> {
        let bits = stamp.to_bits();
        self.index
            .iter()
            .find(|m| m.stamp.to_bits() == bits)
            .map(|m| Slot(m.slab_key))
    }

    /// Slot of the item closest in time to `target`; ties go to the earliest arrival
    #[inline]
    pub fn find_closest(&self, target: f64) -> Option<Slot> {
        self.index
            .iter()
            .min_by(|a, b| {
                let da = (a.stamp - target).abs();
                let db = (b.stamp - target).abs();
                da.partial_cmp(&db)
                    .unwrap_or(Ordering::Equal)
                    .then(a.seq.cmp(&b.seq))
            })
            .map(|m| Slot(m.slab_key))
    }

    /// Slot of the most recently pushed item
    #[inline]
    pub fn newest(&self) -> Option<Slot> {
        self.index.iter().last().map(|m| Slot(m.slab_key))
    }

    /// Borrow a buffered item
    #[inline]
    pub fn get(&self, slot: Slot) -> Option<&TimestampedItem<T>> {
        self.storage.get(slot.0)
    }

    /// Remove and return a buffered item; other items keep their order
    pub fn take(&mut self, slot: Slot) -> Option<TimestampedItem<T>> {
        if !self.storage.contains(slot.0) {
            return None;
        }

        // Rebuild index without the taken entry (only moves small metadata)
        let remaining: Vec<ItemMeta> = self
            .index
            .pop_iter()
            .filter(|m| m.slab_key != slot.0)
            .collect();
        for m in remaining {
            let _ = self.index.try_push(m);
        }

        Some(self.storage.remove(slot.0))
    }

    /// Drop every buffered item
    pub fn clear(&mut self) {
        self.index.clear();
        self.storage.clear();
        self.last_stamp = None;
    }

    /// Stamps currently buffered, in arrival order
    pub fn stamps(&self) -> Vec<f64> {
        self.index.iter().map(|m| m.stamp).collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.index.occupied_len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Items dropped because the buffer was full
    #[inline]
    pub fn evicted_count(&self) -> u64 {
        self.evicted_count
    }

    /// Items that arrived with a stamp older than their predecessor
    #[inline]
    pub fn out_of_order_count(&self) -> u64 {
        self.out_of_order_count
    }
}
