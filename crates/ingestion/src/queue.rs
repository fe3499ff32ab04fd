//! Single-consumer serialization queue.
//!
//! Every input line gets its own [`LineSender`]; all of them feed one bounded
//! channel drained by exactly one consumer. This is the only place where
//! concurrent producers meet, so everything downstream runs sequentially.

use std::sync::Arc;

use async_channel::{bounded, Receiver, Sender, TrySendError};
use contracts::{LineId, SensorPayload, TimestampedItem};
use tracing::{debug, trace, warn};

use crate::config::{IngestionMetrics, QueueConfig};
use crate::error::{IngestionError, Result};

/// Item type carried by the queue
pub type Item = TimestampedItem<SensorPayload>;

/// Multi-producer, single-consumer bounded queue
#[derive(Debug)]
pub struct IngestionQueue {
    tx: Sender<Item>,
    rx: Option<Receiver<Item>>,
    metrics: Arc<IngestionMetrics>,
}

impl IngestionQueue {
    pub fn new(config: QueueConfig) -> Self {
        let (tx, rx) = bounded(config.capacity.max(1));
        Self {
            tx,
            rx: Some(rx),
            metrics: Arc::new(IngestionMetrics::new()),
        }
    }

    /// Producer handle for `line`
    pub fn sender(&self, line: LineId) -> LineSender {
        LineSender {
            line,
            tx: self.tx.clone(),
            metrics: self.metrics.clone(),
        }
    }

    /// Consumer end
    ///
    /// Note: Can only be taken once
    pub fn take_receiver(&mut self) -> Result<Receiver<Item>> {
        self.rx.take().ok_or(IngestionError::ReceiverTaken)
    }

    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.metrics.clone()
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    /// Close the queue; the consumer drains what is left and then sees the end
    pub fn close(&self) {
        if self.tx.close() {
            debug!("ingestion queue closed");
        }
    }
}

/// Producer bound to one input line
#[derive(Debug, Clone)]
pub struct LineSender {
    line: LineId,
    tx: Sender<Item>,
    metrics: Arc<IngestionMetrics>,
}

impl LineSender {
    pub fn line(&self) -> LineId {
        self.line
    }

    /// Non-blocking send; a full queue drops the item. Returns whether it was queued.
    pub fn send(&self, stamp: f64, payload: SensorPayload) -> bool {
        self.metrics.record_received();
        match self.tx.try_send(TimestampedItem::new(self.line, stamp, payload)) {
            Ok(()) => {
                self.metrics.update_queue_len(self.tx.len());
                true
            }
            Err(TrySendError::Full(_)) => {
                self.metrics.record_dropped();
                metrics::counter!("odom_sync_ingestion_dropped_total", "line" => self.line.topic())
                    .increment(1);
                trace!(line = %self.line, stamp, "queue full, item dropped");
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.metrics.record_rejected();
                warn!(line = %self.line, "ingestion queue closed");
                false
            }
        }
    }

    /// Blocking send for lossless replay
    ///
    /// # Errors
    /// `ChannelClosed` once the consumer is gone
    pub fn send_blocking(&self, stamp: f64, payload: SensorPayload) -> Result<()> {
        self.metrics.record_received();
        self.tx
            .send_blocking(TimestampedItem::new(self.line, stamp, payload))
            .map_err(|_| {
                self.metrics.record_rejected();
                IngestionError::ChannelClosed { line: self.line }
            })?;
        self.metrics.update_queue_len(self.tx.len());
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
