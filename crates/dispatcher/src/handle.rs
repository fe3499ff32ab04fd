//! SinkHandle - one sink behind its own bounded queue and worker task

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use contracts::{PoseEvent, PoseSink};

use crate::error::DispatcherError;
use crate::metrics::SinkMetrics;

/// Handle to a running sink worker
pub struct SinkHandle {
    name: String,
    tx: mpsc::Sender<PoseEvent>,
    metrics: Arc<SinkMetrics>,
    worker_handle: JoinHandle<()>,
}

impl SinkHandle {
    /// Spawn the worker task on the current tokio runtime
    pub fn spawn<S: PoseSink + 'static>(sink: S, queue_capacity: usize) -> Self {
        let name = sink.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(SinkMetrics::new());

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();

        let worker_handle = tokio::spawn(async move {
            sink_worker(sink, rx, worker_metrics, worker_name).await;
        });

        Self {
            name,
            tx,
            metrics,
            worker_handle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Queue an event without waiting.
    ///
    /// # Errors
    /// `QueueFull` when the worker is behind; the event is dropped and counted.
    pub fn offer(&self, event: PoseEvent) -> Result<(), DispatcherError> {
        match self.tx.try_send(event) {
            Ok(()) => {
                self.metrics
                    .set_queue_len(self.tx.max_capacity() - self.tx.capacity());
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(event)) => {
                self.metrics.inc_dropped();
                observability::record_event_dispatched(&self.name, false);
                Err(DispatcherError::QueueFull {
                    sink_name: self.name.clone(),
                    kind: event.kind(),
                    stamp: event.stamp(),
                })
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(DispatcherError::WorkerClosed(self.name.clone()))
            }
        }
    }

    /// Queue an event without waiting; `false` when it was dropped
    pub fn try_send(&self, event: PoseEvent) -> bool {
        match self.offer(event) {
            Ok(()) => true,
            Err(e @ DispatcherError::QueueFull { .. }) => {
                warn!(error = %e, "Queue full, event dropped");
                false
            }
            Err(e) => {
                error!(error = %e, "Sink unavailable");
                false
            }
        }
    }

    /// Close the queue, let the worker drain it, then flush and close the sink
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.worker_handle.await {
            error!(sink = %self.name, error = ?e, "Worker task panicked");
        }
        debug!(sink = %self.name, "SinkHandle shutdown complete");
    }
}

#[instrument(
    name = "sink_worker_loop",
    skip(sink, rx, metrics),
    fields(sink = %name)
)]
async fn sink_worker<S: PoseSink>(
    mut sink: S,
    mut rx: mpsc::Receiver<PoseEvent>,
    metrics: Arc<SinkMetrics>,
    name: String,
) {
    debug!(sink = %name, "Sink worker started");

    while let Some(event) = rx.recv().await {
        metrics.set_queue_len(rx.len());

        match sink.write(&event).await {
            Ok(()) => {
                metrics.record_written(event.stamp());
                observability::record_event_dispatched(&name, true);
            }
            Err(e) => {
                metrics.inc_failures();
                observability::record_event_dispatched(&name, false);
                error!(
                    sink = %name,
                    kind = event.kind(),
                    stamp = event.stamp(),
                    error = %e,
                    "Write failed"
                );
            }
        }
    }

    if let Err(e) = sink.flush().await {
        error!(sink = %name, error = %e, "Flush failed on shutdown");
    }
    if let Err(e) = sink.close().await {
        error!(sink = %name, error = %e, "Close failed on shutdown");
    }

    debug!(sink = %name, "Sink worker stopped");
}
