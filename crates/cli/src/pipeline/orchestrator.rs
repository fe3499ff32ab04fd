//! Pipeline orchestrator - mock rig → ingestion queue → odometry node → dispatcher.

use std::future::Future;
use std::time::{Duration, Instant};

use contracts::{LineId, NoLookup, OdometryConfig, PoseEvent};
use ingestion::{IngestionQueue, MockRig, MockRigConfig, QueueConfig};
use pose_session::{DeadReckoningBackend, Disposition, OdometryNode};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::PipelineStats;
use crate::error::{CliError, Result};

/// Capacity of the node → dispatcher event channel
const EVENT_BUFFER: usize = 256;

/// How long the dispatcher may take to drain its sinks on shutdown
const DISPATCHER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Resolved (merged and validated) odometry configuration
    pub odometry: OdometryConfig,

    pub rig: MockRigConfig,

    /// Ingestion queue capacity
    pub queue_capacity: usize,

    /// Stop after this many synchronized bundles (None = unlimited)
    pub max_bundles: Option<u64>,

    /// Pipeline timeout (None = no timeout)
    pub timeout: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until the rig is exhausted, a limit is hit or `shutdown` resolves.
    ///
    /// All components are stopped and drained before returning.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let odometry = &self.config.odometry;

        if let Some(port) = self.config.metrics_port {
            observability::install_prometheus(port)
                .map_err(|e| CliError::pipeline_execution(e.to_string()))?;
            info!("Metrics endpoint available on port {}", port);
        }

        // Node
        let backend = DeadReckoningBackend::from_config(&odometry.backend);
        let mut node = OdometryNode::new(odometry, backend, NoLookup)?;
        let lines: Vec<LineId> = node
            .engine()
            .lines()
            .iter()
            .copied()
            .filter(|line| *line != LineId::Imu)
            .collect();

        // Dispatcher
        let (events_tx, events_rx) = mpsc::channel::<PoseEvent>(EVENT_BUFFER);
        if odometry.sinks.is_empty() {
            warn!("No sinks configured - pose events are only counted");
        }
        let dispatcher = dispatcher::create_dispatcher(odometry.sinks.clone(), events_rx)
            .await
            .map_err(|e| CliError::pipeline_execution(e.to_string()))?;
        let dispatcher_handle = dispatcher.spawn();

        // Ingestion
        let mut queue = IngestionQueue::new(QueueConfig {
            capacity: self.config.queue_capacity,
        });
        let rx = queue
            .take_receiver()
            .map_err(|e| CliError::pipeline_execution(e.to_string()))?;
        let mut rig = MockRig::new(self.config.rig.clone(), lines);
        rig.start(&queue)
            .map_err(|e| CliError::pipeline_execution(e.to_string()))?;

        info!(
            shape = %node.engine().shape(),
            max_bundles = ?self.config.max_bundles,
            "Pipeline running (mock rig)"
        );

        let mut stats = PipelineStats {
            shape: node.engine().shape().name(),
            ..Default::default()
        };

        tokio::pin!(shutdown);
        let deadline = tokio::time::sleep(self.config.timeout.unwrap_or_default());
        tokio::pin!(deadline);
        let mut rig_check = tokio::time::interval(Duration::from_millis(50));

        'pipeline: loop {
            tokio::select! {
                _ = &mut shutdown => {
                    warn!("Received shutdown signal, stopping pipeline...");
                    break;
                }
                _ = &mut deadline, if self.config.timeout.is_some() => {
                    warn!(timeout_secs = ?self.config.timeout, "Pipeline timed out");
                    break;
                }
                _ = rig_check.tick() => {
                    // Finite rig finished: let the node drain what is queued
                    if !rig.is_running() {
                        queue.close();
                    }
                }
                item = rx.recv() => {
                    let Ok(item) = item else {
                        debug!("Ingestion queue drained");
                        break;
                    };
                    stats.items_received += 1;

                    let resets_before = node.session().stats().auto_resets;
                    let started = Instant::now();
                    if let Some(disposition) = node.on_item(item) {
                        stats.session_metrics.record_disposition(disposition.as_str());
                        if matches!(disposition, Disposition::Estimated | Disposition::Lost) {
                            stats
                                .session_metrics
                                .record_latency_ms(started.elapsed().as_secs_f64() * 1000.0);
                        }
                    }
                    if node.session().stats().auto_resets > resets_before {
                        stats.session_metrics.record_auto_reset();
                    }

                    for event in node.take_events() {
                        observability::record_pose_event(&event);
                        stats.session_metrics.record_event(&event);
                        stats.events += 1;
                        if events_tx.send(event).await.is_err() {
                            warn!("Dispatcher channel closed");
                            break 'pipeline;
                        }
                    }

                    if let Some(max) = self.config.max_bundles {
                        if node.engine().stats().bundles_emitted >= max {
                            info!(bundles = max, "Reached max bundles limit");
                            break;
                        }
                    }
                }
            }
        }

        info!("Shutting down pipeline...");
        // Close first: a lossless rig may be blocked on a full queue
        queue.close();
        rig.stop();
        node.shutdown();

        stats.rig_frames = rig.frames();
        stats.items_dropped = queue.metrics().snapshot().items_dropped;
        stats.engine = node.engine().stats();
        stats.session = node.session().stats();

        drop(events_tx);
        match tokio::time::timeout(DISPATCHER_DRAIN_TIMEOUT, dispatcher_handle).await {
            Ok(Ok(sinks)) => stats.sinks = sinks,
            Ok(Err(e)) => warn!(error = %e, "Dispatcher task failed"),
            Err(_) => warn!("Dispatcher did not drain in time"),
        }

        stats.duration = start_time.elapsed();
        info!(
            duration_secs = stats.duration.as_secs_f64(),
            bundle_rate = format!("{:.2}", stats.bundle_rate()),
            "Pipeline shutdown complete"
        );

        Ok(stats)
    }
}
