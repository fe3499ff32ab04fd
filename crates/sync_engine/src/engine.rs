//! Main synchronization engine implementation.

use contracts::{
    ContractError, LineId, Modality, ModalitySet, MonitorConfig, SensorBundle, SensorPayload,
    TimestampedItem,
};
use serde::Serialize;
use tracing::{debug, info, instrument, trace, warn};

use crate::assemble::BundleAssembler;
use crate::correlator::{AlignedTuple, Correlator, MatchPolicy};
use crate::monitor::WarningMonitor;
use crate::shape::SyncShape;

/// Running counters of the engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    pub items_received: u64,
    pub items_ignored: u64,
    pub bundles_emitted: u64,
    pub bundles_rejected: u64,
}

/// Fan-in of all subscribed lines into aligned [`SensorBundle`]s
#[derive(Debug)]
pub struct SynchronizationEngine {
    modalities: ModalitySet,
    shape: SyncShape,
    shape_name: String,
    lines: Vec<LineId>,
    /// `None` for direct (single-line) shapes
    correlator: Option<Correlator<SensorPayload>>,
    assembler: BundleAssembler,
    monitor: WarningMonitor,
    description: String,
    delivered: bool,
    stats: EngineStats,
}

impl SynchronizationEngine {
    /// Select the shape for `modalities`, build its correlator and start the
    /// liveness monitor.
    ///
    /// # Errors
    /// `InvalidModality` for sets no shape can serve; `Io` if the monitor
    /// thread cannot be spawned.
    pub fn configure(
        modalities: ModalitySet,
        monitor: &MonitorConfig,
    ) -> Result<Self, ContractError> {
        let shape = SyncShape::select(&modalities)?;
        let lines = shape.lines();
        let policy = MatchPolicy::from_tolerant(modalities.sync_tolerant);

        let correlator = (!shape.is_direct())
            .then(|| Correlator::new(shape.line_specs(), policy, modalities.queue_depth));

        let description = describe(&shape, &lines, &modalities);
        let monitor =
            WarningMonitor::start(description.clone(), modalities.sync_tolerant, monitor.interval())?;

        info!(
            shape = %shape,
            direct = shape.is_direct(),
            policy = ?policy,
            queue_size = modalities.queue_depth,
            "synchronization engine configured"
        );

        Ok(Self {
            modalities,
            shape,
            shape_name: shape.name(),
            lines,
            correlator,
            assembler: BundleAssembler::new(shape),
            monitor,
            description,
            delivered: false,
            stats: EngineStats::default(),
        })
    }

    /// Feed one item; returns a bundle when the item completes an alignment.
    #[instrument(
        level = "trace",
        name = "sync_engine_on_item",
        skip(self, item),
        fields(line = %item.line(), stamp = item.stamp(), shape = %self.shape_name)
    )]
    pub fn on_item(&mut self, item: TimestampedItem<SensorPayload>) -> Option<SensorBundle> {
        let line = item.line();
        self.stats.items_received += 1;
        observability::record_item_received(line);

        if !self.lines.contains(&line) {
            self.stats.items_ignored += 1;
            trace!(line = %line, "item on unsubscribed line ignored");
            return None;
        }

        let tuple = match self.correlator.as_mut() {
            None => AlignedTuple::single(item),
            Some(correlator) => {
                let tuple = correlator.ingest(item);
                observability::record_buffer_depth(line, correlator.buffered(line));
                tuple?
            }
        };

        match self.assembler.assemble(tuple) {
            Ok(bundle) => {
                self.stats.bundles_emitted += 1;
                observability::record_bundle_emitted(&self.shape_name);
                if !self.delivered {
                    self.delivered = true;
                    self.monitor.notify_activity();
                    debug!(stamp = bundle.stamp, "first bundle delivered");
                }
                Some(bundle)
            }
            Err(e) => {
                self.stats.bundles_rejected += 1;
                observability::record_bundle_rejected("invalid_bundle");
                warn!(error = %e, "dropping aligned data");
                None
            }
        }
    }

    /// Drop everything buffered in the correlator
    pub fn flush(&mut self) {
        if let Some(correlator) = self.correlator.as_mut() {
            correlator.flush();
        }
    }

    /// Make the liveness monitor warn again until the next bundle
    pub fn rearm_monitor(&mut self) {
        self.delivered = false;
        self.monitor.rearm();
    }

    /// Stop the monitor thread (also done on drop)
    pub fn stop(&mut self) {
        self.monitor.stop();
    }

    pub fn is_active(&self, modality: Modality) -> bool {
        self.modalities.is_active(modality)
    }

    pub fn is_data_subscribed(&self) -> bool {
        self.modalities.is_data_subscribed()
    }

    pub fn rgbd_cameras(&self) -> u8 {
        self.modalities.rgbd_count
    }

    pub fn queue_size(&self) -> usize {
        self.modalities.queue_depth
    }

    pub fn is_tolerant(&self) -> bool {
        self.modalities.sync_tolerant
    }

    pub fn shape(&self) -> &SyncShape {
        &self.shape
    }

    /// Subscribed lines in shape order
    pub fn lines(&self) -> &[LineId] {
        &self.lines
    }

    /// Human-readable subscription summary (used by the monitor)
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    pub fn monitor_warnings(&self) -> u64 {
        self.monitor.warning_count()
    }

    pub fn evicted_count(&self) -> u64 {
        self.correlator
            .as_ref()
            .map(|c| c.evicted_count())
            .unwrap_or(0)
    }
}

fn describe(shape: &SyncShape, lines: &[LineId], modalities: &ModalitySet) -> String {
    let mode = if shape.is_direct() {
        "no sync".to_string()
    } else if modalities.sync_tolerant {
        format!("approx sync, queue_size={}", modalities.queue_depth)
    } else {
        format!("exact sync, queue_size={}", modalities.queue_depth)
    };
    let lines: Vec<String> = lines.iter().map(|l| l.topic()).collect();
    format!(
        "odometry ({shape}) subscribed to ({mode}):\n   {}",
        lines.join("\n   ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use contracts::{CameraInfo, ImageData, LaserScan, OdomSample, Transform, VisualData};
    use std::time::Duration;

    fn monitor_config() -> MonitorConfig {
        MonitorConfig { interval_s: 60.0 }
    }

    fn image(encoding: &str) -> SensorPayload {
        SensorPayload::Image(ImageData {
            width: 64,
            height: 48,
            encoding: encoding.to_string(),
            data: Bytes::new(),
        })
    }

    fn info() -> SensorPayload {
        SensorPayload::CameraInfo(CameraInfo {
            width: 64,
            height: 48,
            fx: 50.0,
            fy: 50.0,
            cx: 32.0,
            cy: 24.0,
            tx: 0.0,
            frame_id: "camera".into(),
        })
    }

    fn scan() -> SensorPayload {
        SensorPayload::Scan2d(LaserScan {
            angle_min: -1.0,
            angle_max: 1.0,
            angle_increment: 0.5,
            range_min: 0.1,
            range_max: 10.0,
            ranges: vec![1.0; 5],
            frame_id: "laser".into(),
        })
    }

    fn odom() -> SensorPayload {
        SensorPayload::Odom(OdomSample {
            pose: Transform::identity(),
            frame_id: "odom".into(),
            child_frame_id: "base_link".into(),
        })
    }

    fn item(line: LineId, stamp: f64, payload: SensorPayload) -> TimestampedItem<SensorPayload> {
        TimestampedItem::new(line, stamp, payload)
    }

    fn exact_depth_scan_odom() -> SynchronizationEngine {
        let set = ModalitySet {
            has_depth: true,
            has_scan2d: true,
            has_odom_guess: true,
            sync_tolerant: false,
            ..Default::default()
        };
        SynchronizationEngine::configure(set, &monitor_config()).unwrap()
    }

    #[test]
    fn test_exact_shape_emits_only_on_coinciding_stamps() {
        let mut engine = exact_depth_scan_odom();
        assert_eq!(engine.shape().name(), "odom+depth+scan2d");
        assert!(!engine.is_tolerant());

        assert!(engine.on_item(item(LineId::Odom, 1.0, odom())).is_none());
        assert!(engine.on_item(item(LineId::Rgb, 1.0, image("rgb8"))).is_none());
        assert!(engine.on_item(item(LineId::Depth, 1.0, image("16UC1"))).is_none());
        assert!(engine.on_item(item(LineId::CameraInfo, 1.0, info())).is_none());
        // Scan stamped slightly off: no emission
        assert!(engine.on_item(item(LineId::Scan2d, 1.001, scan())).is_none());

        let bundle = engine.on_item(item(LineId::Scan2d, 1.0, scan())).unwrap();
        assert_eq!(bundle.stamp, 1.0);
        assert!(bundle.guess.is_some());
        assert!(bundle.scan2d.is_some());
        assert!(matches!(bundle.visual, VisualData::Depth { .. }));
        assert_eq!(engine.stats().bundles_emitted, 1);
    }

    #[test]
    fn test_direct_shape_forwards_each_item() {
        let set = ModalitySet {
            has_scan2d: true,
            ..Default::default()
        };
        let mut engine = SynchronizationEngine::configure(set, &monitor_config()).unwrap();
        assert!(engine.shape().is_direct());

        for stamp in [1.0, 2.0, 3.0] {
            let bundle = engine.on_item(item(LineId::Scan2d, stamp, scan())).unwrap();
            assert_eq!(bundle.stamp, stamp);
        }
        assert_eq!(engine.evicted_count(), 0);
    }

    #[test]
    fn test_invalid_set_aborts_configuration() {
        let set = ModalitySet {
            has_depth: true,
            has_rgb: true,
            ..Default::default()
        };
        let err = SynchronizationEngine::configure(set, &monitor_config()).unwrap_err();
        assert!(matches!(err, ContractError::InvalidModality { .. }));
    }

    #[test]
    fn test_invalid_bundle_is_dropped() {
        let set = ModalitySet {
            has_rgb: true,
            ..Default::default()
        };
        let mut engine = SynchronizationEngine::configure(set, &monitor_config()).unwrap();

        engine.on_item(item(LineId::CameraInfo, 1.0, info()));
        assert!(engine.on_item(item(LineId::Rgb, 1.0, image("yuv422"))).is_none());
        assert_eq!(engine.stats().bundles_rejected, 1);
    }

    #[test]
    fn test_unsubscribed_and_flush() {
        let mut engine = exact_depth_scan_odom();
        assert!(engine.on_item(item(LineId::Imu, 1.0, odom())).is_none());
        assert_eq!(engine.stats().items_ignored, 1);

        engine.on_item(item(LineId::Odom, 1.0, odom()));
        engine.on_item(item(LineId::Rgb, 1.0, image("rgb8")));
        engine.on_item(item(LineId::Depth, 1.0, image("16UC1")));
        engine.on_item(item(LineId::CameraInfo, 1.0, info()));
        engine.flush();
        assert!(engine.on_item(item(LineId::Scan2d, 1.0, scan())).is_none());
    }

    #[test]
    fn test_queries() {
        let set = ModalitySet {
            rgbd_count: 2,
            has_scan3d: true,
            queue_depth: 7,
            ..Default::default()
        };
        let engine = SynchronizationEngine::configure(set, &monitor_config()).unwrap();
        assert!(engine.is_active(Modality::Rgbd));
        assert!(engine.is_active(Modality::Scan3d));
        assert!(!engine.is_active(Modality::Depth));
        assert!(engine.is_data_subscribed());
        assert_eq!(engine.rgbd_cameras(), 2);
        assert_eq!(engine.queue_size(), 7);
        assert!(engine.is_tolerant());
        assert!(engine.description().contains("rgbd_image1"));
        assert!(engine.description().contains("approx sync"));
    }

    #[test]
    fn test_first_bundle_silences_monitor() {
        let set = ModalitySet {
            has_scan2d: true,
            ..Default::default()
        };
        let monitor = MonitorConfig { interval_s: 0.01 };
        let mut engine = SynchronizationEngine::configure(set, &monitor).unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while engine.monitor_warnings() == 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(engine.monitor_warnings() >= 1);

        engine.on_item(item(LineId::Scan2d, 1.0, scan()));
        let count = engine.monitor_warnings();
        std::thread::sleep(Duration::from_millis(60));
        assert!(engine.monitor_warnings() <= count + 1);

        engine.stop();
    }
}
