//! OdometryNode - single owner of the synchronization engine and the session.

use contracts::{
    ContractError, LineId, OdometryConfig, PoseBackend, PoseEvent, PoseSourceLookup,
    SensorPayload, TimestampedItem, Transform,
};
use sync_engine::SynchronizationEngine;
use tracing::{info, trace};

use crate::session::PoseSession;
use crate::state::Disposition;

/// Serializes every item of every line through one engine and one session.
///
/// All mutation goes through `&mut self`, so the node needs no locking; the
/// ingestion queue in front of it is the only synchronization point.
#[derive(Debug)]
pub struct OdometryNode<B, L> {
    engine: SynchronizationEngine,
    session: PoseSession<B, L>,
}

impl<B: PoseBackend, L: PoseSourceLookup> OdometryNode<B, L> {
    /// # Errors
    /// Propagates shape selection, monitor start and initial-pose errors.
    pub fn new(config: &OdometryConfig, backend: B, lookup: L) -> Result<Self, ContractError> {
        let engine = SynchronizationEngine::configure(config.sync.to_modality_set(), &config.monitor)?;
        let session = PoseSession::new(config.session.clone(), backend, lookup)?;
        info!("{}", engine.description());
        Ok(Self { engine, session })
    }

    /// Route one item: inertial samples go straight to the session, everything
    /// else through the engine. `None` when no bundle was completed.
    pub fn on_item(&mut self, item: TimestampedItem<SensorPayload>) -> Option<Disposition> {
        if item.line() != LineId::Imu {
            let bundle = self.engine.on_item(item)?;
            return Some(self.session.process(bundle));
        }

        let (_, stamp, payload) = item.into_parts();
        let imu = match payload {
            SensorPayload::Imu(imu) => imu,
            other => {
                trace!(kind = other.kind(), "non-inertial payload on the imu line ignored");
                return Some(Disposition::Ignored);
            }
        };
        if self.session.config().wait_imu_to_init || self.session.backend().can_consume_async_imu() {
            Some(self.session.process_imu(stamp, imu))
        } else {
            Some(Disposition::Ignored)
        }
    }

    /// Reset the session, drop partially aligned data and re-arm the monitor
    pub fn reset(&mut self, pose: Option<Transform>) {
        self.engine.flush();
        self.engine.rearm_monitor();
        self.session.reset(pose);
    }

    pub fn pause(&mut self) {
        self.session.pause();
    }

    pub fn resume(&mut self) {
        self.session.resume();
    }

    pub fn take_events(&mut self) -> Vec<PoseEvent> {
        self.session.take_events()
    }

    pub fn engine(&self) -> &SynchronizationEngine {
        &self.engine
    }

    pub fn session(&self) -> &PoseSession<B, L> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut PoseSession<B, L> {
        &mut self.session
    }

    /// Stop the liveness monitor
    pub fn shutdown(&mut self) {
        self.engine.stop();
        info!(stats = ?self.session.stats(), engine = ?self.engine.stats(), "odometry node stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{DeadReckoningBackend, ScriptedBackend};
    use crate::state::SessionState;
    use contracts::{ImuSample, LaserScan, NoLookup, OdomSample, SyncConfig};
    use nalgebra::{Quaternion, Vector3};

    fn scan_only_config() -> OdometryConfig {
        OdometryConfig {
            sync: SyncConfig {
                subscribe_depth: false,
                subscribe_scan: true,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn scan_item(stamp: f64) -> TimestampedItem<SensorPayload> {
        TimestampedItem::new(
            LineId::Scan2d,
            stamp,
            SensorPayload::Scan2d(LaserScan {
                angle_min: -1.0,
                angle_max: 1.0,
                angle_increment: 0.5,
                range_min: 0.1,
                range_max: 10.0,
                ranges: vec![1.0; 5],
                frame_id: "laser".into(),
            }),
        )
    }

    fn imu_item(stamp: f64) -> TimestampedItem<SensorPayload> {
        TimestampedItem::new(
            LineId::Imu,
            stamp,
            SensorPayload::Imu(ImuSample {
                orientation: Quaternion::new(0.0, 0.0, 0.0, 0.0),
                angular_velocity: Vector3::zeros(),
                linear_acceleration: Vector3::new(0.0, 0.0, 9.81),
                frame_id: "base_link".into(),
            }),
        )
    }

    #[test]
    fn test_direct_scan_reaches_session() {
        let mut node = OdometryNode::new(&scan_only_config(), ScriptedBackend::new([]), NoLookup).unwrap();

        assert_eq!(node.on_item(scan_item(1.0)), Some(Disposition::Estimated));
        assert_eq!(node.on_item(scan_item(0.5)), Some(Disposition::Stale));
        assert_eq!(node.take_events().len(), 1);
        node.shutdown();
    }

    #[test]
    fn test_correlated_items_wait_for_alignment() {
        let config = OdometryConfig {
            sync: SyncConfig {
                subscribe_depth: false,
                subscribe_scan: true,
                subscribe_odom: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut node =
            OdometryNode::new(&config, DeadReckoningBackend::new(0, false, 20), NoLookup).unwrap();

        assert_eq!(node.on_item(scan_item(1.0)), None);
        let odom = TimestampedItem::new(
            LineId::Odom,
            1.0,
            SensorPayload::Odom(OdomSample {
                pose: Transform::identity(),
                frame_id: "odom".into(),
                child_frame_id: "base_link".into(),
            }),
        );
        assert_eq!(node.on_item(odom), Some(Disposition::Estimated));
        assert_eq!(node.engine().stats().bundles_emitted, 1);
    }

    #[test]
    fn test_imu_ignored_without_consumer() {
        let mut node = OdometryNode::new(&scan_only_config(), ScriptedBackend::new([]), NoLookup).unwrap();
        assert_eq!(node.on_item(imu_item(1.0)), Some(Disposition::Ignored));
        assert!(node.session().backend().processed.is_empty());
    }

    #[test]
    fn test_imu_bootstrap_through_node() {
        let mut config = scan_only_config();
        config.session.wait_imu_to_init = true;
        let mut node = OdometryNode::new(&config, ScriptedBackend::new([]), NoLookup).unwrap();

        assert_eq!(node.session().state(), SessionState::AwaitingImuBootstrap);
        assert_eq!(node.on_item(scan_item(1.0)), Some(Disposition::AwaitingImu));
        // Level sensor: identity rotation, bootstrap still counts
        assert_eq!(node.on_item(imu_item(1.1)), Some(Disposition::Bootstrapped));
        assert_eq!(node.on_item(scan_item(1.2)), Some(Disposition::Estimated));
    }

    #[test]
    fn test_reset_flushes_and_rearms() {
        let mut node = OdometryNode::new(&scan_only_config(), ScriptedBackend::new([]), NoLookup).unwrap();
        node.on_item(scan_item(5.0));
        node.pause();
        node.reset(None);

        assert!(node.session().is_paused());
        assert_eq!(node.session().last_stamp(), 0.0);
        node.resume();
        assert_eq!(node.on_item(scan_item(1.0)), Some(Disposition::Estimated));
    }
}
