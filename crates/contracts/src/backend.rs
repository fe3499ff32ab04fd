//! Collaborator interfaces consumed by the pose session
//!
//! - [`PoseBackend`]: the pose-estimation strategy (black box)
//! - [`PoseSourceLookup`]: external transform source (e.g. a transform tree)

use std::time::Duration;

use crate::{is_identity, FrameId, PoseResult, SensorBundle, Transform};

/// Pose-estimation backend capability interface.
///
/// Implementations are selected at session construction; the session only
/// relies on the operations below.
pub trait PoseBackend: Send {
    /// Estimate the pose for one bundle, seeded with an optional motion guess.
    fn process(&mut self, bundle: &SensorBundle, guess: Option<&Transform>) -> PoseResult;

    /// Re-seed the backend at the given pose, dropping any tracking state.
    fn reset(&mut self, pose: &Transform);

    /// Current pose of the backend (identity before the first estimate)
    fn pose(&self) -> Transform;

    /// Number of bundles processed since the last reset
    fn frames_processed(&self) -> u64;

    /// Whether inertial samples can be consumed continuously between bundles
    fn can_consume_async_imu(&self) -> bool;

    fn is_identity_pose(&self) -> bool {
        is_identity(&self.pose())
    }
}

/// Lookup of externally tracked transforms.
///
/// `None` means "unavailable" (timeout, unknown frames) and is never an error.
pub trait PoseSourceLookup: Send {
    fn lookup(
        &self,
        target: &FrameId,
        source: &FrameId,
        stamp: f64,
        timeout: Duration,
    ) -> Option<Transform>;
}

/// Lookup that never knows any transform
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLookup;

impl PoseSourceLookup for NoLookup {
    fn lookup(&self, _: &FrameId, _: &FrameId, _: f64, _: Duration) -> Option<Transform> {
        None
    }
}
