//! Pose types exchanged between the session, the backend and downstream consumers.

use nalgebra::{Isometry3, Matrix6, Translation3, UnitQuaternion, Vector3, Vector6};
use serde::{Deserialize, Serialize};

use crate::{ContractError, FrameId, OdomDiagnostics};

/// Rigid 6-DoF transform
pub type Transform = Isometry3<f64>;

/// 6x6 covariance (x, y, z, roll, pitch, yaw)
pub type Covariance6 = Matrix6<f64>;

/// Variance marking an unknown or untrusted estimate
pub const BAD_COVARIANCE: f64 = 9999.0;

/// Build a transform from translation and roll/pitch/yaw (radians).
pub fn transform_from_xyz_rpy(x: f64, y: f64, z: f64, roll: f64, pitch: f64, yaw: f64) -> Transform {
    Isometry3::from_parts(
        Translation3::new(x, y, z),
        UnitQuaternion::from_euler_angles(roll, pitch, yaw),
    )
}

/// Decompose a transform into `[x, y, z, roll, pitch, yaw]`.
pub fn xyz_rpy(transform: &Transform) -> [f64; 6] {
    let t = transform.translation.vector;
    let (roll, pitch, yaw) = transform.rotation.euler_angles();
    [t.x, t.y, t.z, roll, pitch, yaw]
}

/// Exact identity test (no tolerance): an untouched pose is bit-identical to identity.
pub fn is_identity(transform: &Transform) -> bool {
    *transform == Transform::identity()
}

/// Parse `"x y z roll pitch yaw"` or `"x y z qx qy qz qw"`.
///
/// An empty string yields identity.
pub fn parse_pose(input: &str) -> Result<Transform, ContractError> {
    let invalid = || ContractError::InvalidPose {
        input: input.to_string(),
    };
    let values: Vec<f64> = input
        .split_whitespace()
        .map(|v| v.parse::<f64>().map_err(|_| invalid()))
        .collect::<Result<_, _>>()?;

    match values.as_slice() {
        [] => Ok(Transform::identity()),
        [x, y, z, roll, pitch, yaw] => Ok(transform_from_xyz_rpy(*x, *y, *z, *roll, *pitch, *yaw)),
        [x, y, z, qx, qy, qz, qw] => {
            let q = nalgebra::Quaternion::new(*qw, *qx, *qy, *qz);
            if q.norm() == 0.0 {
                return Err(invalid());
            }
            Ok(Isometry3::from_parts(
                Translation3::new(*x, *y, *z),
                UnitQuaternion::from_quaternion(q),
            ))
        }
        _ => Err(invalid()),
    }
}

/// Velocity expressed as linear (m/s) and angular (rad/s) components
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Twist {
    pub linear: Vector3<f64>,
    pub angular: Vector3<f64>,
}

impl Twist {
    /// Interpret a per-second velocity transform as a twist
    pub fn from_transform(velocity: &Transform) -> Self {
        let [x, y, z, roll, pitch, yaw] = xyz_rpy(velocity);
        Self {
            linear: Vector3::new(x, y, z),
            angular: Vector3::new(roll, pitch, yaw),
        }
    }
}

/// What the backend returns for one bundle
#[derive(Debug, Clone, PartialEq)]
pub struct PoseResult {
    /// Estimated pose, `None` when tracking failed
    pub pose: Option<Transform>,

    /// Registration covariance of the last estimate
    pub covariance: Covariance6,

    /// Velocity estimate (per second), if any
    pub velocity: Option<Transform>,

    pub diagnostics: OdomDiagnostics,
}

impl PoseResult {
    pub fn lost(diagnostics: OdomDiagnostics) -> Self {
        Self {
            pose: None,
            covariance: Covariance6::identity() * BAD_COVARIANCE,
            velocity: None,
            diagnostics,
        }
    }

    pub fn tracked(pose: Transform, covariance: Covariance6) -> Self {
        Self {
            pose: Some(pose),
            covariance,
            velocity: None,
            diagnostics: OdomDiagnostics::default(),
        }
    }
}

/// A successful pose estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseUpdate {
    pub stamp: f64,
    pub frame_id: FrameId,
    pub child_frame_id: FrameId,
    pub pose: Transform,
    pub pose_covariance: Covariance6,
    pub twist: Option<Twist>,
    pub twist_covariance: Covariance6,
    pub diagnostics: OdomDiagnostics,
}

/// Tracking failure marker; the session keeps running
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseLost {
    pub stamp: f64,
    pub frame_id: FrameId,
    pub child_frame_id: FrameId,
    pub pose_covariance: Covariance6,
    pub twist_covariance: Covariance6,
}

impl PoseLost {
    pub fn new(stamp: f64, frame_id: FrameId, child_frame_id: FrameId) -> Self {
        let bad = Covariance6::from_diagonal(&Vector6::from_element(BAD_COVARIANCE));
        Self {
            stamp,
            frame_id,
            child_frame_id,
            pose_covariance: bad,
            twist_covariance: bad,
        }
    }
}

/// Everything a session publishes downstream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PoseEvent {
    Update(PoseUpdate),
    Lost(PoseLost),
    /// Transform from the odometry frame to the guess frame keeping both consistent
    Correction {
        stamp: f64,
        parent: FrameId,
        child: FrameId,
        transform: Transform,
    },
}

impl PoseEvent {
    pub fn stamp(&self) -> f64 {
        match self {
            Self::Update(update) => update.stamp,
            Self::Lost(lost) => lost.stamp,
            Self::Correction { stamp, .. } => *stamp,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Update(_) => "update",
            Self::Lost(_) => "lost",
            Self::Correction { .. } => "correction",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xyz_rpy_round_trip() {
        let t = transform_from_xyz_rpy(1.0, -2.0, 0.5, 0.1, -0.2, 0.3);
        let v = xyz_rpy(&t);
        let expected = [1.0, -2.0, 0.5, 0.1, -0.2, 0.3];
        for (a, b) in v.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-9, "{a} != {b}");
        }
    }

    #[test]
    fn test_parse_pose_forms() {
        assert!(is_identity(&parse_pose("").unwrap()));
        assert!(is_identity(&parse_pose("0 0 0 0 0 0").unwrap()));

        let t = parse_pose("1 2 3 0 0 1.5707963267948966").unwrap();
        assert_eq!(t.translation.vector, Vector3::new(1.0, 2.0, 3.0));

        let q = parse_pose("0 0 0 0 0 0 1").unwrap();
        assert!(is_identity(&q));
    }

    #[test]
    fn test_parse_pose_rejects_garbage() {
        assert!(matches!(
            parse_pose("1 2 3"),
            Err(ContractError::InvalidPose { .. })
        ));
        assert!(parse_pose("1 2 3 a b c").is_err());
        assert!(parse_pose("0 0 0 0 0 0 0").is_err());
    }

    #[test]
    fn test_pose_lost_covariance() {
        let lost = PoseLost::new(3.0, "odom".into(), "base_link".into());
        for i in 0..6 {
            assert_eq!(lost.pose_covariance[(i, i)], BAD_COVARIANCE);
            assert_eq!(lost.twist_covariance[(i, i)], BAD_COVARIANCE);
        }
        assert_eq!(lost.pose_covariance[(0, 1)], 0.0);
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let event = PoseEvent::Lost(PoseLost::new(1.5, "odom".into(), "base_link".into()));
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"lost\""));
        assert_eq!(event.stamp(), 1.5);
    }
}
