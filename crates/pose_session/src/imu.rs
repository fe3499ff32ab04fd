//! Orientation bootstrap from a single inertial sample.

use contracts::{ImuSample, Transform};
use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};

/// Which field of the sample initialized the orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapSource {
    Orientation,
    Gravity,
}

/// Initial orientation from `imu`, expressed in the body frame.
///
/// `mount` is the rotation of the IMU frame in the body frame. The absolute
/// orientation is used when set (`orientation · mount⁻¹`); otherwise the
/// rotation taking the measured gravity direction to +z. Returns `None` when
/// neither field carries information.
pub fn bootstrap_orientation(
    imu: &ImuSample,
    mount: &UnitQuaternion<f64>,
) -> Option<(Transform, BootstrapSource)> {
    if imu.has_orientation() {
        let orientation = UnitQuaternion::from_quaternion(imu.orientation);
        let rotation = orientation * mount.inverse();
        return Some((rotation_only(rotation), BootstrapSource::Orientation));
    }

    let gravity = mount * imu.linear_acceleration;
    if gravity.norm() == 0.0 {
        return None;
    }
    let up = Vector3::z();
    let rotation = UnitQuaternion::rotation_between(&gravity.normalize(), &up)
        // Upside down: any half turn about a horizontal axis works
        .unwrap_or_else(|| UnitQuaternion::from_axis_angle(&Vector3::x_axis(), std::f64::consts::PI));
    Some((rotation_only(rotation), BootstrapSource::Gravity))
}

fn rotation_only(rotation: UnitQuaternion<f64>) -> Transform {
    Isometry3::from_parts(Translation3::identity(), rotation)
}
