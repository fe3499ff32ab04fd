//! Covariance shaping for published estimates.

use contracts::{Covariance6, BAD_COVARIANCE};
use nalgebra::Vector6;

/// Pose variances: twice the registration variances (diagonal only)
pub fn pose_covariance(registration: &Covariance6) -> Covariance6 {
    Covariance6::from_diagonal(&(registration.diagonal() * 2.0))
}

/// Twist variances: the registration variances, or [`BAD_COVARIANCE`] without velocity
pub fn twist_covariance(registration: &Covariance6, has_velocity: bool) -> Covariance6 {
    if has_velocity {
        Covariance6::from_diagonal(&registration.diagonal())
    } else {
        Covariance6::from_diagonal(&Vector6::from_element(BAD_COVARIANCE))
    }
}
