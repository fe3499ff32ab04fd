//! Input line identifiers
//!
//! Every timestamped item enters the system on exactly one line. Lines are a
//! closed set, so they are modelled as an enum instead of free-form strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum number of pre-packed RGBD camera lines
pub const MAX_RGBD_CAMERAS: u8 = 4;

/// Input line identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineId {
    /// External odometry used as motion guess
    Odom,
    /// User-supplied side-channel data
    UserData,
    /// Color (or mono) image of a depth triplet or rgb-only setup
    Rgb,
    /// Registered depth image
    Depth,
    /// Calibration of the rgb camera
    CameraInfo,
    /// Left rectified stereo image
    LeftImage,
    /// Right rectified stereo image
    RightImage,
    /// Left stereo calibration
    LeftCameraInfo,
    /// Right stereo calibration
    RightCameraInfo,
    /// Pre-packed RGBD bundle, indexed 0..4
    Rgbd(u8),
    /// 2-D laser scan
    Scan2d,
    /// 3-D point cloud scan
    Scan3d,
    /// Pose-estimator diagnostics
    OdomInfo,
    /// Inertial samples (never correlated, routed to the session directly)
    Imu,
}

impl LineId {
    /// Conventional topic name of the line
    pub fn topic(&self) -> String {
        match self {
            Self::Odom => "odom".to_string(),
            Self::UserData => "user_data".to_string(),
            Self::Rgb => "rgb/image".to_string(),
            Self::Depth => "depth/image".to_string(),
            Self::CameraInfo => "rgb/camera_info".to_string(),
            Self::LeftImage => "left/image_rect".to_string(),
            Self::RightImage => "right/image_rect".to_string(),
            Self::LeftCameraInfo => "left/camera_info".to_string(),
            Self::RightCameraInfo => "right/camera_info".to_string(),
            Self::Rgbd(0) => "rgbd_image".to_string(),
            Self::Rgbd(index) => format!("rgbd_image{index}"),
            Self::Scan2d => "scan".to_string(),
            Self::Scan3d => "scan_cloud".to_string(),
            Self::OdomInfo => "odom_info".to_string(),
            Self::Imu => "imu".to_string(),
        }
    }

    /// Whether the line carries image data
    pub fn is_visual(&self) -> bool {
        matches!(
            self,
            Self::Rgb
                | Self::Depth
                | Self::CameraInfo
                | Self::LeftImage
                | Self::RightImage
                | Self::LeftCameraInfo
                | Self::RightCameraInfo
                | Self::Rgbd(_)
        )
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.topic())
    }
}

impl FromStr for LineId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = match s {
            "odom" => Self::Odom,
            "user_data" => Self::UserData,
            "rgb" | "rgb/image" => Self::Rgb,
            "depth" | "depth/image" => Self::Depth,
            "camera_info" | "rgb/camera_info" => Self::CameraInfo,
            "left" | "left/image_rect" => Self::LeftImage,
            "right" | "right/image_rect" => Self::RightImage,
            "left_info" | "left/camera_info" => Self::LeftCameraInfo,
            "right_info" | "right/camera_info" => Self::RightCameraInfo,
            "rgbd" | "rgbd_image" => Self::Rgbd(0),
            "scan" | "scan2d" => Self::Scan2d,
            "scan_cloud" | "scan3d" => Self::Scan3d,
            "odom_info" => Self::OdomInfo,
            "imu" => Self::Imu,
            other => {
                let index = other
                    .strip_prefix("rgbd_image")
                    .or_else(|| other.strip_prefix("rgbd"))
                    .and_then(|rest| rest.parse::<u8>().ok())
                    .filter(|index| *index < MAX_RGBD_CAMERAS)
                    .ok_or_else(|| format!("unknown line '{other}'"))?;
                Self::Rgbd(index)
            }
        };
        Ok(line)
    }
}
