//! SensorBundle - output of the synchronization engine
//!
//! One bundle is one logical processing instant for the pose session.

use serde::{Deserialize, Serialize};

use crate::{
    CameraInfo, ImageData, ImuSample, LaserScan, OdomDiagnostics, OdomSample, PointCloudData,
    RgbdImage, UserData,
};

/// Primary visual payload of a bundle
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum VisualData {
    /// No visual data (scan-only, odom-only or IMU bundles)
    #[default]
    None,
    /// rgb + registered depth + calibration
    Depth {
        rgb: ImageData,
        depth: ImageData,
        camera_info: CameraInfo,
    },
    /// Rectified stereo pair
    Stereo {
        left: ImageData,
        right: ImageData,
        left_info: CameraInfo,
        right_info: CameraInfo,
    },
    /// Monocular image
    Rgb {
        image: ImageData,
        camera_info: CameraInfo,
    },
    /// One to four pre-packed RGBD cameras
    Rgbd(Vec<RgbdImage>),
}

impl VisualData {
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// Normalized aligned output of the synchronization engine
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorBundle {
    /// Representative timestamp (latest visual constituent)
    pub stamp: f64,

    /// Synchronized external odometry sample used as guess source
    pub guess: Option<OdomSample>,

    pub user_data: Option<UserData>,

    pub visual: VisualData,

    pub scan2d: Option<LaserScan>,

    pub scan3d: Option<PointCloudData>,

    pub diagnostics: Option<OdomDiagnostics>,

    /// Inertial sample (async IMU path only)
    pub imu: Option<ImuSample>,
}

impl SensorBundle {
    /// Degenerate bundle carrying a single inertial sample
    pub fn imu_only(stamp: f64, imu: ImuSample) -> Self {
        Self {
            stamp,
            imu: Some(imu),
            ..Default::default()
        }
    }

    /// Whether the bundle carries image or scan data
    pub fn has_image_or_scan(&self) -> bool {
        !self.visual.is_none() || self.scan2d.is_some() || self.scan3d.is_some()
    }

    /// Only an inertial sample: no image, scan, odometry, user data or diagnostics.
    ///
    /// Everything else is data for the ordering gate and failure accounting.
    pub fn is_inertial_only(&self) -> bool {
        self.has_imu()
            && !self.has_image_or_scan()
            && self.guess.is_none()
            && self.user_data.is_none()
            && self.diagnostics.is_none()
    }

    pub fn has_imu(&self) -> bool {
        self.imu.is_some()
    }
}

/// Latest-constituent-wins stamp: the maximum of the given stamps, `None` when empty.
pub fn representative_stamp(stamps: impl IntoIterator<Item = f64>) -> Option<f64> {
    stamps.into_iter().fold(None, |acc, stamp| match acc {
        Some(current) if current >= stamp => Some(current),
        _ => Some(stamp),
    })
}
