//! Aligned tuple -> SensorBundle normalization and validation.

use contracts::{
    representative_stamp, CameraInfo, ContractError, ImageData, LineId, OdomSample, RgbdImage,
    SensorBundle, SensorPayload, VisualData, DEPTH_ENCODINGS, RGB_ENCODINGS,
};
use tracing::warn;

use crate::correlator::AlignedTuple;
use crate::shape::{DataKind, ScanKind, SyncShape};

/// Stereo baselines above this (meters) are suspicious
const SUSPICIOUS_BASELINE_M: f64 = 10.0;

/// Builds bundles for one shape; keeps the one-time warning state
#[derive(Debug)]
pub struct BundleAssembler {
    shape: SyncShape,
    baseline_warned: bool,
}

impl BundleAssembler {
    pub fn new(shape: SyncShape) -> Self {
        Self {
            shape,
            baseline_warned: false,
        }
    }

    /// Normalize an aligned tuple into a bundle.
    ///
    /// # Errors
    /// `InvalidBundle` when a slot is missing, carries the wrong payload, or
    /// fails encoding/dimension/calibration checks.
    pub fn assemble(
        &mut self,
        mut tuple: AlignedTuple<SensorPayload>,
    ) -> Result<SensorBundle, ContractError> {
        let mut bundle = SensorBundle::default();
        let mut visual_stamps: Vec<f64> = Vec::with_capacity(4);

        let guess = if self.shape.odom {
            Some(take_as(&mut tuple, LineId::Odom, "odom", |p| match p {
                SensorPayload::Odom(odom) => Some(odom),
                _ => None,
            })?)
        } else {
            None
        };
        let user_data = if self.shape.user_data {
            Some(take_as(&mut tuple, LineId::UserData, "user data", |p| match p {
                SensorPayload::UserData(data) => Some(data),
                _ => None,
            })?)
        } else {
            None
        };

        bundle.visual = match self.shape.data {
            DataKind::Depth => {
                let (rgb_stamp, rgb) = take_image(&mut tuple, LineId::Rgb)?;
                let (depth_stamp, depth) = take_image(&mut tuple, LineId::Depth)?;
                let (_, camera_info) = take_camera_info(&mut tuple, LineId::CameraInfo)?;
                check_rgb_depth(LineId::Depth, &rgb, &depth, &camera_info)?;
                visual_stamps.extend([rgb_stamp, depth_stamp]);
                VisualData::Depth {
                    rgb,
                    depth,
                    camera_info,
                }
            }
            DataKind::Stereo => {
                let (left_stamp, left) = take_image(&mut tuple, LineId::LeftImage)?;
                let (right_stamp, right) = take_image(&mut tuple, LineId::RightImage)?;
                let (_, left_info) = take_camera_info(&mut tuple, LineId::LeftCameraInfo)?;
                let (_, right_info) = take_camera_info(&mut tuple, LineId::RightCameraInfo)?;
                self.check_stereo(&left, &right, &left_info, &right_info)?;
                visual_stamps.extend([left_stamp, right_stamp]);
                VisualData::Stereo {
                    left,
                    right,
                    left_info,
                    right_info,
                }
            }
            DataKind::Rgb => {
                let (stamp, image) = take_image(&mut tuple, LineId::Rgb)?;
                let (_, camera_info) = take_camera_info(&mut tuple, LineId::CameraInfo)?;
                check_rgb_encoding(LineId::Rgb, &image)?;
                check_calibration(LineId::CameraInfo, &camera_info)?;
                visual_stamps.push(stamp);
                VisualData::Rgb { image, camera_info }
            }
            DataKind::Rgbd(count) => {
                let mut cameras: Vec<RgbdImage> = Vec::with_capacity(usize::from(count));
                for index in 0..count {
                    let line = LineId::Rgbd(index);
                    let (stamp, rgbd) = take_as(&mut tuple, line, "rgbd image", |p| match p {
                        SensorPayload::Rgbd(rgbd) => Some(*rgbd),
                        _ => None,
                    })?;
                    check_rgb_depth(line, &rgbd.rgb, &rgbd.depth, &rgbd.camera_info)?;
                    visual_stamps.extend([stamp, rgbd.stamp()]);
                    cameras.push(rgbd);
                }
                VisualData::Rgbd(cameras)
            }
            DataKind::Scan | DataKind::Odom => VisualData::None,
        };

        let scan_stamp = match self.shape.scan {
            ScanKind::None => None,
            ScanKind::Scan2d => {
                let (stamp, scan) = take_as(&mut tuple, LineId::Scan2d, "laser scan", |p| match p {
                    SensorPayload::Scan2d(scan) => Some(scan),
                    _ => None,
                })?;
                bundle.scan2d = Some(scan);
                Some(stamp)
            }
            ScanKind::Scan3d => {
                let (stamp, cloud) =
                    take_as(&mut tuple, LineId::Scan3d, "point cloud", |p| match p {
                        SensorPayload::Scan3d(cloud) => Some(cloud),
                        _ => None,
                    })?;
                bundle.scan3d = Some(cloud);
                Some(stamp)
            }
        };

        let diagnostics = if self.shape.odom_info {
            Some(take_as(&mut tuple, LineId::OdomInfo, "odom info", |p| match p {
                SensorPayload::OdomInfo(info) => Some(info),
                _ => None,
            })?)
        } else {
            None
        };

        // Latest visual constituent wins; otherwise fall back line by line
        let side_stamps = user_data
            .iter()
            .map(|(stamp, _)| *stamp)
            .chain(diagnostics.iter().map(|(stamp, _)| *stamp));
        bundle.stamp = representative_stamp(visual_stamps)
            .or(scan_stamp)
            .or(guess.as_ref().map(|(stamp, _)| *stamp))
            .or_else(|| representative_stamp(side_stamps))
            .unwrap_or_default();

        bundle.guess = guess.map(|(_, odom): (f64, OdomSample)| odom);
        bundle.user_data = user_data.map(|(_, data)| data);
        bundle.diagnostics = diagnostics.map(|(_, info)| info);
        Ok(bundle)
    }

    fn check_stereo(
        &mut self,
        left: &ImageData,
        right: &ImageData,
        left_info: &CameraInfo,
        right_info: &CameraInfo,
    ) -> Result<(), ContractError> {
        check_rgb_encoding(LineId::LeftImage, left)?;
        check_rgb_encoding(LineId::RightImage, right)?;
        if left.width != right.width || left.height != right.height {
            return Err(ContractError::invalid_bundle(
                LineId::RightImage,
                format!(
                    "left and right images must have the same size (left={}x{}, right={}x{})",
                    left.width, left.height, right.width, right.height
                ),
            ));
        }
        check_calibration(LineId::LeftCameraInfo, left_info)?;
        check_calibration(LineId::RightCameraInfo, right_info)?;

        let baseline = right_info.baseline();
        if baseline <= 0.0 {
            return Err(ContractError::invalid_bundle(
                LineId::RightCameraInfo,
                format!(
                    "invalid stereo baseline {baseline:.4} m (tx={}, fx={}); the right camera info must carry tx = -fx * baseline",
                    right_info.tx, right_info.fx
                ),
            ));
        }
        if baseline > SUSPICIOUS_BASELINE_M && !self.baseline_warned {
            self.baseline_warned = true;
            warn!(
                baseline,
                "Stereo baseline is suspiciously large, check the right camera calibration. \
                 This message will appear only once."
            );
        }
        Ok(())
    }
}

fn take_as<P>(
    tuple: &mut AlignedTuple<SensorPayload>,
    line: LineId,
    expected: &str,
    extract: impl FnOnce(SensorPayload) -> Option<P>,
) -> Result<(f64, P), ContractError> {
    let item = tuple
        .take(line)
        .ok_or_else(|| ContractError::invalid_bundle(line, format!("missing {expected}")))?;
    let (line, stamp, payload) = item.into_parts();
    let kind = payload.kind();
    extract(payload)
        .map(|payload| (stamp, payload))
        .ok_or_else(|| {
            ContractError::invalid_bundle(line, format!("expected {expected}, got {kind}"))
        })
}

fn take_image(
    tuple: &mut AlignedTuple<SensorPayload>,
    line: LineId,
) -> Result<(f64, ImageData), ContractError> {
    take_as(tuple, line, "image", |p| match p {
        SensorPayload::Image(image) => Some(image),
        _ => None,
    })
}

fn take_camera_info(
    tuple: &mut AlignedTuple<SensorPayload>,
    line: LineId,
) -> Result<(f64, CameraInfo), ContractError> {
    take_as(tuple, line, "camera info", |p| match p {
        SensorPayload::CameraInfo(info) => Some(info),
        _ => None,
    })
}

fn check_rgb_encoding(line: LineId, image: &ImageData) -> Result<(), ContractError> {
    if image.has_rgb_encoding() {
        return Ok(());
    }
    Err(ContractError::invalid_bundle(
        line,
        format!(
            "unsupported encoding '{}' (expected one of {})",
            image.encoding,
            RGB_ENCODINGS.join(", ")
        ),
    ))
}

fn check_calibration(line: LineId, info: &CameraInfo) -> Result<(), ContractError> {
    if info.fx == 0.0 {
        return Err(ContractError::invalid_bundle(
            line,
            "camera info is not calibrated (fx = 0)",
        ));
    }
    Ok(())
}

fn check_rgb_depth(
    line: LineId,
    rgb: &ImageData,
    depth: &ImageData,
    info: &CameraInfo,
) -> Result<(), ContractError> {
    check_rgb_encoding(line, rgb)?;
    if !depth.has_depth_encoding() {
        return Err(ContractError::invalid_bundle(
            line,
            format!(
                "unsupported depth encoding '{}' (expected one of {})",
                depth.encoding,
                DEPTH_ENCODINGS.join(", ")
            ),
        ));
    }
    if !divides_evenly(rgb.width, depth.width) || !divides_evenly(rgb.height, depth.height) {
        return Err(ContractError::invalid_bundle(
            line,
            format!(
                "rgb size {}x{} and depth size {}x{} must be multiples of each other",
                rgb.width, rgb.height, depth.width, depth.height
            ),
        ));
    }
    check_calibration(line, info)
}

fn divides_evenly(a: u32, b: u32) -> bool {
    let (small, large) = if a <= b { (a, b) } else { (b, a) };
    small > 0 && large % small == 0
}
