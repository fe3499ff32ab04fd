//! Synchronization shape table.
//!
//! A shape is the data-driven description of which lines are aligned together.
//! Selecting it is a pure function of the [`ModalitySet`], evaluated once.

use std::fmt;

use contracts::{ContractError, LineId, ModalitySet, PrimaryVisual, MAX_RGBD_CAMERAS};
use serde::{Deserialize, Serialize};

use crate::correlator::LineSpec;

/// Data kind driving a shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    Depth,
    Stereo,
    Rgb,
    /// Pre-packed RGBD cameras (1..=4)
    Rgbd(u8),
    /// Scan-only (the scan kind is carried by [`ScanKind`])
    Scan,
    /// Odometry-only
    Odom,
}

/// Scan line of a shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanKind {
    #[default]
    None,
    Scan2d,
    Scan3d,
}

impl ScanKind {
    fn line(self) -> Option<LineId> {
        match self {
            Self::None => None,
            Self::Scan2d => Some(LineId::Scan2d),
            Self::Scan3d => Some(LineId::Scan3d),
        }
    }
}

/// One entry of the shape table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncShape {
    pub data: DataKind,
    /// External odometry line (always set for [`DataKind::Odom`])
    pub odom: bool,
    pub user_data: bool,
    pub scan: ScanKind,
    pub odom_info: bool,
}

impl SyncShape {
    /// Map a modality set to exactly one shape.
    ///
    /// # Errors
    /// `InvalidModality` when the set is structurally invalid (several primary
    /// visual modalities, both scan kinds, nothing to synchronize...).
    pub fn select(set: &ModalitySet) -> Result<Self, ContractError> {
        set.validate()?;

        let scan = if set.has_scan2d {
            ScanKind::Scan2d
        } else if set.has_scan3d {
            ScanKind::Scan3d
        } else {
            ScanKind::None
        };

        let data = match set.primary() {
            PrimaryVisual::Depth => DataKind::Depth,
            PrimaryVisual::Stereo => DataKind::Stereo,
            PrimaryVisual::Rgb => DataKind::Rgb,
            PrimaryVisual::Rgbd(count) => DataKind::Rgbd(count),
            PrimaryVisual::None if scan != ScanKind::None => DataKind::Scan,
            PrimaryVisual::None => DataKind::Odom,
        };

        Ok(Self {
            data,
            odom: set.has_odom_guess || data == DataKind::Odom,
            user_data: set.has_side_data,
            scan,
            odom_info: set.has_diagnostics,
        })
    }

    /// Every shape of the table
    pub fn all() -> Vec<Self> {
        let mut shapes = Vec::with_capacity(188);
        let mut visual = vec![DataKind::Depth, DataKind::Stereo, DataKind::Rgb];
        visual.extend((1..=MAX_RGBD_CAMERAS).map(DataKind::Rgbd));

        for data in visual {
            for scan in [ScanKind::None, ScanKind::Scan2d, ScanKind::Scan3d] {
                for (odom, user_data, odom_info) in flag_combinations() {
                    shapes.push(Self {
                        data,
                        odom,
                        user_data,
                        scan,
                        odom_info,
                    });
                }
            }
        }

        for scan in [ScanKind::Scan2d, ScanKind::Scan3d] {
            for (odom, user_data, odom_info) in flag_combinations() {
                shapes.push(Self {
                    data: DataKind::Scan,
                    odom,
                    user_data,
                    scan,
                    odom_info,
                });
            }
        }

        for user_data in [false, true] {
            for odom_info in [false, true] {
                shapes.push(Self {
                    data: DataKind::Odom,
                    odom: true,
                    user_data,
                    scan: ScanKind::None,
                    odom_info,
                });
            }
        }

        shapes
    }

    /// Ordered lines: odom, user data, visual lines, scan, diagnostics
    pub fn lines(&self) -> Vec<LineId> {
        let mut lines = Vec::with_capacity(8);
        if self.odom {
            lines.push(LineId::Odom);
        }
        if self.user_data {
            lines.push(LineId::UserData);
        }
        match self.data {
            DataKind::Depth => {
                lines.extend([LineId::Rgb, LineId::Depth, LineId::CameraInfo]);
            }
            DataKind::Stereo => lines.extend([
                LineId::LeftImage,
                LineId::RightImage,
                LineId::LeftCameraInfo,
                LineId::RightCameraInfo,
            ]),
            DataKind::Rgb => lines.extend([LineId::Rgb, LineId::CameraInfo]),
            DataKind::Rgbd(count) => lines.extend((0..count).map(LineId::Rgbd)),
            DataKind::Scan | DataKind::Odom => {}
        }
        if let Some(scan) = self.scan.line() {
            lines.push(scan);
        }
        if self.odom_info {
            lines.push(LineId::OdomInfo);
        }
        lines
    }

    /// Correlator descriptors; every subscribed line gates emission
    pub fn line_specs(&self) -> Vec<LineSpec> {
        self.lines().into_iter().map(LineSpec::required).collect()
    }

    /// Single-line shapes bypass correlation
    pub fn is_direct(&self) -> bool {
        self.lines().len() == 1
    }

    pub fn name(&self) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(5);
        if self.odom {
            parts.push("odom".into());
        }
        if self.user_data {
            parts.push("user_data".into());
        }
        match self.data {
            DataKind::Depth => parts.push("depth".into()),
            DataKind::Stereo => parts.push("stereo".into()),
            DataKind::Rgb => parts.push("rgb".into()),
            DataKind::Rgbd(1) => parts.push("rgbd".into()),
            DataKind::Rgbd(count) => parts.push(format!("rgbd{count}")),
            DataKind::Scan | DataKind::Odom => {}
        }
        match self.scan {
            ScanKind::None => {}
            ScanKind::Scan2d => parts.push("scan2d".into()),
            ScanKind::Scan3d => parts.push("scan3d".into()),
        }
        if self.odom_info {
            parts.push("odom_info".into());
        }
        parts.join("+")
    }
}

impl fmt::Display for SyncShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

fn flag_combinations() -> impl Iterator<Item = (bool, bool, bool)> {
    (0u8..8).map(|bits| (bits & 1 != 0, bits & 2 != 0, bits & 4 != 0))
}
