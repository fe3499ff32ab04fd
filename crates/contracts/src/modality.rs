//! ModalitySet - which input streams are active for a session
//!
//! Built once from configuration and immutable afterwards. The set decides
//! which synchronization shape the engine instantiates.

use serde::{Deserialize, Serialize};

use crate::{ContractError, MAX_RGBD_CAMERAS};

/// Queryable modality kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Depth,
    Stereo,
    Rgb,
    Rgbd,
    Scan2d,
    Scan3d,
    OdomGuess,
    SideData,
    Diagnostics,
}

/// Primary visual modality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryVisual {
    None,
    Depth,
    Stereo,
    Rgb,
    Rgbd(u8),
}

/// Declared set of active streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModalitySet {
    pub has_depth: bool,
    pub has_stereo: bool,
    pub has_rgb: bool,
    pub rgbd_count: u8,
    pub has_scan2d: bool,
    pub has_scan3d: bool,
    pub has_odom_guess: bool,
    pub has_side_data: bool,
    pub has_diagnostics: bool,
    /// Closest-match alignment instead of exact timestamps
    pub sync_tolerant: bool,
    /// Per-line buffer capacity
    pub queue_depth: usize,
}

impl Default for ModalitySet {
    fn default() -> Self {
        Self {
            has_depth: false,
            has_stereo: false,
            has_rgb: false,
            rgbd_count: 0,
            has_scan2d: false,
            has_scan3d: false,
            has_odom_guess: false,
            has_side_data: false,
            has_diagnostics: false,
            sync_tolerant: true,
            queue_depth: 10,
        }
    }
}

impl ModalitySet {
    /// Check the structural invariants.
    ///
    /// # Errors
    /// `InvalidModality` naming the first violated rule.
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.rgbd_count > MAX_RGBD_CAMERAS {
            return Err(ContractError::invalid_modality(format!(
                "rgbd_count={} exceeds the maximum of {MAX_RGBD_CAMERAS} cameras",
                self.rgbd_count
            )));
        }

        let primaries = [
            self.has_depth,
            self.has_stereo,
            self.has_rgb,
            self.rgbd_count > 0,
        ]
        .iter()
        .filter(|active| **active)
        .count();
        if primaries > 1 {
            return Err(ContractError::invalid_modality(format!(
                "more than one primary visual modality selected (depth={}, stereo={}, rgb={}, rgbd_count={})",
                self.has_depth, self.has_stereo, self.has_rgb, self.rgbd_count
            )));
        }

        if self.has_scan2d && self.has_scan3d {
            return Err(ContractError::invalid_modality(
                "scan2d and scan3d cannot both be active",
            ));
        }

        if !self.is_data_subscribed() {
            return Err(ContractError::invalid_modality(
                "no data line selected (need a visual modality, a scan or odometry)",
            ));
        }

        if self.queue_depth == 0 {
            return Err(ContractError::invalid_modality("queue_depth must be >= 1"));
        }

        Ok(())
    }

    /// The primary visual modality (call after `validate`)
    pub fn primary(&self) -> PrimaryVisual {
        if self.has_depth {
            PrimaryVisual::Depth
        } else if self.has_stereo {
            PrimaryVisual::Stereo
        } else if self.has_rgb {
            PrimaryVisual::Rgb
        } else if self.rgbd_count > 0 {
            PrimaryVisual::Rgbd(self.rgbd_count)
        } else {
            PrimaryVisual::None
        }
    }

    pub fn is_active(&self, modality: Modality) -> bool {
        match modality {
            Modality::Depth => self.has_depth,
            Modality::Stereo => self.has_stereo,
            Modality::Rgb => self.has_rgb,
            Modality::Rgbd => self.rgbd_count > 0,
            Modality::Scan2d => self.has_scan2d,
            Modality::Scan3d => self.has_scan3d,
            Modality::OdomGuess => self.has_odom_guess,
            Modality::SideData => self.has_side_data,
            Modality::Diagnostics => self.has_diagnostics,
        }
    }

    /// Whether any line carrying pose-relevant data is active
    pub fn is_data_subscribed(&self) -> bool {
        self.has_depth
            || self.has_stereo
            || self.has_rgb
            || self.rgbd_count > 0
            || self.has_scan2d
            || self.has_scan3d
            || self.has_odom_guess
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depth_scan() -> ModalitySet {
        ModalitySet {
            has_depth: true,
            has_scan2d: true,
            has_odom_guess: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_depth_scan() {
        let set = depth_scan();
        assert!(set.validate().is_ok());
        assert_eq!(set.primary(), PrimaryVisual::Depth);
        assert!(set.is_active(Modality::Scan2d));
        assert!(!set.is_active(Modality::Rgbd));
    }

    #[test]
    fn test_two_primaries_rejected() {
        let set = ModalitySet {
            has_depth: true,
            rgbd_count: 1,
            ..Default::default()
        };
        let err = set.validate().unwrap_err();
        assert!(err.to_string().contains("more than one primary"));
    }

    #[test]
    fn test_two_scans_rejected() {
        let set = ModalitySet {
            has_scan2d: true,
            has_scan3d: true,
            ..Default::default()
        };
        assert!(matches!(
            set.validate(),
            Err(ContractError::InvalidModality { .. })
        ));
    }

    #[test]
    fn test_too_many_rgbd() {
        let set = ModalitySet {
            rgbd_count: 5,
            ..Default::default()
        };
        assert!(set.validate().unwrap_err().to_string().contains("rgbd_count=5"));
    }

    #[test]
    fn test_side_data_alone_is_not_enough() {
        let set = ModalitySet {
            has_side_data: true,
            has_diagnostics: true,
            ..Default::default()
        };
        assert!(!set.is_data_subscribed());
        assert!(set.validate().is_err());
    }

    #[test]
    fn test_zero_queue_depth() {
        let set = ModalitySet {
            queue_depth: 0,
            ..depth_scan()
        };
        assert!(set.validate().is_err());
    }
}
