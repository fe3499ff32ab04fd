//! Motion guess composition and minimal-motion gating.

use contracts::{xyz_rpy, SessionConfig, Transform};

/// Chain the motion between two guess-source samples onto the pending guess:
/// `guess · previous⁻¹ · current`.
pub fn compose(pending: Option<Transform>, previous: &Transform, current: &Transform) -> Transform {
    let increment = previous.inverse() * current;
    match pending {
        Some(guess) => guess * increment,
        None => increment,
    }
}

/// Skips the backend while the guess reports too little motion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionGate {
    min_translation: f64,
    min_rotation: f64,
    min_time: f64,
}

impl MotionGate {
    pub fn new(min_translation: f64, min_rotation: f64, min_time: f64) -> Self {
        Self {
            min_translation,
            min_rotation,
            min_time,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(
            config.guess_min_translation,
            config.guess_min_rotation,
            config.guess_min_time,
        )
    }

    /// Gating needs at least one motion threshold
    pub fn is_enabled(&self) -> bool {
        self.min_translation > 0.0 || self.min_rotation > 0.0
    }

    /// Whether the update at `stamp` can be skipped.
    ///
    /// Thresholds <= 0 count as satisfied. The time condition holds when no
    /// minimal time is set, or when the last accepted stamp is recent enough.
    pub fn should_skip(&self, guess: &Transform, stamp: f64, last_stamp: f64) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let [x, y, z, roll, pitch, yaw] = xyz_rpy(guess);
        let translation = x.abs().max(y.abs()).max(z.abs());
        let rotation = roll.abs().max(pitch.abs()).max(yaw.abs());

        let small_translation = self.min_translation <= 0.0 || translation < self.min_translation;
        let small_rotation = self.min_rotation <= 0.0 || rotation < self.min_rotation;
        let recent =
            self.min_time <= 0.0 || (last_stamp > 0.0 && stamp - last_stamp < self.min_time);

        small_translation && small_rotation && recent
    }
}
