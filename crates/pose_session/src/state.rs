//! Session state, dispositions and counters.

use contracts::{SensorBundle, Transform};
use serde::Serialize;

/// Mutable state owned by one [`crate::PoseSession`]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PoseSessionState {
    /// Composed motion guess not yet handed to the backend
    pub guess: Option<Transform>,

    /// Last guess-source sample
    pub guess_prev: Option<Transform>,

    /// Stamp of the last accepted image/scan bundle (0 = none)
    pub last_stamp: f64,

    pub countdown: u32,

    pub paused: bool,

    /// Data bundle waiting for the inertial stream to catch up
    pub buffered: Option<SensorBundle>,

    /// Stamp of the last forwarded inertial sample (0 = none)
    pub last_imu_stamp: f64,

    pub imu_processed: bool,
}

impl PoseSessionState {
    pub fn new(countdown: u32) -> Self {
        Self {
            countdown,
            ..Default::default()
        }
    }
}

/// Externally visible session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Active,
    Paused,
    /// Data is ignored until an inertial sample initialized the orientation
    AwaitingImuBootstrap,
}

/// What happened to one input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Session paused, input ignored
    Paused,
    /// Waiting for the inertial bootstrap
    AwaitingImu,
    /// Held until the inertial stream reaches its stamp
    Buffered,
    /// Stamp not newer than the last accepted one
    Stale,
    /// Faster than the expected update rate
    RateLimited,
    /// Guess frame configured but not available
    GuessUnavailable,
    /// Not enough motion since the last estimate, backend skipped
    Gated,
    /// Backend produced a pose
    Estimated,
    /// Backend failed on real data
    Lost,
    /// Inertial-only input consumed without estimate
    ImuOnly,
    /// Orientation initialized from an inertial sample
    Bootstrapped,
    /// Input not usable by this session
    Ignored,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paused => "paused",
            Self::AwaitingImu => "awaiting_imu",
            Self::Buffered => "buffered",
            Self::Stale => "stale",
            Self::RateLimited => "rate_limited",
            Self::GuessUnavailable => "guess_unavailable",
            Self::Gated => "gated",
            Self::Estimated => "estimated",
            Self::Lost => "lost",
            Self::ImuOnly => "imu_only",
            Self::Bootstrapped => "bootstrapped",
            Self::Ignored => "ignored",
        }
    }

    /// Input dropped by an ordering or rate gate
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Stale | Self::RateLimited)
    }
}

impl std::fmt::Display for Disposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub estimates: u64,
    pub lost: u64,
    pub stale: u64,
    pub rate_limited: u64,
    pub gated: u64,
    pub auto_resets: u64,
    pub imu_overwrites: u64,
    pub bootstraps: u64,
}
