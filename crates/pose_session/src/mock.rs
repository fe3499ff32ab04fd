//! Mock backends and pose sources
//!
//! 用于无真实位姿估计器环境的演示与测试。

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use contracts::{
    BackendConfig, Covariance6, FrameId, OdomDiagnostics, PoseBackend, PoseResult,
    PoseSourceLookup, SensorBundle, Transform,
};
use tracing::trace;

/// 航位推算后端
///
/// 以运动猜测 (或同步的外部里程计) 积分位姿；每 `fail_every` 帧模拟一次跟踪失败。
#[derive(Debug, Clone)]
pub struct DeadReckoningBackend {
    pose: Transform,
    frames: u64,
    fail_every: u32,
    async_imu: bool,
    min_inliers: u32,
    last_guess_sample: Option<Transform>,
}

impl DeadReckoningBackend {
    pub fn new(fail_every: u32, async_imu: bool, min_inliers: u32) -> Self {
        Self {
            pose: Transform::identity(),
            frames: 0,
            fail_every,
            async_imu,
            min_inliers,
            last_guess_sample: None,
        }
    }

    /// 由配置创建
    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(config.fail_every, config.async_imu, config.min_inliers)
    }

    /// Motion of this frame: the session guess, else the synchronized odometry increment
    fn motion(&mut self, bundle: &SensorBundle, guess: Option<&Transform>) -> Transform {
        let sample = bundle.guess.as_ref().map(|odom| odom.pose);
        let from_sample = match (self.last_guess_sample, sample) {
            (Some(previous), Some(current)) => Some(previous.inverse() * current),
            _ => None,
        };
        if sample.is_some() {
            self.last_guess_sample = sample;
        }
        guess.copied().or(from_sample).unwrap_or_else(Transform::identity)
    }
}

impl PoseBackend for DeadReckoningBackend {
    fn process(&mut self, bundle: &SensorBundle, guess: Option<&Transform>) -> PoseResult {
        if !bundle.has_image_or_scan() && bundle.guess.is_none() {
            // Inertial-only input: consumed, no estimate
            return PoseResult::lost(OdomDiagnostics::default());
        }

        self.frames += 1;
        let motion = self.motion(bundle, guess);

        if self.fail_every > 0 && self.frames % u64::from(self.fail_every) == 0 {
            trace!(frame = self.frames, "simulated tracking failure");
            return PoseResult::lost(OdomDiagnostics {
                lost: true,
                ..Default::default()
            });
        }

        self.pose *= motion;
        let inliers = self.min_inliers * 2;
        PoseResult {
            pose: Some(self.pose),
            covariance: Covariance6::identity() * 0.001,
            velocity: Some(motion),
            diagnostics: OdomDiagnostics {
                lost: false,
                matches: inliers + inliers / 2,
                inliers,
                features: inliers * 4,
                local_map_size: inliers * 10,
                time_estimation: 0.0,
                distance_travelled: 0.0,
            },
        }
    }

    fn reset(&mut self, pose: &Transform) {
        self.pose = *pose;
        self.frames = 0;
        self.last_guess_sample = None;
    }

    fn pose(&self) -> Transform {
        self.pose
    }

    fn frames_processed(&self) -> u64 {
        self.frames
    }

    fn can_consume_async_imu(&self) -> bool {
        self.async_imu
    }
}

/// Backend replaying a fixed script of outcomes; records every call
#[derive(Debug, Clone)]
pub struct ScriptedBackend {
    script: VecDeque<Option<Transform>>,
    pose: Transform,
    frames: u64,
    async_imu: bool,
    /// Stamps of the bundles handed to `process`
    pub processed: Vec<f64>,
    /// Guess passed with each `process` call
    pub guesses: Vec<Option<Transform>>,
    /// Poses passed to `reset`
    pub resets: Vec<Transform>,
}

impl ScriptedBackend {
    /// Outcomes are consumed in order; an exhausted script keeps succeeding at the current pose
    pub fn new(script: impl IntoIterator<Item = Option<Transform>>) -> Self {
        Self {
            script: script.into_iter().collect(),
            pose: Transform::identity(),
            frames: 0,
            async_imu: false,
            processed: Vec::new(),
            guesses: Vec::new(),
            resets: Vec::new(),
        }
    }

    pub fn with_async_imu(mut self) -> Self {
        self.async_imu = true;
        self
    }

    pub fn push(&mut self, outcome: Option<Transform>) {
        self.script.push_back(outcome);
    }
}

impl PoseBackend for ScriptedBackend {
    fn process(&mut self, bundle: &SensorBundle, guess: Option<&Transform>) -> PoseResult {
        self.processed.push(bundle.stamp);
        self.guesses.push(guess.copied());
        if !bundle.has_image_or_scan() && bundle.has_imu() {
            return PoseResult::lost(OdomDiagnostics::default());
        }

        self.frames += 1;
        match self.script.pop_front().unwrap_or(Some(self.pose)) {
            Some(pose) => {
                self.pose = pose;
                PoseResult::tracked(pose, Covariance6::identity() * 0.01)
            }
            None => PoseResult::lost(OdomDiagnostics {
                lost: true,
                ..Default::default()
            }),
        }
    }

    fn reset(&mut self, pose: &Transform) {
        self.resets.push(*pose);
        self.pose = *pose;
        self.frames = 0;
    }

    fn pose(&self) -> Transform {
        self.pose
    }

    fn frames_processed(&self) -> u64 {
        self.frames
    }

    fn can_consume_async_imu(&self) -> bool {
        self.async_imu
    }
}

/// In-memory transform table
#[derive(Debug, Clone, Default)]
pub struct StaticLookup {
    transforms: HashMap<(FrameId, FrameId), Transform>,
}

impl StaticLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(
        mut self,
        target: impl Into<FrameId>,
        source: impl Into<FrameId>,
        transform: Transform,
    ) -> Self {
        self.set(target, source, transform);
        self
    }

    pub fn set(
        &mut self,
        target: impl Into<FrameId>,
        source: impl Into<FrameId>,
        transform: Transform,
    ) {
        self.transforms
            .insert((target.into(), source.into()), transform);
    }

    pub fn remove(&mut self, target: impl Into<FrameId>, source: impl Into<FrameId>) {
        self.transforms.remove(&(target.into(), source.into()));
    }
}

impl PoseSourceLookup for StaticLookup {
    fn lookup(
        &self,
        target: &FrameId,
        source: &FrameId,
        _stamp: f64,
        _timeout: Duration,
    ) -> Option<Transform> {
        self.transforms
            .get(&(target.clone(), source.clone()))
            .copied()
    }
}
