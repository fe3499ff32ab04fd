//! Pose session state machine.
//!
//! Consumes aligned bundles and inertial samples strictly sequentially,
//! drives the backend and queues the resulting [`PoseEvent`]s.

use std::time::Instant;

use contracts::{
    is_identity, ContractError, FrameId, ImuSample, PoseBackend, PoseEvent, PoseLost,
    PoseSourceLookup, PoseUpdate, SensorBundle, SessionConfig, Transform, Twist,
};
use nalgebra::UnitQuaternion;
use tracing::{debug, error, info, instrument, warn};

use crate::covariance::{pose_covariance, twist_covariance};
use crate::guess::{compose, MotionGate};
use crate::imu::{bootstrap_orientation, BootstrapSource};
use crate::state::{Disposition, PoseSessionState, SessionState, SessionStats};

/// One odometry session over a backend and an external pose source
#[derive(Debug)]
pub struct PoseSession<B, L> {
    config: SessionConfig,
    backend: B,
    lookup: L,
    initial_pose: Transform,
    gate: MotionGate,
    state: PoseSessionState,
    events: Vec<PoseEvent>,
    stats: SessionStats,
    stale_warned: bool,
}

impl<B: PoseBackend, L: PoseSourceLookup> PoseSession<B, L> {
    /// Create a session; the backend is seeded with the configured initial pose.
    ///
    /// # Errors
    /// `InvalidPose` if `initial_pose` cannot be parsed.
    pub fn new(config: SessionConfig, mut backend: B, lookup: L) -> Result<Self, ContractError> {
        let initial_pose = config.initial_pose()?;
        if !is_identity(&initial_pose) {
            info!(initial_pose = %config.initial_pose, "seeding odometry with the initial pose");
            backend.reset(&initial_pose);
        }

        Ok(Self {
            gate: MotionGate::from_config(&config),
            state: PoseSessionState::new(config.reset_countdown),
            config,
            backend,
            lookup,
            initial_pose,
            events: Vec::new(),
            stats: SessionStats::default(),
            stale_warned: false,
        })
    }

    /// Process one aligned bundle.
    #[instrument(
        level = "trace",
        name = "pose_session_process",
        skip(self, bundle),
        fields(stamp = bundle.stamp)
    )]
    pub fn process(&mut self, bundle: SensorBundle) -> Disposition {
        if self.state.paused {
            return self.finish(Disposition::Paused);
        }
        let disposition = self.process_data(bundle);
        self.finish(disposition)
    }

    /// Process one inertial sample.
    ///
    /// Backends that consume inertial data continuously get every sample as
    /// its own bundle, followed by the buffered data bundle once the sample
    /// stamp caught up with it. Other backends only use a sample to
    /// initialize the orientation while the pose is still identity.
    #[instrument(
        level = "trace",
        name = "pose_session_imu",
        skip(self, imu),
        fields(frame = %imu.frame_id)
    )]
    pub fn process_imu(&mut self, stamp: f64, imu: ImuSample) -> Disposition {
        if self.state.paused {
            return self.finish(Disposition::Paused);
        }

        let async_imu = self.backend.can_consume_async_imu();
        if !async_imu && !self.backend.is_identity_pose() {
            return self.finish(Disposition::Ignored);
        }

        let Some(mount) = self.imu_mount(&imu.frame_id, stamp) else {
            error!(
                imu_frame = %imu.frame_id,
                frame_id = %self.config.frame_id,
                stamp,
                "Could not transform IMU sample to the body frame, transform not available"
            );
            return self.finish(Disposition::Ignored);
        };

        if !async_imu {
            let disposition = self.bootstrap(&imu, &mount);
            return self.finish(disposition);
        }

        let mut disposition = self.process_data(SensorBundle::imu_only(stamp, imu));
        self.state.imu_processed = true;
        self.state.last_imu_stamp = stamp;

        if self
            .state
            .buffered
            .as_ref()
            .is_some_and(|buffered| stamp >= buffered.stamp)
        {
            if let Some(buffered) = self.state.buffered.take() {
                debug!(stamp = buffered.stamp, "releasing buffered bundle");
                disposition = self.process_data(buffered);
            }
        }
        self.finish(disposition)
    }

    /// Return to the initial configuration at `pose` (the initial pose when `None`).
    #[instrument(level = "trace", name = "pose_session_reset", skip(self))]
    pub fn reset(&mut self, pose: Option<Transform>) {
        let pose = pose.unwrap_or(self.initial_pose);
        self.reset_to(&pose);
        info!(pose = ?contracts::xyz_rpy(&pose), "odometry reset");
    }

    /// Idempotent; a repeated pause only warns
    pub fn pause(&mut self) {
        if self.state.paused {
            warn!("Odometry: Already paused!");
        } else {
            self.state.paused = true;
            info!("Odometry: paused!");
        }
    }

    /// Idempotent; resuming a running session only warns
    pub fn resume(&mut self) {
        if self.state.paused {
            self.state.paused = false;
            info!("Odometry: resumed!");
        } else {
            warn!("Odometry: Already running!");
        }
    }

    /// Drain the events emitted since the last call
    pub fn take_events(&mut self) -> Vec<PoseEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn state(&self) -> SessionState {
        if self.state.paused {
            SessionState::Paused
        } else if self.waiting_for_imu() {
            SessionState::AwaitingImuBootstrap
        } else {
            SessionState::Active
        }
    }

    pub fn is_paused(&self) -> bool {
        self.state.paused
    }

    pub fn countdown_remaining(&self) -> u32 {
        self.state.countdown
    }

    pub fn last_stamp(&self) -> f64 {
        self.state.last_stamp
    }

    pub fn has_buffered_bundle(&self) -> bool {
        self.state.buffered.is_some()
    }

    /// Current backend pose
    pub fn pose(&self) -> Transform {
        self.backend.pose()
    }

    /// Snapshot of the mutable state
    pub fn snapshot(&self) -> &PoseSessionState {
        &self.state
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn lookup_mut(&mut self) -> &mut L {
        &mut self.lookup
    }

    fn finish(&self, disposition: Disposition) -> Disposition {
        observability::record_disposition(disposition.as_str());
        disposition
    }

    fn waiting_for_imu(&self) -> bool {
        self.config.wait_imu_to_init
            && !self.state.imu_processed
            && self.backend.frames_processed() == 0
            && self.backend.is_identity_pose()
    }

    fn lookup(&self, target: &FrameId, source: &FrameId, stamp: f64) -> Option<Transform> {
        self.lookup
            .lookup(target, source, stamp, self.config.lookup_timeout())
    }

    /// Rotation of the IMU frame in the body frame
    fn imu_mount(&self, imu_frame: &FrameId, stamp: f64) -> Option<UnitQuaternion<f64>> {
        if imu_frame.is_empty() || *imu_frame == self.config.frame_id {
            return Some(UnitQuaternion::identity());
        }
        self.lookup(&self.config.frame_id, imu_frame, stamp)
            .map(|mount| mount.rotation)
    }

    fn bootstrap(&mut self, imu: &ImuSample, mount: &UnitQuaternion<f64>) -> Disposition {
        let Some((rotation, source)) = bootstrap_orientation(imu, mount) else {
            return Disposition::Ignored;
        };
        self.reset_to(&rotation);
        self.state.imu_processed = true;
        self.stats.bootstraps += 1;

        let (roll, pitch, yaw) = rotation.rotation.euler_angles();
        match source {
            BootstrapSource::Orientation => {
                warn!(roll, pitch, yaw, "odometry: Initialized odometry with IMU's orientation")
            }
            BootstrapSource::Gravity => {
                warn!(roll, pitch, yaw, "odometry: Initialized odometry with IMU's accelerometer")
            }
        }
        Disposition::Bootstrapped
    }

    fn reset_to(&mut self, pose: &Transform) {
        self.backend.reset(pose);
        let paused = self.state.paused;
        self.state = PoseSessionState::new(self.config.reset_countdown);
        self.state.paused = paused;
    }

    fn process_data(&mut self, bundle: SensorBundle) -> Disposition {
        if self.waiting_for_imu() && !bundle.has_imu() {
            warn!("odometry: waiting imu to initialize orientation (wait_imu_to_init=true)");
            return Disposition::AwaitingImu;
        }

        let stamp = bundle.stamp;
        let is_data = !bundle.is_inertial_only();
        let last = self.state.last_stamp;

        if is_data {
            if let Some(disposition) = self.gate_data(bundle.has_imu(), stamp, last) {
                if disposition == Disposition::Buffered {
                    self.buffer(bundle);
                }
                return disposition;
            }
            self.seed_ground_truth(stamp);
        } else if stamp < last {
            debug!(stamp, last, "inertial sample older than the last accepted data ignored");
            self.stats.stale += 1;
            return Disposition::Stale;
        }

        // Motion guess from the external source, else the synchronized odometry
        let guess_frame = self
            .config
            .guess_frame_id
            .clone()
            .filter(|frame| !frame.is_empty());
        let guess_current = match &guess_frame {
            Some(frame) => match self.lookup(frame, &self.config.frame_id, stamp) {
                Some(current) => Some(current),
                None => {
                    error!(
                        guess_frame = %frame,
                        frame_id = %self.config.frame_id,
                        "Guess cannot be computed between the guess frame and the body frame. Aborting odometry update..."
                    );
                    return Disposition::GuessUnavailable;
                }
            },
            None => bundle.guess.as_ref().map(|odom| odom.pose),
        };

        if let Some(current) = guess_current {
            let previous = self.state.guess_prev.unwrap_or(current);
            let guess = compose(self.state.guess.take(), &previous, &current);
            self.state.guess = Some(guess);

            if self.state.guess_prev.is_some() && self.gate.should_skip(&guess, stamp, last) {
                if let Some(frame) = &guess_frame {
                    let correction = self.backend.pose() * guess * current.inverse();
                    self.emit_correction(stamp, frame.clone(), correction);
                }
                self.state.guess_prev = Some(current);
                self.stats.gated += 1;
                return Disposition::Gated;
            }
            self.state.guess_prev = Some(current);
        }

        let started = Instant::now();
        let result = self.backend.process(&bundle, self.state.guess.as_ref());
        observability::record_backend_latency_ms(started.elapsed().as_secs_f64() * 1000.0);
        self.state.guess = None;

        let disposition = match result.pose {
            Some(pose) => {
                self.state.countdown = self.config.reset_countdown;
                if let (Some(frame), Some(current)) = (&guess_frame, guess_current) {
                    self.emit_correction(stamp, frame.clone(), pose * current.inverse());
                }
                let update = PoseUpdate {
                    stamp,
                    frame_id: self.config.odom_frame_id.clone(),
                    child_frame_id: self.config.frame_id.clone(),
                    pose,
                    pose_covariance: pose_covariance(&result.covariance),
                    twist: result.velocity.as_ref().map(Twist::from_transform),
                    twist_covariance: twist_covariance(&result.covariance, result.velocity.is_some()),
                    diagnostics: result.diagnostics,
                };
                if is_data {
                    debug!(
                        stamp,
                        inliers = update.diagnostics.inliers,
                        std_dev_m = result.covariance[(0, 0)].sqrt(),
                        std_dev_rad = result.covariance[(5, 5)].sqrt(),
                        "odometry updated"
                    );
                }
                self.events.push(PoseEvent::Update(update));
                self.stats.estimates += 1;
                Disposition::Estimated
            }
            None if !is_data => return Disposition::ImuOnly,
            None => {
                if self.config.publish_null_when_lost {
                    self.events.push(PoseEvent::Lost(PoseLost::new(
                        stamp,
                        self.config.odom_frame_id.clone(),
                        self.config.frame_id.clone(),
                    )));
                }
                self.stats.lost += 1;
                self.count_failure(stamp);
                Disposition::Lost
            }
        };

        if is_data {
            self.state.last_stamp = stamp;
        }
        disposition
    }

    /// Buffering, ordering and rate gates for image/scan bundles
    fn gate_data(&mut self, has_imu: bool, stamp: f64, last: f64) -> Option<Disposition> {
        if self.backend.can_consume_async_imu()
            && !has_imu
            && self.state.last_imu_stamp > 0.0
            && stamp > self.state.last_imu_stamp
        {
            return Some(Disposition::Buffered);
        }

        if last > 0.0 && last >= stamp {
            self.stats.stale += 1;
            if !self.stale_warned {
                self.stale_warned = true;
                warn!(
                    previous = last,
                    new = stamp,
                    "Odometry: Detected not valid consecutive stamps. New stamp should be always \
                     greater than previous stamp. This new data is ignored. This message will \
                     appear only once."
                );
            }
            return Some(Disposition::Stale);
        }

        let rate = self.config.expected_update_rate;
        if rate > 0.0 && last > 0.0 && stamp - last < 1.0 / rate {
            self.stats.rate_limited += 1;
            warn!(
                detected_hz = 1.0 / (stamp - last),
                expected_hz = rate,
                previous = last,
                new = stamp,
                "Odometry: Aborting odometry update, higher frame rate detected than the expected one"
            );
            return Some(Disposition::RateLimited);
        }

        None
    }

    fn buffer(&mut self, bundle: SensorBundle) {
        if self.state.buffered.is_some() {
            error!("Overwriting previous data! Make sure IMU is published faster than data rate.");
            self.stats.imu_overwrites += 1;
            observability::record_imu_bundle_overwritten();
        }
        self.state.buffered = Some(bundle);
    }

    /// First-frame initialization from the ground truth source
    fn seed_ground_truth(&mut self, stamp: f64) {
        let Some((world, base)) = self.config.ground_truth_frames() else {
            return;
        };
        if !self.backend.is_identity_pose() {
            return;
        }
        match self.lookup(world, base, stamp) {
            Some(ground_truth) => {
                info!(
                    world = %world,
                    base = %base,
                    pose = ?contracts::xyz_rpy(&ground_truth),
                    "Initializing odometry pose from ground truth"
                );
                self.backend.reset(&ground_truth);
            }
            None => warn!(
                world = %world,
                base = %base,
                "Ground truth frames are set but failed to get them, odometry won't be initialized with ground truth."
            ),
        }
    }

    fn emit_correction(&mut self, stamp: f64, child: FrameId, transform: Transform) {
        self.events.push(PoseEvent::Correction {
            stamp,
            parent: self.config.odom_frame_id.clone(),
            child,
            transform,
        });
    }

    fn count_failure(&mut self, stamp: f64) {
        if self.state.countdown == 0 {
            return;
        }
        warn!(
            remaining = self.state.countdown,
            "Odometry lost! Odometry will be reset after the next consecutive unsuccessful odometry updates..."
        );
        self.state.countdown -= 1;
        if self.state.countdown > 0 {
            return;
        }

        // A fused pose source, when present, knows better than the backend
        match self.lookup(&self.config.odom_frame_id, &self.config.frame_id, stamp) {
            Some(external) => {
                warn!(
                    odom_frame = %self.config.odom_frame_id,
                    frame_id = %self.config.frame_id,
                    "Odometry automatically reset to latest odometry pose available from the pose source!"
                );
                self.backend.reset(&external);
            }
            None => {
                warn!("Odometry automatically reset to latest computed pose!");
                let pose = self.backend.pose();
                self.backend.reset(&pose);
            }
        }
        self.state.countdown = self.config.reset_countdown;
        self.stats.auto_resets += 1;
        observability::record_auto_reset();
    }
}
