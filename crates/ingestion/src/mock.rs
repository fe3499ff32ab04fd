//! Mock 传感器组
//!
//! 用于无真实传感器环境的演示与测试：按固定频率为每条声明的输入线生成数据，
//! 机体沿 x 轴匀速运动。

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use bytes::Bytes;
use contracts::{
    transform_from_xyz_rpy, CameraInfo, ImageData, ImuSample, LaserScan, LineId, OdomDiagnostics,
    OdomSample, PointCloudData, RgbdImage, SensorPayload, UserData,
};
use nalgebra::{Quaternion, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, trace};

use crate::error::{IngestionError, Result};
use crate::queue::{IngestionQueue, LineSender};

/// Mock 传感器组配置
#[derive(Debug, Clone)]
pub struct MockRigConfig {
    /// 数据帧率 (Hz)
    pub rate_hz: f64,

    /// 每帧 IMU 样本数 (0 = 不发送 IMU)
    pub imu_per_frame: u32,

    /// 每条线时间戳的随机抖动上限 (秒)，0 = 各线时间戳完全相同
    pub jitter_s: f64,

    /// 最多生成的帧数 (None = 直到停止)
    pub max_frames: Option<u64>,

    /// true: 按真实时间节拍发送，队列满时丢弃；false: 尽快发送且不丢弃
    pub realtime: bool,

    /// 首帧时间戳
    pub start_stamp: f64,

    /// 图像宽度
    pub image_width: u32,

    /// 图像高度
    pub image_height: u32,

    /// 运动速度 (米/秒)
    pub speed_mps: f64,

    /// 随机种子
    pub seed: u64,
}

impl Default for MockRigConfig {
    fn default() -> Self {
        Self {
            rate_hz: 10.0,
            imu_per_frame: 0,
            jitter_s: 0.0,
            max_frames: None,
            realtime: true,
            start_stamp: 1.0,
            image_width: 64,
            image_height: 48,
            speed_mps: 1.0,
            seed: 7,
        }
    }
}

/// Mock 传感器组
pub struct MockRig {
    config: MockRigConfig,
    lines: Vec<LineId>,
    running: Arc<AtomicBool>,
    frames: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl MockRig {
    /// `lines`: 需要生成的输入线 (不含 IMU，IMU 由 `imu_per_frame` 控制)
    pub fn new(config: MockRigConfig, lines: Vec<LineId>) -> Self {
        Self {
            config,
            lines,
            running: Arc::new(AtomicBool::new(false)),
            frames: Arc::new(AtomicU64::new(0)),
            handle: None,
        }
    }

    /// 在独立线程中启动，向 `queue` 的各线发送
    ///
    /// # Errors
    /// 已在运行时返回 `AlreadyRunning`；线程创建失败返回 IO 错误
    pub fn start(&mut self, queue: &IngestionQueue) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(IngestionError::AlreadyRunning);
        }

        let senders: Vec<LineSender> = self.lines.iter().map(|line| queue.sender(*line)).collect();
        let imu = (self.config.imu_per_frame > 0).then(|| queue.sender(LineId::Imu));
        let mut generator = FrameGenerator::new(self.config.clone());
        let running = self.running.clone();
        let frames = self.frames.clone();
        let config = self.config.clone();

        info!(
            lines = self.lines.len(),
            rate_hz = config.rate_hz,
            imu_per_frame = config.imu_per_frame,
            realtime = config.realtime,
            "mock rig started"
        );

        let handle = std::thread::Builder::new()
            .name("odom-sync-rig".to_string())
            .spawn(move || {
                let period = Duration::from_secs_f64(1.0 / config.rate_hz.max(1e-3));
                let mut frame = 0u64;
                while running.load(Ordering::Relaxed) {
                    if config.max_frames.is_some_and(|max| frame >= max) {
                        break;
                    }
                    if !emit_frame(&mut generator, frame, &senders, imu.as_ref(), !config.realtime) {
                        debug!("mock rig queue closed");
                        break;
                    }
                    frame += 1;
                    frames.store(frame, Ordering::Relaxed);
                    if config.realtime {
                        std::thread::sleep(period);
                    }
                }
                running.store(false, Ordering::SeqCst);
                debug!(frames = frame, "mock rig stopped");
            })
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                IngestionError::Contract(e.into())
            })?;

        self.handle = Some(handle);
        Ok(())
    }

    /// 停止并等待线程退出 (幂等)
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    /// 等待有限帧数的运行自然结束
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    /// 检查是否正在运行
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// 已生成的帧数
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn lines(&self) -> &[LineId] {
        &self.lines
    }
}

impl Drop for MockRig {
    fn drop(&mut self) {
        self.stop();
    }
}

/// 发送一帧；队列关闭时返回 false
fn emit_frame(
    generator: &mut FrameGenerator,
    frame: u64,
    senders: &[LineSender],
    imu: Option<&LineSender>,
    lossless: bool,
) -> bool {
    let stamp = generator.stamp(frame);
    for sender in senders {
        let line_stamp = generator.jittered(stamp);
        let payload = generator.payload(sender.line(), frame, line_stamp);
        if !deliver(sender, line_stamp, payload, lossless) {
            return false;
        }
    }

    // IMU 样本从数据帧时间戳开始，均匀覆盖到下一帧之前
    if let Some(imu) = imu {
        let count = generator.config.imu_per_frame;
        let step = 1.0 / (generator.config.rate_hz * f64::from(count));
        for i in 0..count {
            let imu_stamp = stamp + f64::from(i) * step;
            if !deliver(imu, imu_stamp, SensorPayload::Imu(generator.imu()), lossless) {
                return false;
            }
        }
    }
    trace!(frame, stamp, "mock frame emitted");
    true
}

fn deliver(sender: &LineSender, stamp: f64, payload: SensorPayload, lossless: bool) -> bool {
    if lossless {
        sender.send_blocking(stamp, payload).is_ok()
    } else {
        sender.send(stamp, payload);
        !sender.is_closed()
    }
}

/// 逐帧载荷生成
struct FrameGenerator {
    config: MockRigConfig,
    rng: StdRng,
}

impl FrameGenerator {
    fn new(config: MockRigConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self { config, rng }
    }

    fn stamp(&self, frame: u64) -> f64 {
        self.config.start_stamp + frame as f64 / self.config.rate_hz
    }

    fn jittered(&mut self, stamp: f64) -> f64 {
        if self.config.jitter_s > 0.0 {
            stamp + self.rng.random_range(0.0..self.config.jitter_s)
        } else {
            stamp
        }
    }

    fn payload(&mut self, line: LineId, frame: u64, stamp: f64) -> SensorPayload {
        match line {
            LineId::Rgb | LineId::LeftImage | LineId::RightImage => {
                SensorPayload::Image(self.image("bgr8", 3, frame))
            }
            LineId::Depth => SensorPayload::Image(self.image("16UC1", 2, frame)),
            LineId::CameraInfo | LineId::LeftCameraInfo => {
                SensorPayload::CameraInfo(self.camera_info(0.0))
            }
            // 右目投影 Tx = -fx * baseline (0.12 m)
            LineId::RightCameraInfo => SensorPayload::CameraInfo(self.camera_info(0.12)),
            LineId::Rgbd(_) => SensorPayload::Rgbd(Box::new(RgbdImage {
                rgb: self.image("bgr8", 3, frame),
                depth: self.image("16UC1", 2, frame),
                camera_info: self.camera_info(0.0),
                rgb_stamp: stamp,
                depth_stamp: stamp,
            })),
            LineId::Scan2d => SensorPayload::Scan2d(self.scan()),
            LineId::Scan3d => SensorPayload::Scan3d(self.cloud()),
            LineId::Odom => SensorPayload::Odom(OdomSample {
                pose: transform_from_xyz_rpy(
                    frame as f64 * self.config.speed_mps / self.config.rate_hz,
                    0.0,
                    0.0,
                    0.0,
                    0.0,
                    0.0,
                ),
                frame_id: "odom".into(),
                child_frame_id: "base_link".into(),
            }),
            LineId::UserData => SensorPayload::UserData(UserData {
                rows: 1,
                cols: 8,
                data: frame.to_le_bytes().to_vec(),
            }),
            LineId::OdomInfo => SensorPayload::OdomInfo(OdomDiagnostics {
                inliers: 100,
                matches: 150,
                features: 400,
                ..Default::default()
            }),
            LineId::Imu => SensorPayload::Imu(self.imu()),
        }
    }

    fn image(&self, encoding: &str, bytes_per_pixel: usize, frame: u64) -> ImageData {
        let size = self.config.image_width as usize * self.config.image_height as usize * bytes_per_pixel;
        ImageData {
            width: self.config.image_width,
            height: self.config.image_height,
            encoding: encoding.to_string(),
            data: Bytes::from(vec![(frame % 256) as u8; size]),
        }
    }

    fn camera_info(&self, baseline: f64) -> CameraInfo {
        let fx = f64::from(self.config.image_width);
        CameraInfo {
            width: self.config.image_width,
            height: self.config.image_height,
            fx,
            fy: fx,
            cx: fx / 2.0,
            cy: f64::from(self.config.image_height) / 2.0,
            tx: -fx * baseline,
            frame_id: "camera_link".into(),
        }
    }

    fn scan(&mut self) -> LaserScan {
        let ranges = (0..360)
            .map(|_| 5.0 + self.rng.random_range(-0.01f32..0.01))
            .collect();
        LaserScan {
            angle_min: -std::f32::consts::PI,
            angle_max: std::f32::consts::PI,
            angle_increment: std::f32::consts::TAU / 360.0,
            range_min: 0.1,
            range_max: 30.0,
            ranges,
            frame_id: "laser".into(),
        }
    }

    fn cloud(&self) -> PointCloudData {
        let num_points = 1024;
        PointCloudData {
            num_points,
            point_stride: 16,
            data: Bytes::from(vec![0u8; num_points as usize * 16]),
            frame_id: "lidar".into(),
        }
    }

    fn imu(&mut self) -> ImuSample {
        ImuSample {
            orientation: Quaternion::new(0.0, 0.0, 0.0, 0.0),
            angular_velocity: Vector3::zeros(),
            linear_acceleration: Vector3::new(
                self.rng.random_range(-0.05..0.05),
                self.rng.random_range(-0.05..0.05),
                9.81,
            ),
            frame_id: "base_link".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueueConfig;

    fn replay(max_frames: u64, imu_per_frame: u32) -> MockRigConfig {
        MockRigConfig {
            max_frames: Some(max_frames),
            realtime: false,
            imu_per_frame,
            ..Default::default()
        }
    }

    #[test]
    fn test_rig_emits_declared_lines() {
        let mut queue = IngestionQueue::new(QueueConfig::new(256));
        let rx = queue.take_receiver().unwrap();
        let mut rig = MockRig::new(replay(3, 0), vec![LineId::Scan2d, LineId::Odom]);

        rig.start(&queue).unwrap();
        rig.join();
        assert_eq!(rig.frames(), 3);
        assert!(!rig.is_running());

        let items: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(items.len(), 6);
        assert_eq!(items[0].line(), LineId::Scan2d);
        assert_eq!(items[1].line(), LineId::Odom);
        // No jitter: both lines share the stamp
        assert_eq!(items[0].stamp(), items[1].stamp());
        assert!((items[2].stamp() - items[0].stamp() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_rig_interleaves_imu() {
        let mut queue = IngestionQueue::new(QueueConfig::new(256));
        let rx = queue.take_receiver().unwrap();
        let mut rig = MockRig::new(replay(2, 4), vec![LineId::Scan2d]);

        rig.start(&queue).unwrap();
        rig.join();

        let items: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(items.len(), 10);
        let imu_stamps: Vec<f64> = items
            .iter()
            .filter(|item| item.line() == LineId::Imu)
            .map(|item| item.stamp())
            .collect();
        assert_eq!(imu_stamps.len(), 8);
        assert!(imu_stamps.windows(2).all(|w| w[0] < w[1]));
        // First IMU sample of a frame matches the frame stamp
        assert_eq!(imu_stamps[0], items[0].stamp());
    }

    #[test]
    fn test_rig_jitter_bounded() {
        let mut queue = IngestionQueue::new(QueueConfig::new(256));
        let rx = queue.take_receiver().unwrap();
        let config = MockRigConfig {
            jitter_s: 0.005,
            ..replay(5, 0)
        };
        let mut rig = MockRig::new(config, vec![LineId::Rgb, LineId::Depth, LineId::CameraInfo]);
        rig.start(&queue).unwrap();
        rig.join();

        for (i, item) in std::iter::from_fn(|| rx.try_recv().ok()).enumerate() {
            let base = 1.0 + (i / 3) as f64 / 10.0;
            assert!(item.stamp() >= base && item.stamp() < base + 0.005);
        }
    }

    #[test]
    fn test_start_twice_rejected() {
        let queue = IngestionQueue::new(QueueConfig::new(4));
        let mut rig = MockRig::new(MockRigConfig::default(), vec![LineId::Scan2d]);
        rig.start(&queue).unwrap();
        assert!(matches!(rig.start(&queue), Err(IngestionError::AlreadyRunning)));
        rig.stop();
        assert!(!rig.is_running());
    }

    #[test]
    fn test_stereo_payloads_are_consistent() {
        let mut generator = FrameGenerator::new(MockRigConfig::default());
        let SensorPayload::CameraInfo(right) = generator.payload(LineId::RightCameraInfo, 0, 1.0) else {
            panic!("expected camera info");
        };
        assert!((right.baseline() - 0.12).abs() < 1e-12);
        let SensorPayload::Image(left) = generator.payload(LineId::LeftImage, 0, 1.0) else {
            panic!("expected image");
        };
        assert!(left.has_rgb_encoding());
    }
}
