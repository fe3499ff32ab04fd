//! OdometryConfig - Config Loader 输出
//!
//! 描述完整的会话配置：订阅的输入线、同步策略、会话阈值、监视器、后端与输出路由。
//! 由 config_loader 分层合并后一次性构建，会话期间不可变。

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use validator::Validate;

use crate::{parse_pose, ContractError, FrameId, ModalitySet, Transform, MAX_RGBD_CAMERAS};

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的会话配置
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct OdometryConfig {
    /// 配置版本
    pub version: ConfigVersion,

    /// 输入线与同步策略
    #[validate(nested)]
    pub sync: SyncConfig,

    /// 会话状态机参数
    #[validate(nested)]
    pub session: SessionConfig,

    /// 活性监视器
    #[validate(nested)]
    pub monitor: MonitorConfig,

    /// 位姿估计后端
    pub backend: BackendConfig,

    /// 日志与指标导出
    pub observability: ObservabilityConfig,

    /// 输出路由配置
    pub sinks: Vec<SinkConfig>,
}

/// 输入线订阅与同步策略
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SyncConfig {
    /// rgb + depth + camera_info
    pub subscribe_depth: bool,

    /// 双目 (左右图像 + 标定)
    pub subscribe_stereo: bool,

    /// 单目 rgb + camera_info
    pub subscribe_rgb: bool,

    /// 预打包 RGBD 相机数量 (0-4)
    #[validate(range(max = 4))]
    pub rgbd_cameras: u8,

    /// 2D 激光
    pub subscribe_scan: bool,

    /// 3D 点云
    pub subscribe_scan_cloud: bool,

    /// 外部里程计 (运动猜测)
    pub subscribe_odom: bool,

    /// 用户数据
    pub subscribe_user_data: bool,

    /// 位姿估计诊断
    pub subscribe_odom_info: bool,

    /// 近似时间同步 (false = 时间戳精确相等)
    pub approx_sync: bool,

    /// 每条输入线的缓冲深度
    #[validate(range(min = 1))]
    pub queue_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            subscribe_depth: true,
            subscribe_stereo: false,
            subscribe_rgb: false,
            rgbd_cameras: 0,
            subscribe_scan: false,
            subscribe_scan_cloud: false,
            subscribe_odom: false,
            subscribe_user_data: false,
            subscribe_odom_info: false,
            approx_sync: true,
            queue_size: 10,
        }
    }
}

impl SyncConfig {
    /// 生成不可变的 ModalitySet
    pub fn to_modality_set(&self) -> ModalitySet {
        ModalitySet {
            has_depth: self.subscribe_depth,
            has_stereo: self.subscribe_stereo,
            has_rgb: self.subscribe_rgb,
            rgbd_count: self.rgbd_cameras.min(MAX_RGBD_CAMERAS + 1),
            has_scan2d: self.subscribe_scan,
            has_scan3d: self.subscribe_scan_cloud,
            has_odom_guess: self.subscribe_odom,
            has_side_data: self.subscribe_user_data,
            has_diagnostics: self.subscribe_odom_info,
            sync_tolerant: self.approx_sync,
            queue_depth: self.queue_size,
        }
    }
}

/// 会话状态机参数
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SessionConfig {
    /// 机体坐标系
    pub frame_id: FrameId,

    /// 里程计坐标系
    pub odom_frame_id: FrameId,

    /// 运动猜测坐标系 (外部位姿源)
    pub guess_frame_id: Option<FrameId>,

    /// 真值坐标系 (首帧初始化)
    pub ground_truth_frame_id: Option<FrameId>,

    /// 真值机体坐标系
    pub ground_truth_base_frame_id: Option<FrameId>,

    /// 最小平移 (米)，低于此值跳过估计
    #[validate(range(min = 0.0))]
    pub guess_min_translation: f64,

    /// 最小旋转 (弧度)
    #[validate(range(min = 0.0))]
    pub guess_min_rotation: f64,

    /// 最小时间间隔 (秒)
    #[validate(range(min = 0.0))]
    pub guess_min_time: f64,

    /// 连续失败多少次后自动重置 (0 = 禁用)
    pub reset_countdown: u32,

    /// 期望更新频率 (Hz)，0 = 不限速
    #[validate(range(min = 0.0))]
    pub expected_update_rate: f64,

    /// 跟踪丢失时发布 PoseLost
    pub publish_null_when_lost: bool,

    /// 等待 IMU 初始化姿态后再处理数据
    pub wait_imu_to_init: bool,

    /// 初始位姿 "x y z roll pitch yaw"
    pub initial_pose: String,

    /// 外部位姿查询超时 (秒)
    #[validate(range(min = 0.0))]
    pub wait_for_transform: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            frame_id: FrameId::new("base_link"),
            odom_frame_id: FrameId::new("odom"),
            guess_frame_id: None,
            ground_truth_frame_id: None,
            ground_truth_base_frame_id: None,
            guess_min_translation: 0.0,
            guess_min_rotation: 0.0,
            guess_min_time: 0.0,
            reset_countdown: 0,
            expected_update_rate: 0.0,
            publish_null_when_lost: true,
            wait_imu_to_init: false,
            initial_pose: String::new(),
            wait_for_transform: 0.1,
        }
    }
}

impl SessionConfig {
    /// 解析初始位姿
    pub fn initial_pose(&self) -> Result<Transform, ContractError> {
        parse_pose(&self.initial_pose)
    }

    /// 外部位姿查询超时
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.wait_for_transform.max(0.0))
    }

    /// 真值坐标系对 (两者均配置时)
    pub fn ground_truth_frames(&self) -> Option<(&FrameId, &FrameId)> {
        match (&self.ground_truth_frame_id, &self.ground_truth_base_frame_id) {
            (Some(world), Some(base)) if !world.is_empty() && !base.is_empty() => {
                Some((world, base))
            }
            _ => None,
        }
    }
}

/// 活性监视器配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct MonitorConfig {
    /// 告警周期 (秒)
    #[validate(range(exclusive_min = 0.0))]
    pub interval_s: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self { interval_s: 5.0 }
    }
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.interval_s)
    }
}

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// JSON 结构化日志
    Json,
    /// 人类可读格式
    #[default]
    Pretty,
    /// 紧凑单行格式
    Compact,
}

/// 日志级别名称 (`off` 关闭工作区日志)
pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// 日志与指标导出配置
///
/// `RUST_LOG` 设置时优先于 `log_level`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,

    /// 工作区 crate 的日志级别；依赖 crate 固定为 warn
    pub log_level: String,

    /// Prometheus 端口 (0 = 禁用)
    pub metrics_port: u16,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            log_level: "info".to_string(),
            metrics_port: 0,
        }
    }
}

impl ObservabilityConfig {
    /// Prometheus 端口，未配置时为 `None`
    pub fn metrics_port(&self) -> Option<u16> {
        (self.metrics_port > 0).then_some(self.metrics_port)
    }
}

/// 后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// 以运动猜测积分位姿 (用于演示与测试)
    #[default]
    #[serde(alias = "mock")]
    DeadReckoning,
}

/// 位姿估计后端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,

    /// 最少内点数 (加载时钳制到 >= 8)
    pub min_inliers: u32,

    /// 后端是否可连续消费 IMU
    pub async_imu: bool,

    /// 每 N 帧模拟一次跟踪失败 (0 = 从不)
    pub fail_every: u32,

    /// 后端特定参数
    pub params: BTreeMap<String, String>,
}

/// 最少内点数下限
pub const MIN_INLIERS_FLOOR: u32 = 8;

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::DeadReckoning,
            min_inliers: 20,
            async_imu: false,
            fail_every: 0,
            params: BTreeMap::new(),
        }
    }
}

/// Sink 输出配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink 名称
    pub name: String,

    /// Sink 类型
    pub sink_type: SinkType,

    /// 队列容量
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// 类型特定参数
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_queue_capacity() -> usize {
    100
}

/// Sink 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// 日志输出
    Log,
    /// JSON Lines 文件输出
    File,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PrimaryVisual;

    #[test]
    fn default_config_is_valid() {
        let config = OdometryConfig::default();
        assert!(config.validate().is_ok());
        let set = config.sync.to_modality_set();
        assert!(set.validate().is_ok());
        assert_eq!(set.primary(), PrimaryVisual::Depth);
        assert!(set.sync_tolerant);
        assert_eq!(set.queue_depth, 10);
        assert_eq!(config.observability.log_format, LogFormat::Pretty);
        assert_eq!(config.observability.metrics_port(), None);
    }

    #[test]
    fn modality_set_mirrors_subscriptions() {
        let sync = SyncConfig {
            subscribe_depth: false,
            rgbd_cameras: 3,
            subscribe_scan_cloud: true,
            subscribe_odom: true,
            subscribe_odom_info: true,
            approx_sync: false,
            queue_size: 5,
            ..Default::default()
        };
        let set = sync.to_modality_set();
        assert_eq!(set.primary(), PrimaryVisual::Rgbd(3));
        assert!(set.has_scan3d && set.has_odom_guess && set.has_diagnostics);
        assert!(!set.sync_tolerant);
        assert_eq!(set.queue_depth, 5);
    }

    #[test]
    fn validator_rejects_out_of_range() {
        let mut config = OdometryConfig::default();
        config.sync.rgbd_cameras = 6;
        assert!(config.validate().is_err());

        let mut config = OdometryConfig::default();
        config.session.guess_min_time = -1.0;
        assert!(config.validate().is_err());

        let mut config = OdometryConfig::default();
        config.monitor.interval_s = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn ground_truth_frames_need_both() {
        let mut session = SessionConfig::default();
        assert!(session.ground_truth_frames().is_none());
        session.ground_truth_frame_id = Some("world".into());
        assert!(session.ground_truth_frames().is_none());
        session.ground_truth_base_frame_id = Some("gt_base".into());
        let (world, base) = session.ground_truth_frames().unwrap();
        assert_eq!(world, "world");
        assert_eq!(base, "gt_base");
    }

    #[test]
    fn initial_pose_parses() {
        let session = SessionConfig {
            initial_pose: "1 0 0 0 0 0".into(),
            ..Default::default()
        };
        let pose = session.initial_pose().unwrap();
        assert_eq!(pose.translation.vector.x, 1.0);
    }
}
