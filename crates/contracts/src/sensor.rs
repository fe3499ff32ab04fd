//! 传感器数据载荷
//!
//! 每条输入线上的原始数据结构。图像与点云使用 `Bytes` (零拷贝)。

use bytes::Bytes;
use nalgebra::{Quaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::{FrameId, Transform};

/// 支持的彩色/灰度图像编码
pub const RGB_ENCODINGS: &[&str] = &[
    "mono8",
    "mono16",
    "bgr8",
    "rgb8",
    "bgra8",
    "rgba8",
    "bayer_grbg8",
    "8UC1",
];

/// 支持的深度图像编码
pub const DEPTH_ENCODINGS: &[&str] = &["16UC1", "32FC1", "mono16"];

/// 传感器数据载荷
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorPayload {
    /// 图像 (rgb / depth / 双目左右目)
    Image(ImageData),

    /// 相机标定
    CameraInfo(CameraInfo),

    /// 预打包的 RGBD 数据
    Rgbd(Box<RgbdImage>),

    /// 2D 激光
    Scan2d(LaserScan),

    /// 3D 点云
    Scan3d(PointCloudData),

    /// 外部里程计 (运动猜测)
    Odom(OdomSample),

    /// 用户数据
    UserData(UserData),

    /// 位姿估计器诊断信息
    OdomInfo(OdomDiagnostics),

    /// IMU 数据
    Imu(ImuSample),
}

impl SensorPayload {
    /// 载荷类型名 (用于日志)
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Image(_) => "image",
            Self::CameraInfo(_) => "camera_info",
            Self::Rgbd(_) => "rgbd",
            Self::Scan2d(_) => "scan2d",
            Self::Scan3d(_) => "scan3d",
            Self::Odom(_) => "odom",
            Self::UserData(_) => "user_data",
            Self::OdomInfo(_) => "odom_info",
            Self::Imu(_) => "imu",
        }
    }
}

/// 图像数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageData {
    /// 图像宽度
    pub width: u32,

    /// 图像高度
    pub height: u32,

    /// 像素编码 (如 `rgb8`, `16UC1`)
    pub encoding: String,

    /// 原始像素数据
    pub data: Bytes,
}

impl ImageData {
    /// 是否为支持的彩色/灰度编码
    pub fn has_rgb_encoding(&self) -> bool {
        RGB_ENCODINGS.contains(&self.encoding.as_str())
    }

    /// 是否为支持的深度编码
    pub fn has_depth_encoding(&self) -> bool {
        DEPTH_ENCODINGS.contains(&self.encoding.as_str())
    }
}

/// 相机标定 (针孔模型)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraInfo {
    pub width: u32,
    pub height: u32,
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,

    /// 投影矩阵 P[0][3] (双目右目为 -fx * baseline)
    #[serde(default)]
    pub tx: f64,

    /// 相机坐标系
    #[serde(default)]
    pub frame_id: FrameId,
}

impl CameraInfo {
    /// 双目基线 (米)
    pub fn baseline(&self) -> f64 {
        if self.fx == 0.0 {
            0.0
        } else {
            -self.tx / self.fx
        }
    }
}

/// 预打包 RGBD 数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RgbdImage {
    pub rgb: ImageData,
    pub depth: ImageData,
    pub camera_info: CameraInfo,

    /// rgb 图像时间戳
    pub rgb_stamp: f64,

    /// depth 图像时间戳
    pub depth_stamp: f64,
}

impl RgbdImage {
    /// 代表时间戳：取 rgb / depth 中较晚者
    pub fn stamp(&self) -> f64 {
        self.rgb_stamp.max(self.depth_stamp)
    }
}

/// 2D 激光数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaserScan {
    pub angle_min: f32,
    pub angle_max: f32,
    pub angle_increment: f32,
    pub range_min: f32,
    pub range_max: f32,
    pub ranges: Vec<f32>,
    #[serde(default)]
    pub frame_id: FrameId,
}

/// 3D 点云数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointCloudData {
    /// 点数量
    pub num_points: u32,

    /// 每点字节数 (通常 16: x,y,z,intensity)
    pub point_stride: u32,

    /// 点云数据
    pub data: Bytes,

    #[serde(default)]
    pub frame_id: FrameId,
}

/// IMU 数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImuSample {
    /// 绝对姿态 (全零表示无效)
    pub orientation: Quaternion<f64>,

    /// 陀螺仪 (rad/s)
    pub angular_velocity: Vector3<f64>,

    /// 加速度计 (m/s²)
    pub linear_acceleration: Vector3<f64>,

    /// IMU 坐标系
    #[serde(default)]
    pub frame_id: FrameId,
}

impl ImuSample {
    /// 姿态字段是否有效
    pub fn has_orientation(&self) -> bool {
        self.orientation.coords.iter().any(|v| *v != 0.0)
    }
}

/// 外部里程计样本
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OdomSample {
    pub pose: Transform,
    #[serde(default)]
    pub frame_id: FrameId,
    #[serde(default)]
    pub child_frame_id: FrameId,
}

/// 用户数据 (不透明字节)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UserData {
    pub rows: u32,
    pub cols: u32,
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
}

/// 位姿估计诊断信息
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OdomDiagnostics {
    /// 是否跟踪丢失
    pub lost: bool,

    /// 匹配数
    pub matches: u32,

    /// 内点数
    pub inliers: u32,

    /// 特征数
    pub features: u32,

    /// 局部地图大小
    pub local_map_size: u32,

    /// 估计耗时 (秒)
    pub time_estimation: f64,

    /// 累计行驶距离 (米)
    pub distance_travelled: f64,
}
