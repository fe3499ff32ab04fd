//! # Pose Session
//!
//! 位姿会话状态机。
//!
//! 负责：
//! - 运动猜测合成与最小运动门控
//! - 时间戳单调性与频率门控
//! - 异步 IMU 缓冲与回放，IMU 姿态初始化
//! - 连续失败计数与自动重置
//! - `OdometryNode`：同步引擎与会话的唯一所有者
//!
//! ## 使用示例
//!
//! ```ignore
//! use pose_session::{DeadReckoningBackend, OdometryNode};
//! use contracts::NoLookup;
//!
//! let backend = DeadReckoningBackend::from_config(&config.backend);
//! let mut node = OdometryNode::new(&config, backend, NoLookup)?;
//!
//! if let Some(disposition) = node.on_item(item) {
//!     for event in node.take_events() {
//!         // Forward to the dispatcher
//!     }
//! }
//! ```

mod covariance;
mod guess;
mod imu;
mod mock;
mod node;
mod session;
mod state;

pub use covariance::{pose_covariance, twist_covariance};
pub use guess::{compose, MotionGate};
pub use imu::{bootstrap_orientation, BootstrapSource};
pub use mock::{DeadReckoningBackend, ScriptedBackend, StaticLookup};
pub use node::OdometryNode;
pub use session::PoseSession;
pub use state::{Disposition, PoseSessionState, SessionState, SessionStats};
