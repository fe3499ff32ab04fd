//! # Dispatcher
//!
//! 位姿事件分发模块。
//!
//! 负责：
//! - 消费会话产出的 `PoseEvent`
//! - Fan-out 到多个 sinks
//! - 隔离慢 sink，不阻塞会话主链路

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod sinks;

pub use contracts::{PoseEvent, PoseSink};
pub use dispatcher::{create_dispatcher, Dispatcher, DispatcherBuilder, DispatcherConfig};
pub use error::DispatcherError;
pub use handle::SinkHandle;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use sinks::{FileSink, FileSinkConfig, LogSink};
