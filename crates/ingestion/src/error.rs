//! Ingestion 错误类型

use contracts::{ContractError, LineId};
use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 队列已关闭 (消费端已退出)
    #[error("ingestion queue closed for line {line}")]
    ChannelClosed {
        /// 输入线
        line: LineId,
    },

    /// 接收端已被取走
    #[error("ingestion receiver already taken")]
    ReceiverTaken,

    /// Mock 采集已在运行
    #[error("mock rig is already running")]
    AlreadyRunning,

    /// 契约层错误
    #[error(transparent)]
    Contract(#[from] ContractError),
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
