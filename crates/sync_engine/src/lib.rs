//! # Sync Engine
//!
//! 多输入线时间同步引擎。
//!
//! 负责：
//! - 由 `ModalitySet` 选择同步形状 (数据驱动的形状表)
//! - 通用 N 元时间对齐 (精确 / 近似)
//! - 对齐结果归一化与校验，输出 `SensorBundle`
//! - 活性监视 (无数据告警)
//!
//! ## 使用示例
//!
//! ```ignore
//! use sync_engine::SynchronizationEngine;
//!
//! let mut engine = SynchronizationEngine::configure(config.sync.to_modality_set(), &config.monitor)?;
//!
//! // Push items as they arrive
//! if let Some(bundle) = engine.on_item(item) {
//!     // Hand the bundle to the pose session
//! }
//! ```

mod assemble;
mod buffer;
mod correlator;
mod engine;
mod monitor;
mod shape;

pub use assemble::BundleAssembler;
pub use buffer::{LineBuffer, Slot};
pub use correlator::{AlignedTuple, Correlator, LineSpec, MatchPolicy};
pub use engine::{EngineStats, SynchronizationEngine};
pub use monitor::WarningMonitor;
pub use shape::{DataKind, ScanKind, SyncShape};
