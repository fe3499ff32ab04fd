//! # Observability
//!
//! 日志订阅器与 Prometheus 指标导出。
//!
//! 配置来自分层合并后的 `[observability]` 段 ([`ObservabilityConfig`])：
//!
//! - `log_format`: json / pretty / compact
//! - `log_level`: 工作区 crate 的级别，依赖 crate 固定为 warn；`RUST_LOG` 优先
//! - `metrics_port`: Prometheus 端口，0 = 不导出
//!
//! ```ignore
//! let config = ConfigLoader::load_layered(path, &overrides)?;
//! observability::init_tracing(&config.observability)?;
//! if let Some(port) = config.observability.metrics_port() {
//!     observability::install_prometheus(port)?;
//! }
//! ```

pub mod metrics;

use anyhow::{Context, Result};
pub use contracts::{LogFormat, ObservabilityConfig};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

pub use crate::metrics::{
    record_auto_reset, record_backend_latency_ms, record_buffer_depth, record_bundle_emitted,
    record_bundle_rejected, record_disposition, record_event_dispatched,
    record_imu_bundle_overwritten, record_item_evicted, record_item_received,
    record_monitor_warning, record_pose_event, MetricsSummary, RunningStats,
    SessionMetricsAggregator, StatsSummary,
};

/// Crates whose events follow `log_level`; everything else logs at warn
pub const WORKSPACE_TARGETS: &[&str] = &[
    "contracts",
    "config_loader",
    "ingestion",
    "sync_engine",
    "pose_session",
    "dispatcher",
    "observability",
    "odom_sync",
];

/// Filter directives for `level`, e.g. `warn,sync_engine=debug,...`
pub fn filter_directives(level: &str) -> String {
    let level = level.to_lowercase();
    let mut directives = vec!["warn".to_string()];
    directives.extend(WORKSPACE_TARGETS.iter().map(|target| format!("{target}={level}")));
    directives.join(",")
}

fn fmt_layer(format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_thread_names(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().with_thread_names(true).boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(false).boxed(),
    }
}

/// 安装全局 tracing 订阅器
///
/// # Errors
/// 过滤指令无法解析，或订阅器已安装
pub fn init_tracing(config: &ObservabilityConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(filter_directives(&config.log_level))
            .with_context(|| format!("invalid log level '{}'", config.log_level))?,
    };

    tracing_subscriber::registry()
        .with(fmt_layer(config.log_format))
        .with(filter)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    tracing::debug!(
        log_format = ?config.log_format,
        log_level = %config.log_level,
        "tracing initialized"
    );
    Ok(())
}

/// 在 `0.0.0.0:port` 上启动 Prometheus 导出器
///
/// # Errors
/// 全局 recorder 已安装或端口不可用
pub fn install_prometheus(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .with_context(|| format!("Failed to install Prometheus recorder on port {port}"))?;

    tracing::info!(port, "Prometheus metrics endpoint initialized");
    Ok(())
}
