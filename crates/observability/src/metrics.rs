//! 里程计同步指标收集模块
//!
//! 统一的指标名称 (前缀 `odom_sync_`) 与会话级内存聚合。

use std::collections::BTreeMap;

use contracts::{LineId, PoseEvent};
use metrics::{counter, gauge, histogram};

/// 记录输入线数据接收
pub fn record_item_received(line: LineId) {
    counter!("odom_sync_items_received_total", "line" => line.topic()).increment(1);
}

/// 记录缓冲区满导致的丢弃
pub fn record_item_evicted(line: LineId) {
    counter!("odom_sync_items_evicted_total", "line" => line.topic()).increment(1);
}

/// 记录缓冲区深度
pub fn record_buffer_depth(line: LineId, depth: usize) {
    gauge!("odom_sync_buffer_depth", "line" => line.topic()).set(depth as f64);
}

/// 记录同步 bundle 产出
pub fn record_bundle_emitted(shape: &str) {
    counter!("odom_sync_bundles_emitted_total", "shape" => shape.to_string()).increment(1);
}

/// 记录被拒绝的 bundle (校验失败 / 时间戳 / 限速 ...)
pub fn record_bundle_rejected(reason: &'static str) {
    counter!("odom_sync_bundles_rejected_total", "reason" => reason).increment(1);
}

/// 记录会话处理结果
pub fn record_disposition(disposition: &'static str) {
    counter!("odom_sync_dispositions_total", "disposition" => disposition).increment(1);
}

/// 记录输出事件 (PoseUpdate / PoseLost)
pub fn record_pose_event(event: &PoseEvent) {
    match event {
        PoseEvent::Update(update) => {
            counter!("odom_sync_pose_updates_total").increment(1);
            histogram!("odom_sync_pose_inliers").record(f64::from(update.diagnostics.inliers));
            gauge!("odom_sync_last_pose_stamp").set(update.stamp);
        }
        PoseEvent::Lost(_) => {
            counter!("odom_sync_pose_lost_total").increment(1);
        }
        PoseEvent::Correction { .. } => {
            counter!("odom_sync_corrections_total").increment(1);
        }
    }
}

/// 记录自动重置
pub fn record_auto_reset() {
    counter!("odom_sync_auto_resets_total").increment(1);
}

/// 记录异步 IMU 缓冲覆盖
pub fn record_imu_bundle_overwritten() {
    counter!("odom_sync_imu_bundle_overwritten_total").increment(1);
}

/// 记录活性告警
pub fn record_monitor_warning() {
    counter!("odom_sync_monitor_warnings_total").increment(1);
}

/// 记录后端耗时
pub fn record_backend_latency_ms(latency_ms: f64) {
    histogram!("odom_sync_backend_latency_ms").record(latency_ms);
}

/// 记录事件分发
pub fn record_event_dispatched(sink_name: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "odom_sync_events_dispatched_total",
        "sink" => sink_name.to_string(),
        "status" => status
    )
    .increment(1);
}

/// 会话指标聚合器
///
/// 在内存中聚合指标，便于运行结束时输出摘要。
#[derive(Debug, Clone, Default)]
pub struct SessionMetricsAggregator {
    /// 进入会话的 bundle 数
    pub total_bundles: u64,

    /// PoseUpdate 数
    pub pose_updates: u64,

    /// PoseLost 数
    pub pose_lost: u64,

    /// 自动重置次数
    pub auto_resets: u64,

    /// 各处理结果计数
    pub dispositions: BTreeMap<&'static str, u64>,

    /// 内点数统计
    pub inlier_stats: RunningStats,

    /// 后端耗时统计 (毫秒)
    pub latency_stats: RunningStats,

    /// 相邻 PoseUpdate 时间间隔 (秒)
    pub update_interval_stats: RunningStats,

    last_update_stamp: Option<f64>,
}

impl SessionMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次会话处理结果
    pub fn record_disposition(&mut self, disposition: &'static str) {
        self.total_bundles += 1;
        *self.dispositions.entry(disposition).or_insert(0) += 1;
    }

    /// 记录一个输出事件
    pub fn record_event(&mut self, event: &PoseEvent) {
        match event {
            PoseEvent::Update(update) => {
                self.pose_updates += 1;
                self.inlier_stats.push(f64::from(update.diagnostics.inliers));
                if let Some(last) = self.last_update_stamp {
                    self.update_interval_stats.push(update.stamp - last);
                }
                self.last_update_stamp = Some(update.stamp);
            }
            PoseEvent::Lost(_) => self.pose_lost += 1,
            PoseEvent::Correction { .. } => {}
        }
    }

    pub fn record_auto_reset(&mut self) {
        self.auto_resets += 1;
    }

    pub fn record_latency_ms(&mut self, latency_ms: f64) {
        self.latency_stats.push(latency_ms);
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_bundles: self.total_bundles,
            pose_updates: self.pose_updates,
            pose_lost: self.pose_lost,
            auto_resets: self.auto_resets,
            tracking_rate: if self.pose_updates + self.pose_lost > 0 {
                self.pose_updates as f64 / (self.pose_updates + self.pose_lost) as f64 * 100.0
            } else {
                0.0
            },
            dispositions: self.dispositions.clone(),
            inliers: StatsSummary::from(&self.inlier_stats),
            backend_latency_ms: StatsSummary::from(&self.latency_stats),
            update_interval_s: StatsSummary::from(&self.update_interval_stats),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_bundles: u64,
    pub pose_updates: u64,
    pub pose_lost: u64,
    pub auto_resets: u64,
    pub tracking_rate: f64,
    pub dispositions: BTreeMap<&'static str, u64>,
    pub inliers: StatsSummary,
    pub backend_latency_ms: StatsSummary,
    pub update_interval_s: StatsSummary,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Odometry Session Summary ===")?;
        writeln!(f, "Bundles processed: {}", self.total_bundles)?;
        writeln!(
            f,
            "Pose updates: {} ({:.2}% tracked)",
            self.pose_updates, self.tracking_rate
        )?;
        writeln!(f, "Pose lost: {}", self.pose_lost)?;
        writeln!(f, "Auto resets: {}", self.auto_resets)?;
        writeln!(f, "Inliers: {}", self.inliers)?;
        writeln!(f, "Backend latency (ms): {}", self.backend_latency_ms)?;
        writeln!(f, "Update interval (s): {}", self.update_interval_s)?;

        if !self.dispositions.is_empty() {
            writeln!(f, "Dispositions:")?;
            for (disposition, count) in &self.dispositions {
                writeln!(f, "  {}: {}", disposition, count)?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
