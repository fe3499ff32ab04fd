//! Pipeline statistics and metrics.

use std::time::Duration;

use dispatcher::MetricsSnapshot;
use observability::SessionMetricsAggregator;
use pose_session::SessionStats;
use sync_engine::EngineStats;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Resolved shape name
    pub shape: String,

    /// Items taken off the ingestion queue
    pub items_received: u64,

    /// Items the ingestion queue dropped because it was full
    pub items_dropped: u64,

    /// Frames generated by the mock rig
    pub rig_frames: u64,

    pub engine: EngineStats,

    pub session: SessionStats,

    /// Pose events handed to the dispatcher
    pub events: u64,

    pub duration: Duration,

    /// Final per-sink counters
    pub sinks: Vec<(String, MetricsSnapshot)>,

    /// Dispositions, events and latencies aggregated in memory
    pub session_metrics: SessionMetricsAggregator,
}

impl PipelineStats {
    /// Synchronized bundles per second
    pub fn bundle_rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.engine.bundles_emitted as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Pipeline Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Shape: {}", self.shape);
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Rig frames: {}", self.rig_frames);
        println!(
            "   ├─ Items received: {} (queue dropped {})",
            self.items_received, self.items_dropped
        );
        println!(
            "   ├─ Bundles: {} emitted, {} rejected",
            self.engine.bundles_emitted, self.engine.bundles_rejected
        );
        println!("   ├─ Bundle rate: {:.2}/s", self.bundle_rate());
        println!("   └─ Pose events: {}", self.events);

        println!("\n🧭 Session");
        println!("   ├─ Estimates: {}", self.session.estimates);
        println!("   ├─ Lost: {}", self.session.lost);
        println!(
            "   ├─ Rejected: {} stale, {} rate limited",
            self.session.stale, self.session.rate_limited
        );
        println!("   ├─ Gated: {}", self.session.gated);
        println!("   └─ Auto resets: {}", self.session.auto_resets);

        println!("\n📈 {}", self.session_metrics.summary());

        if !self.sinks.is_empty() {
            println!("📤 Sinks");
            for (i, (name, m)) in self.sinks.iter().enumerate() {
                let prefix = if i == self.sinks.len() - 1 { "└─" } else { "├─" };
                println!(
                    "   {} {}: {} written, {} failed, {} dropped",
                    prefix, name, m.written, m.failures, m.dropped
                );
            }
        }

        println!();
    }
}
