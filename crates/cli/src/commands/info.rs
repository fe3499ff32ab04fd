//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::OdometryConfig;
use serde::Serialize;
use sync_engine::SyncShape;
use tracing::info;

use crate::cli::InfoArgs;
use crate::commands::{config_source, load_config};

/// Resolved configuration for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    shape: ShapeInfo,
    session: SessionInfo,
    backend: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct ShapeInfo {
    name: String,
    lines: Vec<String>,
    /// "none" for a single directly forwarded line
    sync_mode: &'static str,
    queue_size: usize,
}

#[derive(Serialize)]
struct SessionInfo {
    frame_id: String,
    odom_frame_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    guess_frame_id: Option<String>,
    guess_min_translation: f64,
    guess_min_rotation: f64,
    guess_min_time: f64,
    reset_countdown: u32,
    expected_update_rate: f64,
    publish_null_when_lost: bool,
    wait_imu_to_init: bool,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    queue_capacity: usize,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    let source = config_source(&args.config);
    info!(config = %source, "Loading configuration info");

    let config = load_config(&args.config)
        .with_context(|| format!("Failed to load config from {}", source))?;
    let info = build_config_info(&config)?;

    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(config: &OdometryConfig) -> Result<ConfigInfo> {
    let modalities = config.sync.to_modality_set();
    let shape = SyncShape::select(&modalities).context("No synchronization shape")?;

    let sync_mode = if shape.is_direct() {
        "none"
    } else if modalities.sync_tolerant {
        "approximate"
    } else {
        "exact"
    };

    let session = &config.session;
    Ok(ConfigInfo {
        version: format!("{:?}", config.version),
        shape: ShapeInfo {
            name: shape.name(),
            lines: shape.lines().iter().map(|line| line.to_string()).collect(),
            sync_mode,
            queue_size: modalities.queue_depth,
        },
        session: SessionInfo {
            frame_id: session.frame_id.to_string(),
            odom_frame_id: session.odom_frame_id.to_string(),
            guess_frame_id: session
                .guess_frame_id
                .as_ref()
                .filter(|frame| !frame.is_empty())
                .map(|frame| frame.to_string()),
            guess_min_translation: session.guess_min_translation,
            guess_min_rotation: session.guess_min_rotation,
            guess_min_time: session.guess_min_time,
            reset_countdown: session.reset_countdown,
            expected_update_rate: session.expected_update_rate,
            publish_null_when_lost: session.publish_null_when_lost,
            wait_imu_to_init: session.wait_imu_to_init,
        },
        backend: format!("{:?}", config.backend.kind),
        sinks: config
            .sinks
            .iter()
            .map(|s| SinkInfo {
                name: s.name.clone(),
                sink_type: format!("{:?}", s.sink_type),
                queue_capacity: s.queue_capacity,
            })
            .collect(),
    })
}

fn print_config_info(info: &ConfigInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                 odom-sync Configuration                      ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("🔗 Synchronization");
    println!("   ├─ Version: {}", info.version);
    println!("   ├─ Shape: {}", info.shape.name);
    println!("   ├─ Sync mode: {}", info.shape.sync_mode);
    println!("   ├─ Queue size: {}", info.shape.queue_size);
    println!("   └─ Lines ({})", info.shape.lines.len());
    for (i, line) in info.shape.lines.iter().enumerate() {
        let prefix = if i == info.shape.lines.len() - 1 { "└─" } else { "├─" };
        println!("      {} {}", prefix, line);
    }

    let session = &info.session;
    println!("\n🧭 Session");
    println!("   ├─ Frames: {} → {}", session.odom_frame_id, session.frame_id);
    if let Some(ref guess) = session.guess_frame_id {
        println!("   ├─ Guess frame: {}", guess);
    }
    println!(
        "   ├─ Motion gate: {} m / {} rad / {} s",
        session.guess_min_translation, session.guess_min_rotation, session.guess_min_time
    );
    println!("   ├─ Reset countdown: {}", session.reset_countdown);
    println!("   ├─ Expected rate: {} Hz", session.expected_update_rate);
    println!("   ├─ Publish when lost: {}", session.publish_null_when_lost);
    println!("   └─ Wait for IMU: {}", session.wait_imu_to_init);

    println!("\n⚙️  Backend: {}", info.backend);

    if !info.sinks.is_empty() {
        println!("\n📤 Sinks ({})", info.sinks.len());
        for (i, sink) in info.sinks.iter().enumerate() {
            let prefix = if i == info.sinks.len() - 1 { "└─" } else { "├─" };
            println!(
                "   {} {} ({}, queue {})",
                prefix, sink.name, sink.sink_type, sink.queue_capacity
            );
        }
    }

    println!();
}
