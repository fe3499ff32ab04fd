//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::OdometryConfig;
use ingestion::MockRigConfig;
use std::time::Duration;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::commands::{config_source, load_config};
use crate::pipeline::{Pipeline, PipelineConfig};

/// Inertial samples per frame when the session consumes IMU and none was requested
const DEFAULT_IMU_PER_FRAME: u32 = 5;

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    let source = config_source(&args.config);
    info!(config = %source, "Loading configuration");

    let odometry = load_config(&args.config)
        .with_context(|| format!("Failed to load config from {}", source))?;

    for warning in config_loader::lint(&odometry) {
        warn!("{}", warning);
    }

    info!(
        queue_size = odometry.sync.queue_size,
        backend = ?odometry.backend.kind,
        sinks = odometry.sinks.len(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&odometry);
        return Ok(());
    }

    let pipeline = Pipeline::new(pipeline_config(args, odometry));

    info!("Starting pipeline...");
    let stats = pipeline
        .run(shutdown_signal())
        .await
        .context("Pipeline execution failed")?;

    info!(
        bundles = stats.engine.bundles_emitted,
        events = stats.events,
        duration_secs = stats.duration.as_secs_f64(),
        "Pipeline completed"
    );
    stats.print_summary();

    info!("odom-sync finished");
    Ok(())
}

fn pipeline_config(args: &RunArgs, odometry: OdometryConfig) -> PipelineConfig {
    let uses_imu = odometry.session.wait_imu_to_init || odometry.backend.async_imu;
    let rig = MockRigConfig {
        rate_hz: args.rate_hz,
        imu_per_frame: args
            .imu_per_frame
            .unwrap_or(if uses_imu { DEFAULT_IMU_PER_FRAME } else { 0 }),
        jitter_s: args.jitter,
        realtime: !args.fast,
        seed: args.seed,
        ..Default::default()
    };

    let odometry_metrics_port = odometry.observability.metrics_port();
    PipelineConfig {
        odometry,
        rig,
        queue_capacity: args.queue_capacity,
        max_bundles: (args.max_bundles > 0).then_some(args.max_bundles),
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        metrics_port: if args.metrics_port > 0 {
            Some(args.metrics_port)
        } else {
            odometry_metrics_port
        },
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(odometry: &OdometryConfig) {
    let sync = &odometry.sync;
    let session = &odometry.session;

    println!("\n=== Configuration Summary ===\n");
    println!("Sync:");
    println!(
        "  Mode: {} (queue_size={})",
        if sync.approx_sync { "approximate" } else { "exact" },
        sync.queue_size
    );
    println!("\nSession:");
    println!("  Frames: {} -> {}", session.odom_frame_id, session.frame_id);
    println!("  Reset countdown: {}", session.reset_countdown);
    println!("  Expected update rate: {} Hz", session.expected_update_rate);
    println!("\nBackend: {:?}", odometry.backend.kind);

    if !odometry.sinks.is_empty() {
        println!("\nSinks ({}):", odometry.sinks.len());
        for sink in &odometry.sinks {
            println!("  - {} ({:?})", sink.name, sink.sink_type);
        }
    }

    println!();
}
