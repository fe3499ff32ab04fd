//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// odom-sync - multi-stream sensor synchronization feeding a pose session
#[derive(Parser, Debug)]
#[command(
    name = "odom-sync",
    author,
    version,
    about = "Multi-stream sensor synchronization and odometry session node",
    long_about = "Aligns image, depth, scan, odometry and inertial streams into bundles,\n\
                  runs them through a pose session and dispatches the resulting pose\n\
                  events to the configured sinks."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "ODOM_SYNC_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format (default: `observability.log_format` of the configuration)
    #[arg(long, value_enum, global = true, env = "ODOM_SYNC_LOG_FORMAT")]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the node against the mock sensor rig
    Run(RunArgs),

    /// Validate the layered configuration without running
    Validate(ValidateArgs),

    /// Display the resolved synchronization shape and session settings
    Info(InfoArgs),
}

/// Configuration sources shared by every command
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Configuration file (TOML or JSON); built-in defaults when omitted
    #[arg(short, long, env = "ODOM_SYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override a configuration value, e.g. `--set sync.queue_size=5` (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,
}

/// Arguments for the `run` command
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Stop after this many synchronized bundles (0 = unlimited)
    #[arg(long, default_value = "0", env = "ODOM_SYNC_MAX_BUNDLES")]
    pub max_bundles: u64,

    /// Stop after this many seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "ODOM_SYNC_TIMEOUT")]
    pub timeout: u64,

    /// Load and validate the configuration, then exit
    #[arg(long)]
    pub dry_run: bool,

    /// Prometheus endpoint port (0 = use `observability.metrics_port`)
    #[arg(long, default_value = "0", env = "ODOM_SYNC_METRICS_PORT")]
    pub metrics_port: u16,

    /// Frame rate of the mock rig (Hz)
    #[arg(long, default_value = "10.0")]
    pub rate_hz: f64,

    /// Inertial samples per frame (default: 5 when the session uses IMU, else 0)
    #[arg(long)]
    pub imu_per_frame: Option<u32>,

    /// Per-line timestamp jitter of the mock rig (seconds)
    #[arg(long, default_value = "0.0")]
    pub jitter: f64,

    /// Generate as fast as possible without dropping instead of pacing in real time
    #[arg(long)]
    pub fast: bool,

    /// Random seed of the mock rig
    #[arg(long, default_value = "7")]
    pub seed: u64,

    /// Capacity of the ingestion queue
    #[arg(long, default_value = "1024", env = "ODOM_SYNC_QUEUE_CAPACITY")]
    pub queue_capacity: usize,
}

/// Arguments for the `validate` command
#[derive(Args, Debug)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Args, Debug)]
pub struct InfoArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    Pretty,
    /// Compact single-line format
    Compact,
}

impl Commands {
    /// Configuration sources of the selected command
    pub fn config_args(&self) -> &ConfigArgs {
        match self {
            Self::Run(args) => &args.config,
            Self::Validate(args) => &args.config,
            Self::Info(args) => &args.config,
        }
    }
}

impl From<LogFormat> for contracts::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
