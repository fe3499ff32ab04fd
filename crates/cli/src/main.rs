//! # odom-sync CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 分层配置加载与验证
//! - 同步 + 位姿会话管道编排
//! - 优雅关闭处理

mod cli;
mod commands;
mod error;
mod pipeline;

use anyhow::Result;
use clap::Parser;
use contracts::ObservabilityConfig;
use tracing::info;

use cli::{Cli, Commands};
use commands::{load_config, run_info, run_pipeline, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    observability::init_tracing(&observability_config(&cli))?;

    info!(version = env!("CARGO_PKG_VERSION"), "odom-sync starting");

    let result = match &cli.command {
        Commands::Run(args) => run_pipeline(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// `[observability]` of the layered configuration with the logging flags on top.
///
/// A configuration that fails to load falls back to the defaults here; the
/// command reports the error itself.
fn observability_config(cli: &Cli) -> ObservabilityConfig {
    let mut config = load_config(cli.command.config_args())
        .map(|odometry| odometry.observability)
        .unwrap_or_default();

    if cli.quiet {
        config.log_level = "warn".to_string();
    } else if cli.verbose > 0 {
        config.log_level = if cli.verbose == 1 { "debug" } else { "trace" }.to_string();
    }
    if let Some(format) = cli.log_format {
        config.log_format = format.into();
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::LogFormat;

    #[test]
    fn test_flags_override_configured_logging() {
        let cli = Cli::parse_from([
            "odom-sync",
            "info",
            "--set",
            "observability.log_level=error",
            "--set",
            "observability.log_format=compact",
        ]);
        let config = observability_config(&cli);
        assert_eq!(config.log_level, "error");
        assert_eq!(config.log_format, LogFormat::Compact);

        let cli = Cli::parse_from([
            "odom-sync",
            "-v",
            "--log-format",
            "json",
            "info",
            "--set",
            "observability.log_level=error",
        ]);
        let config = observability_config(&cli);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_format, LogFormat::Json);
    }
}
