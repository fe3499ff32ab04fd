//! `validate` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use sync_engine::SyncShape;
use tracing::info;

use crate::cli::ValidateArgs;
use crate::commands::{config_source, load_config};

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    shape: String,
    line_count: usize,
    approx_sync: bool,
    sink_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    let source = config_source(&args.config);
    info!(config = %source, "Validating configuration");

    let result = validate_config(args, source);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs, config_source: String) -> ValidationResult {
    let invalid = |config_source: String, error: String| ValidationResult {
        valid: false,
        config_source,
        error: Some(error),
        warnings: Vec::new(),
        summary: None,
    };

    let config = match load_config(&args.config) {
        Ok(config) => config,
        Err(e) => return invalid(config_source, e.to_string()),
    };
    let shape = match SyncShape::select(&config.sync.to_modality_set()) {
        Ok(shape) => shape,
        Err(e) => return invalid(config_source, e.to_string()),
    };

    ValidationResult {
        valid: true,
        config_source,
        error: None,
        warnings: config_loader::lint(&config),
        summary: Some(ConfigSummary {
            version: format!("{:?}", config.version),
            shape: shape.name(),
            line_count: shape.lines().len(),
            approx_sync: config.sync.approx_sync,
            sink_count: config.sinks.len(),
        }),
    }
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_source);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Shape: {} ({} lines)", summary.shape, summary.line_count);
            println!(
                "  Sync: {}",
                if summary.approx_sync { "approximate" } else { "exact" }
            );
            println!("  Sinks: {}", summary.sink_count);
        }

        if !result.warnings.is_empty() {
            println!("\n⚠ Warnings:");
            for warning in &result.warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_source);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
