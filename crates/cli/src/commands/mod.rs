//! Command implementations.

mod info;
mod run;
mod validate;

pub use info::run_info;
pub use run::run_pipeline;
pub use validate::run_validate;

use config_loader::{ConfigLoader, Overrides};
use contracts::OdometryConfig;

use crate::cli::ConfigArgs;
use crate::error::{CliError, Result};

/// Defaults, then the file, then `ODOM_SYNC__*` variables, then `--set` values
pub(crate) fn load_config(args: &ConfigArgs) -> Result<OdometryConfig> {
    if let Some(path) = &args.config {
        if !path.exists() {
            return Err(CliError::config_not_found(path.display().to_string()));
        }
    }

    let overrides = Overrides::from_env().with_commands(args.set.as_slice())?;
    Ok(ConfigLoader::load_layered(args.config.as_deref(), &overrides)?)
}

/// Human-readable source of the configuration
pub(crate) fn config_source(args: &ConfigArgs) -> String {
    args.config
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<defaults>".to_string())
}
