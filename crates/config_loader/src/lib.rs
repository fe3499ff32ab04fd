//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Layered merge: defaults → file → environment (`ODOM_SYNC__SECTION__KEY`) → `--set`
//! - Validate configuration legality
//! - Generate the immutable `OdometryConfig`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::{ConfigLoader, Overrides};
//! use std::path::Path;
//!
//! let overrides = Overrides::from_env().with_commands(&["session.reset_countdown=3"]).unwrap();
//! let config = ConfigLoader::load_layered(Some(Path::new("odom.toml")), &overrides).unwrap();
//! println!("queue size: {}", config.sync.queue_size);
//! ```

mod layers;
mod parser;
mod validator;

pub use contracts::OdometryConfig;
pub use layers::{merge, Override, Overrides, ENV_PREFIX};
pub use parser::ConfigFormat;
pub use validator::lint;

use contracts::ContractError;
use std::path::Path;
use tracing::debug;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path, without runtime overrides
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<OdometryConfig, ContractError> {
        Self::load_layered(Some(path), &Overrides::new())
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<OdometryConfig, ContractError> {
        let mut table = parser::defaults_table()?;
        merge(&mut table, parser::parse_table(content, format)?);
        Self::finish(table)
    }

    /// Merge every layer and build the session configuration
    ///
    /// Layers, lowest first: built-in defaults, the optional file, runtime
    /// overrides, command overrides. The merged tree is deserialized once.
    ///
    /// # Errors
    /// - File read / format / parse failure
    /// - Override path crossing a non-table value
    /// - Validation failure
    pub fn load_layered(
        path: Option<&Path>,
        overrides: &Overrides,
    ) -> Result<OdometryConfig, ContractError> {
        let mut table = parser::defaults_table()?;

        if let Some(path) = path {
            let format = Self::detect_format(path)?;
            let content = Self::read_file(path)?;
            merge(&mut table, parser::parse_table(&content, format)?);
            debug!(path = %path.display(), "config file merged");
        }

        overrides.apply(&mut table)?;
        if !overrides.is_empty() {
            debug!(
                runtime = overrides.runtime.len(),
                command = overrides.command.len(),
                "config overrides applied"
            );
        }

        Self::finish(table)
    }

    /// Serialize OdometryConfig to TOML string
    pub fn to_toml(config: &OdometryConfig) -> Result<String, ContractError> {
        toml::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize OdometryConfig to JSON string
    pub fn to_json(config: &OdometryConfig) -> Result<String, ContractError> {
        serde_json::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, ContractError> {
        Ok(std::fs::read_to_string(path)?)
    }

    /// Deserialize, normalize and validate the merged tree
    fn finish(table: toml::Table) -> Result<OdometryConfig, ContractError> {
        let mut config = parser::into_config(table)?;
        validator::normalize(&mut config);
        validator::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SCAN_TOML: &str = r#"
[sync]
subscribe_depth = false
subscribe_scan = true
subscribe_odom = true
queue_size = 5

[session]
frame_id = "base_footprint"
reset_countdown = 2

[backend]
kind = "mock"
min_inliers = 4

[[sinks]]
name = "log_sink"
sink_type = "log"
"#;

    #[test]
    fn test_load_from_str_toml() {
        let config = ConfigLoader::load_from_str(SCAN_TOML, ConfigFormat::Toml).unwrap();
        assert!(config.sync.subscribe_scan);
        assert!(!config.sync.subscribe_depth);
        assert_eq!(config.sync.queue_size, 5);
        // Untouched keys keep their defaults
        assert!(config.sync.approx_sync);
        assert_eq!(config.session.odom_frame_id, "odom");
        assert_eq!(config.session.frame_id, "base_footprint");
        assert_eq!(config.sinks.len(), 1);
    }

    #[test]
    fn test_min_inliers_clamped_on_load() {
        let config = ConfigLoader::load_from_str(SCAN_TOML, ConfigFormat::Toml).unwrap();
        assert_eq!(config.backend.min_inliers, 8);
    }

    #[test]
    fn test_round_trip_toml() {
        let config = ConfigLoader::load_from_str(SCAN_TOML, ConfigFormat::Toml).unwrap();
        let serialized = ConfigLoader::to_toml(&config).unwrap();
        let again = ConfigLoader::load_from_str(&serialized, ConfigFormat::Toml).unwrap();
        assert_eq!(again.session.reset_countdown, 2);
        assert_eq!(again.sinks[0].name, "log_sink");
    }

    #[test]
    fn test_round_trip_json() {
        let config = ConfigLoader::load_from_str(SCAN_TOML, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&config).unwrap();
        let again = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(again.sync.queue_size, 5);
    }

    #[test]
    fn test_layer_precedence() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(SCAN_TOML.as_bytes()).unwrap();

        let overrides = Overrides::from_vars([
            ("ODOM_SYNC__SESSION__RESET_COUNTDOWN".to_string(), "4".to_string()),
            ("ODOM_SYNC__SYNC__QUEUE_SIZE".to_string(), "7".to_string()),
        ])
        .with_commands(&["session.reset_countdown=9", "session.guess_frame_id=odom_guess"])
        .unwrap();

        let config = ConfigLoader::load_layered(Some(file.path()), &overrides).unwrap();
        assert_eq!(config.sync.queue_size, 7);
        assert_eq!(config.session.reset_countdown, 9);
        assert_eq!(config.session.guess_frame_id.as_deref(), Some("odom_guess"));
        assert_eq!(config.session.frame_id, "base_footprint");
    }

    #[test]
    fn test_defaults_only() {
        let config = ConfigLoader::load_layered(None, &Overrides::new()).unwrap();
        assert!(config.sync.subscribe_depth);
        assert_eq!(config.monitor.interval_s, 5.0);
    }

    #[test]
    fn test_validation_runs_after_merge() {
        let overrides = Overrides::new()
            .with_commands(&["sync.subscribe_stereo=true"])
            .unwrap();
        let err = ConfigLoader::load_layered(None, &overrides).unwrap_err();
        assert!(matches!(err, ContractError::ConfigValidation { .. }), "got: {err}");
    }

    #[test]
    fn test_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        let err = ConfigLoader::load_from_path(file.path()).unwrap_err();
        assert!(err.to_string().contains("unsupported config format"));
    }
}
