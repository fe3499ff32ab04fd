//! 配置校验模块
//!
//! 校验规则：
//! - 数值范围 (`validator` derive：queue_size >= 1，阈值非负，interval_s > 0，rgbd_cameras <= 4)
//! - 输入线组合合法 (单一主视觉模态，扫描类型互斥，至少一条数据线)
//! - initial_pose 可解析
//! - sink 名称非空且唯一，file sink 必须配置 path
//! - 日志级别为已知名称

use std::collections::HashSet;

use contracts::{ContractError, OdometryConfig, SinkType, LOG_LEVELS, MIN_INLIERS_FLOOR};
use tracing::warn;
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// 校验 OdometryConfig
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &OdometryConfig) -> Result<(), ContractError> {
    validate_ranges(config)?;
    validate_modalities(config)?;
    validate_initial_pose(config)?;
    validate_sinks(config)?;
    validate_log_level(config)?;
    Ok(())
}

/// 加载时修正可容忍的取值，返回修正说明
pub fn normalize(config: &mut OdometryConfig) -> Vec<String> {
    let mut notes = Vec::new();
    if config.backend.min_inliers < MIN_INLIERS_FLOOR {
        warn!(
            min_inliers = config.backend.min_inliers,
            "Parameter min_inliers must be >= {MIN_INLIERS_FLOOR}, setting to {MIN_INLIERS_FLOOR}..."
        );
        notes.push(format!(
            "backend.min_inliers={} raised to {MIN_INLIERS_FLOOR}",
            config.backend.min_inliers
        ));
        config.backend.min_inliers = MIN_INLIERS_FLOOR;
    }
    notes
}

/// 合法但可疑的设置
pub fn lint(config: &OdometryConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    let sync = &config.sync;
    let session = &config.session;
    let has_guess_frame = session
        .guess_frame_id
        .as_ref()
        .is_some_and(|frame| !frame.is_empty());

    if has_guess_frame && sync.subscribe_odom {
        warnings.push(
            "session.guess_frame_id is set: it takes precedence over the synchronized odometry as guess source"
                .to_string(),
        );
    }

    let gating = session.guess_min_translation > 0.0 || session.guess_min_rotation > 0.0;
    if gating && !has_guess_frame && !sync.subscribe_odom {
        warnings.push(
            "guess_min_translation/guess_min_rotation have no effect without a guess source (guess_frame_id or subscribe_odom)"
                .to_string(),
        );
    }
    if session.guess_min_time > 0.0 && !gating {
        warnings.push(
            "session.guess_min_time is ignored while guess_min_translation and guess_min_rotation are 0"
                .to_string(),
        );
    }

    if session.wait_imu_to_init {
        warnings.push(
            "session.wait_imu_to_init: data is ignored until an IMU sample initializes the orientation"
                .to_string(),
        );
    }

    let lines = config
        .sync
        .to_modality_set()
        .validate()
        .ok()
        .map(|()| line_count(config));
    if let Some(lines) = lines.filter(|n| *n > 1) {
        if !sync.approx_sync {
            warnings.push(format!(
                "exact synchronization over {lines} lines: stamps must be identical on all of them"
            ));
        } else if sync.queue_size == 1 {
            warnings.push(
                "sync.queue_size=1 leaves no room for approximate matching".to_string(),
            );
        }
    }

    if config.sinks.is_empty() {
        warnings.push("no sinks configured: pose events are only counted".to_string());
    }

    warnings
}

/// 订阅的输入线数量 (粗略，仅用于提示)
fn line_count(config: &OdometryConfig) -> usize {
    let sync = &config.sync;
    let visual = if sync.subscribe_depth {
        3
    } else if sync.subscribe_stereo {
        4
    } else if sync.subscribe_rgb {
        2
    } else {
        usize::from(sync.rgbd_cameras)
    };
    visual
        + usize::from(sync.subscribe_scan || sync.subscribe_scan_cloud)
        + usize::from(sync.subscribe_odom)
        + usize::from(sync.subscribe_user_data)
        + usize::from(sync.subscribe_odom_info)
}

/// 数值范围 (derive 规则)
fn validate_ranges(config: &OdometryConfig) -> Result<(), ContractError> {
    match config.validate() {
        Ok(()) => Ok(()),
        Err(errors) => {
            let (field, message) = first_violation(&errors, "")
                .unwrap_or_else(|| ("config".to_string(), errors.to_string()));
            Err(ContractError::config_validation(field, message))
        }
    }
}

/// 按字段名排序后取第一个违规，保证报错确定
fn first_violation(errors: &ValidationErrors, prefix: &str) -> Option<(String, String)> {
    let mut entries: Vec<_> = errors.errors().iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    for (field, kind) in entries {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(errs) => {
                if let Some(err) = errs.first() {
                    let message = err
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("failed '{}' check", err.code));
                    return Some((path, message));
                }
            }
            ValidationErrorsKind::Struct(inner) => {
                if let Some(found) = first_violation(inner, &path) {
                    return Some(found);
                }
            }
            ValidationErrorsKind::List(items) => {
                for (idx, inner) in items {
                    if let Some(found) = first_violation(inner, &format!("{path}[{idx}]")) {
                        return Some(found);
                    }
                }
            }
        }
    }
    None
}

/// 输入线组合
fn validate_modalities(config: &OdometryConfig) -> Result<(), ContractError> {
    config
        .sync
        .to_modality_set()
        .validate()
        .map_err(|e| match e {
            ContractError::InvalidModality { message } => {
                ContractError::config_validation("sync", message)
            }
            other => other,
        })
}

/// 初始位姿
fn validate_initial_pose(config: &OdometryConfig) -> Result<(), ContractError> {
    config
        .session
        .initial_pose()
        .map(|_| ())
        .map_err(|e| ContractError::config_validation("session.initial_pose", e.to_string()))
}

/// 校验 sink 配置
fn validate_sinks(config: &OdometryConfig) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, sink) in config.sinks.iter().enumerate() {
        if sink.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{idx}].name"),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }
        if sink.queue_capacity == 0 {
            return Err(ContractError::config_validation(
                format!("sinks[{}].queue_capacity", sink.name),
                "queue_capacity must be >= 1",
            ));
        }
        if sink.sink_type == SinkType::File && !sink.params.contains_key("path") {
            return Err(ContractError::config_validation(
                format!("sinks[{}].params.path", sink.name),
                "file sink requires a 'path' parameter",
            ));
        }
    }
    Ok(())
}

fn validate_log_level(config: &OdometryConfig) -> Result<(), ContractError> {
    let level = config.observability.log_level.to_lowercase();
    if LOG_LEVELS.contains(&level.as_str()) {
        return Ok(());
    }
    Err(ContractError::config_validation(
        "observability.log_level",
        format!("unknown level '{level}', expected one of {}", LOG_LEVELS.join("/")),
    ))
}
