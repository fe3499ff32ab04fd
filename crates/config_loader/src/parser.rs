//! 配置解析模块
//!
//! 支持 TOML (主要) 和 JSON (可选) 格式。两种格式都先解析为 `toml::Table`，
//! 以便与默认值及覆盖层逐键合并。

use contracts::{ContractError, OdometryConfig};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML 格式 (推荐)
    Toml,
    /// JSON 格式
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// 解析为未类型化的表 (合并前)
pub fn parse_table(content: &str, format: ConfigFormat) -> Result<toml::Table, ContractError> {
    match format {
        ConfigFormat::Toml => toml::from_str(content).map_err(|e| ContractError::ConfigParse {
            message: format!("TOML parse error: {e}"),
            source: Some(Box::new(e)),
        }),
        ConfigFormat::Json => {
            let json_error = |e: serde_json::Error| ContractError::ConfigParse {
                message: format!("JSON parse error: {e}"),
                source: Some(Box::new(e)),
            };
            let mut value: serde_json::Value = serde_json::from_str(content).map_err(json_error)?;
            strip_nulls(&mut value);
            serde_json::from_value(value).map_err(json_error)
        }
    }
}

/// TOML has no null: a null key means "not set"
fn strip_nulls(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            map.values_mut().for_each(strip_nulls);
        }
        serde_json::Value::Array(items) => items.iter_mut().for_each(strip_nulls),
        _ => {}
    }
}

/// 合并后的表反序列化为 `OdometryConfig`
pub fn into_config(table: toml::Table) -> Result<OdometryConfig, ContractError> {
    toml::Value::Table(table)
        .try_into()
        .map_err(|e: toml::de::Error| ContractError::ConfigParse {
            message: format!("config structure error: {e}"),
            source: Some(Box::new(e)),
        })
}

/// 内建默认值作为最底层
pub fn defaults_table() -> Result<toml::Table, ContractError> {
    match toml::Value::try_from(OdometryConfig::default()) {
        Ok(toml::Value::Table(table)) => Ok(table),
        Ok(_) => Err(ContractError::config_parse("defaults did not serialize to a table")),
        Err(e) => Err(ContractError::ConfigParse {
            message: format!("TOML serialize error: {e}"),
            source: Some(Box::new(e)),
        }),
    }
}

/// 覆盖值按 TOML 字面量解析，失败时作为字符串
pub fn parse_scalar(raw: &str) -> toml::Value {
    let raw = raw.trim();
    toml::from_str::<toml::Table>(&format!("v = {raw}"))
        .ok()
        .and_then(|mut table| table.remove("v"))
        .unwrap_or_else(|| toml::Value::String(raw.to_string()))
}
