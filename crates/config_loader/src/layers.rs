//! 分层覆盖
//!
//! 合并顺序：内建默认值 → 配置文件 → 运行时覆盖 (环境变量) → 命令覆盖 (`--set`)。
//! 后层逐键覆盖前层；数组整体替换。

use contracts::ContractError;

use crate::parser::parse_scalar;

/// 环境变量前缀，`ODOM_SYNC__SESSION__RESET_COUNTDOWN=5`
pub const ENV_PREFIX: &str = "ODOM_SYNC__";

/// 一条覆盖：点分路径 + 值
#[derive(Debug, Clone, PartialEq)]
pub struct Override {
    pub path: Vec<String>,
    pub value: toml::Value,
}

impl Override {
    /// 解析 `section.key=value`
    ///
    /// # Errors
    /// 缺少 `=` 或路径为空时返回 `ConfigParse`
    pub fn parse(spec: &str) -> Result<Self, ContractError> {
        let (path, raw) = spec.split_once('=').ok_or_else(|| {
            ContractError::config_parse(format!("override '{spec}' must look like section.key=value"))
        })?;
        let path: Vec<String> = path.trim().split('.').map(|s| s.trim().to_string()).collect();
        if path.iter().any(String::is_empty) {
            return Err(ContractError::config_parse(format!(
                "override '{spec}' has an empty path segment"
            )));
        }
        Ok(Self {
            path,
            value: parse_scalar(raw),
        })
    }

    /// 由环境变量构造；不带前缀的变量返回 `None`
    pub fn from_env_var(name: &str, value: &str) -> Option<Self> {
        let rest = name.strip_prefix(ENV_PREFIX)?;
        let path: Vec<String> = rest.split("__").map(|s| s.to_lowercase()).collect();
        if path.iter().any(String::is_empty) {
            return None;
        }
        Some(Self {
            path,
            value: parse_scalar(value),
        })
    }

    pub fn key(&self) -> String {
        self.path.join(".")
    }

    /// 写入表，沿途创建缺失的子表
    ///
    /// # Errors
    /// 路径穿过非表值时返回 `ConfigParse`
    pub fn apply(&self, table: &mut toml::Table) -> Result<(), ContractError> {
        let Some((last, parents)) = self.path.split_last() else {
            return Ok(());
        };
        let mut current = table;
        for segment in parents {
            let entry = current
                .entry(segment.clone())
                .or_insert_with(|| toml::Value::Table(toml::Table::new()));
            current = match entry {
                toml::Value::Table(inner) => inner,
                _ => {
                    return Err(ContractError::config_parse(format!(
                        "override '{}' crosses non-table key '{segment}'",
                        self.key()
                    )))
                }
            };
        }
        current.insert(last.clone(), self.value.clone());
        Ok(())
    }
}

/// 运行时与命令覆盖层
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// 环境变量层
    pub runtime: Vec<Override>,
    /// `--set` 层 (最高优先级)
    pub command: Vec<Override>,
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// 收集进程环境中带前缀的变量
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// 从任意键值对收集运行时覆盖 (按变量名排序保证确定性)
    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut runtime: Vec<Override> = vars
            .into_iter()
            .filter_map(|(name, value)| Override::from_env_var(&name, &value))
            .collect();
        runtime.sort_by_key(Override::key);
        Self {
            runtime,
            command: Vec::new(),
        }
    }

    /// 追加 `--set section.key=value` 覆盖
    ///
    /// # Errors
    /// 任一条格式错误
    pub fn with_commands<S: AsRef<str>>(mut self, specs: &[S]) -> Result<Self, ContractError> {
        for spec in specs {
            self.command.push(Override::parse(spec.as_ref())?);
        }
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self.runtime.is_empty() && self.command.is_empty()
    }

    /// 依次应用运行时层与命令层
    pub fn apply(&self, table: &mut toml::Table) -> Result<(), ContractError> {
        for item in self.runtime.iter().chain(&self.command) {
            item.apply(table)?;
        }
        Ok(())
    }
}

/// 深度合并：表逐键递归，其余值整体替换
pub fn merge(base: &mut toml::Table, layer: toml::Table) {
    for (key, value) in layer {
        if let toml::Value::Table(incoming) = value {
            if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                merge(existing, incoming);
                continue;
            }
            base.insert(key, toml::Value::Table(incoming));
        } else {
            base.insert(key, value);
        }
    }
}
