//! 作用域配置：描述符目录与多候选策略。

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::provider::AmbiguityPolicy;

/// 配置解析失败。
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid scope configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// 扩展作用域的外部配置。
///
/// ```toml
/// descriptor_dirs = ["/etc/spark/extensions", "./extensions"]
/// ambiguity = "try-next"
/// ```
///
/// - `descriptor_dirs`：按顺序追加为 [`DirectorySource`](crate::extension::DirectorySource)，
///   靠前的目录优先；
/// - `ambiguity`：组合提供者查找遇到多候选时的策略，缺省为 `fail-fast`。
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScopeConfig {
    pub descriptor_dirs: Vec<PathBuf>,
    pub ambiguity: AmbiguityPolicy,
}

impl ScopeConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }
}
