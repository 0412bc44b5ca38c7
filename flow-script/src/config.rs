//! # Config 模块
//!
//! 脚本加载配置。
//!
//! ## 配置优先级
//!
//! 1. 调用方显式设置的字段（最高）
//! 2. 配置文件（JSON）
//! 3. 默认值（最低）

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// 加载配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoaderConfig {
    /// 默认语言，结构阶段使用
    #[serde(default = "default_locale")]
    pub default_locale: String,

    /// 支持的语言（包含默认语言）
    ///
    /// 为空时只编译默认语言。
    #[serde(default)]
    pub supported_locales: Vec<String>,

    /// 只编译这些文件名（不含扩展名），为空表示全部
    #[serde(default)]
    pub only_included_names: Vec<String>,

    /// 跳转目标未定义时是否直接报错
    ///
    /// 关闭时保留一条没有目标的边，并输出警告诊断。
    #[serde(default)]
    pub strict_destinations: bool,

    /// 脚本目录
    #[serde(default = "default_script_dir")]
    pub script_dir: PathBuf,

    /// 本地化根目录，某个语言的脚本位于 `<locale_dir>/<locale>/<script_dir>`
    #[serde(default = "default_locale_dir")]
    pub locale_dir: PathBuf,
}

// 默认值函数
fn default_locale() -> String {
    "zh".to_string()
}

fn default_script_dir() -> PathBuf {
    PathBuf::from("scenarios")
}

fn default_locale_dir() -> PathBuf {
    PathBuf::from("locales")
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            default_locale: default_locale(),
            supported_locales: Vec::new(),
            only_included_names: Vec::new(),
            strict_destinations: false,
            script_dir: default_script_dir(),
            locale_dir: default_locale_dir(),
        }
    }
}

impl LoaderConfig {
    /// 从 JSON 文本解析
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 加载配置文件
    ///
    /// 文件不存在时返回默认配置。
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            warn!(path = %path.display(), "配置文件不存在，使用默认配置");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_json_str(&content)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_locale.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "default_locale 不能为空".to_string(),
            ));
        }

        if self.supported_locales.iter().any(String::is_empty) {
            return Err(ConfigError::ValidationFailed(
                "supported_locales 中不能有空字符串".to_string(),
            ));
        }

        if !self.supported_locales.is_empty()
            && !self.supported_locales.contains(&self.default_locale)
        {
            return Err(ConfigError::ValidationFailed(format!(
                "supported_locales 必须包含默认语言 '{}'",
                self.default_locale
            )));
        }

        Ok(())
    }

    /// 按编译顺序列出语言：默认语言在前，其余保持配置顺序并去重
    pub fn locales(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        std::iter::once(self.default_locale.as_str())
            .chain(self.supported_locales.iter().map(String::as_str))
            .filter(|locale| seen.insert(*locale))
            .collect()
    }

    /// 该文件名是否需要编译
    pub fn includes(&self, name: &str) -> bool {
        self.only_included_names.is_empty() || self.only_included_names.iter().any(|n| n == name)
    }

    /// 某个语言的脚本目录（相对于资源根目录）
    pub fn script_dir_for(&self, locale: &str) -> PathBuf {
        if locale == self.default_locale {
            self.script_dir.clone()
        } else {
            self.locale_dir.join(locale).join(&self.script_dir)
        }
    }
}

/// 配置错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// 解析失败
    #[error("配置解析失败: {0}")]
    ParseFailed(String),
    /// IO 错误
    #[error("配置 IO 错误: {0}")]
    IoError(String),
    /// 验证失败
    #[error("配置验证失败: {0}")]
    ValidationFailed(String),
}
