//! 配置模块，负责加载JSON配置文件

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 默认的最大嵌套深度（括号与 NOT）
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("配置文件不存在: {}", .0.display())]
    NotFound(PathBuf),

    #[error("无法读取配置文件 {}: {source}", .path.display())]
    Read { path: PathBuf, source: std::io::Error },

    #[error("无法解析JSON配置文件 {}: {source}", .path.display())]
    Parse { path: PathBuf, source: serde_json::Error },
}

/// 语法分析器配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserConfig {
    /// 括号与 NOT 的最大嵌套层数
    pub max_depth: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self { max_depth: DEFAULT_MAX_DEPTH }
    }
}

/// 交互式 shell 的配置结构
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShellConfig {
    /// `RUST_LOG` 未设置时使用的日志级别
    pub log_level: String,
    /// 占位符编号的起始值
    pub index_start: usize,
    pub max_depth: usize,
    /// 命令历史文件
    pub history_file: PathBuf,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            index_start: 0,
            max_depth: DEFAULT_MAX_DEPTH,
            history_file: PathBuf::from(".ddb_expr_history"),
        }
    }
}

impl ShellConfig {
    /// 从JSON文件加载配置，缺省字段取默认值
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        // 检查文件是否存在
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;

        serde_json::from_str(&content).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    pub fn parser_config(&self) -> ParserConfig {
        ParserConfig { max_depth: self.max_depth }
    }
}
