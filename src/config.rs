//! 配置模块，负责加载JSON配置文件

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("配置文件不存在: {0}")]
    NotFound(PathBuf),

    #[error("无法读取配置文件 {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("无法解析JSON配置文件 {path}: {source}")]
    Json { path: PathBuf, source: serde_json::Error },
}

/// 文档表的列名
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentColumns {
    /// 文档ID (text)
    pub id: String,
    /// 所在集合的完整路径, 例如 `teams/t1/users`
    pub collection_path: String,
    /// 集合ID, 即集合路径的最后一段, 供集合组查询使用
    pub collection_id: String,
    /// 文档数据 (jsonb)
    pub data: String,
}

impl Default for DocumentColumns {
    fn default() -> Self {
        Self {
            id: "id".to_string(),
            collection_path: "collection_path".to_string(),
            collection_id: "collection_id".to_string(),
            data: "data".to_string(),
        }
    }
}

/// SQL优化配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OptimizationConfig {
    /// 同一字段上的等值OR条件达到该数量时改写为IN
    pub max_or_conditions_for_in: usize,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self { max_or_conditions_for_in: 5 }
    }
}

/// 编译器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompilerConfig {
    /// 未映射的集合使用的表
    pub default_table: String,
    /// 集合ID到表名的映射
    pub table_mapping: HashMap<String, String>,
    pub columns: DocumentColumns,
    pub optimization: OptimizationConfig,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            default_table: "documents".to_string(),
            table_mapping: HashMap::new(),
            columns: DocumentColumns::default(),
            optimization: OptimizationConfig::default(),
        }
    }
}

impl CompilerConfig {
    /// 从JSON文件加载编译器配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();

        // 检查文件是否存在
        if !path_ref.exists() {
            return Err(ConfigError::NotFound(path_ref.to_path_buf()));
        }

        let content = fs::read_to_string(path_ref).map_err(|source| ConfigError::Io {
            path: path_ref.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: path_ref.to_path_buf(),
            source,
        })
    }

    /// 获取集合对应的表名，如果不存在则返回默认表
    pub fn get_table_name(&self, collection_id: &str) -> &str {
        self.table_mapping
            .get(collection_id)
            .map(String::as_str)
            .unwrap_or(&self.default_table)
    }
}
