//! 快照映射：将后端文档句柄转换为输出快照记录

use crate::options::ServerTimestampBehavior;
use crate::value::{MapValue, Value};
use serde::{Deserialize, Serialize};

/// 快照元数据
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    pub has_pending_writes: bool,
    pub is_from_cache: bool,
}

/// 后端返回的文档句柄
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    /// 完整文档路径, 例如 `users/alice`
    pub path: String,
    /// 文档不存在时为 `None`
    pub data: Option<MapValue>,
    #[serde(default)]
    pub metadata: SnapshotMetadata,
}

/// 输出快照记录
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputSnapshot {
    pub path: String,
    pub data: Option<MapValue>,
    pub metadata: SnapshotMetadata,
}

impl DocumentSnapshot {
    pub fn new(path: impl Into<String>, data: MapValue) -> Self {
        Self { path: path.into(), data: Some(data), metadata: SnapshotMetadata::default() }
    }

    pub fn missing(path: impl Into<String>) -> Self {
        Self { path: path.into(), data: None, metadata: SnapshotMetadata::default() }
    }

    /// 路径的最后一段即文档ID
    pub fn id(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

pub fn to_output_snapshot(
    document: &DocumentSnapshot,
    behavior: ServerTimestampBehavior,
) -> OutputSnapshot {
    OutputSnapshot {
        path: document.path.clone(),
        data: document.data.as_ref().map(|data| resolve_map(data, behavior)),
        metadata: to_output_metadata(&document.metadata),
    }
}

pub fn to_output_metadata(metadata: &SnapshotMetadata) -> SnapshotMetadata {
    SnapshotMetadata {
        has_pending_writes: metadata.has_pending_writes,
        is_from_cache: metadata.is_from_cache,
    }
}

fn resolve_map(data: &MapValue, behavior: ServerTimestampBehavior) -> MapValue {
    data.iter()
        .map(|(key, value)| (key.clone(), resolve_value(value, behavior)))
        .collect()
}

/// 按策略解析尚未确认的服务端时间戳
fn resolve_value(value: &Value, behavior: ServerTimestampBehavior) -> Value {
    match value {
        Value::ServerTimestamp(pending) => match behavior {
            ServerTimestampBehavior::None => Value::Null,
            ServerTimestampBehavior::Estimate => Value::Timestamp(pending.local_write_time),
            ServerTimestampBehavior::Previous => match pending.previous.as_deref() {
                Some(previous) => resolve_value(previous, behavior),
                None => Value::Null,
            },
        },
        Value::Map(inner) => Value::Map(resolve_map(inner, behavior)),
        Value::Array(items) => {
            Value::Array(items.iter().map(|item| resolve_value(item, behavior)).collect())
        }
        other => other.clone(),
    }
}
