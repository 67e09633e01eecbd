//! 查询描述符：客户端构造、已反序列化的查询描述
//!
//! ## 线上格式 (JSON)
//!
//! ```text
//! {
//!   "where":   [["age", ">=", 18]],                      // 旧式扁平条件
//!   "filters": {"op": "OR", "queries": [                 // 过滤树
//!                 {"fieldPath": "status", "op": "==", "value": "active"},
//!                 {"fieldPath": "status", "op": "==", "value": "pending"}]},
//!   "limit": 10,
//!   "limitToLast": null,
//!   "orderBy": [["createdAt", false]],                   // [字段, 是否降序]
//!   "startAfter": ["doc123"]                             // 值列表或 {"document": {...}}
//! }
//! ```

use crate::error::CompileError;
use crate::field_path::FieldPath;
use crate::value::{MapValue, Value};
use serde::Deserialize;

/// 完整的查询描述, 由编译器消费一次
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryDescriptor {
    /// 旧式扁平条件, 按输入顺序应用
    pub legacy_conditions: Vec<LegacyCondition>,
    /// 可组合的过滤树
    pub filter_tree: Option<FilterNode>,
    pub limit: Option<u32>,
    pub limit_to_last: Option<u32>,
    pub order_by: Vec<OrderBy>,
    pub start_at: Option<CursorAnchor>,
    pub start_after: Option<CursorAnchor>,
    pub end_at: Option<CursorAnchor>,
    pub end_before: Option<CursorAnchor>,
}

/// 过滤树节点：叶子条件或 AND/OR 组合
#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    Condition(ConditionLeaf),
    Combinator(CombinatorNode),
}

/// 单个比较/包含条件, 运算符保留原始标记, 在求值时才解析
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionLeaf {
    pub field_path: FieldPath,
    pub operator: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CombinatorNode {
    pub operator: Combinator,
    /// 子节点顺序在重建复合谓词时保持不变
    pub children: Vec<FilterNode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    And,
    Or,
}

/// 旧式条件, 线上格式为三元组 `[fieldPath, op, value]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "(FieldPath, String, Value)")]
pub struct LegacyCondition {
    pub field_path: FieldPath,
    pub operator: String,
    pub value: Value,
}

impl From<(FieldPath, String, Value)> for LegacyCondition {
    fn from((field_path, operator, value): (FieldPath, String, Value)) -> Self {
        Self { field_path, operator, value }
    }
}

/// 排序键, 线上格式为 `[fieldPath, descending]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "(FieldPath, bool)")]
pub struct OrderBy {
    pub field_path: FieldPath,
    pub descending: bool,
}

impl From<(FieldPath, bool)> for OrderBy {
    fn from((field_path, descending): (FieldPath, bool)) -> Self {
        Self { field_path, descending }
    }
}

/// 分页游标锚点：按排序字段给出的值列表, 或一个文档锚点
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CursorAnchor {
    Values(Vec<Value>),
    Document { document: DocumentAnchor },
}

/// 文档锚点携带文档ID及其数据, 排序字段的值从数据中取
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DocumentAnchor {
    pub id: String,
    #[serde(default)]
    pub data: MapValue,
}

impl FilterNode {
    pub fn condition(field_path: impl Into<FieldPath>, operator: &str, value: impl Into<Value>) -> Self {
        FilterNode::Condition(ConditionLeaf {
            field_path: field_path.into(),
            operator: operator.to_string(),
            value: value.into(),
        })
    }

    pub fn and(children: Vec<FilterNode>) -> Self {
        FilterNode::Combinator(CombinatorNode { operator: Combinator::And, children })
    }

    pub fn or(children: Vec<FilterNode>) -> Self {
        FilterNode::Combinator(CombinatorNode { operator: Combinator::Or, children })
    }
}

impl LegacyCondition {
    pub fn new(field_path: impl Into<FieldPath>, operator: &str, value: impl Into<Value>) -> Self {
        Self {
            field_path: field_path.into(),
            operator: operator.to_string(),
            value: value.into(),
        }
    }
}

impl OrderBy {
    pub fn new(field_path: impl Into<FieldPath>, descending: bool) -> Self {
        Self { field_path: field_path.into(), descending }
    }
}

impl QueryDescriptor {
    /// 任一游标字段存在
    pub fn has_cursor(&self) -> bool {
        self.start_at.is_some()
            || self.start_after.is_some()
            || self.end_at.is_some()
            || self.end_before.is_some()
    }
}

// Serde-facing forms. Filter nodes are sniffed by key presence here, once, and turned
// into the tagged `FilterNode` before anything else sees them.

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FilterNodeSerde {
    field_path: Option<FieldPath>,
    op: Option<String>,
    #[serde(default)]
    value: Value,
    queries: Option<Vec<FilterNodeSerde>>,
}

impl TryFrom<FilterNodeSerde> for FilterNode {
    type Error = CompileError;

    fn try_from(raw: FilterNodeSerde) -> Result<Self, Self::Error> {
        match (raw.field_path, raw.queries) {
            (Some(field_path), _) => {
                let operator = raw.op.ok_or_else(|| {
                    CompileError::InvalidOperator(format!("missing operator for field {}", field_path))
                })?;
                Ok(FilterNode::Condition(ConditionLeaf { field_path, operator, value: raw.value }))
            }
            (None, Some(queries)) => {
                let operator = match raw.op.as_deref() {
                    Some("AND") => Combinator::And,
                    Some("OR") => Combinator::Or,
                    Some(other) => return Err(CompileError::InvalidOperator(other.to_string())),
                    None => {
                        return Err(CompileError::InvalidOperator(
                            "missing combinator operator".to_string(),
                        ))
                    }
                };
                let children = queries
                    .into_iter()
                    .map(FilterNode::try_from)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(FilterNode::Combinator(CombinatorNode { operator, children }))
            }
            (None, None) => Err(CompileError::InvalidOperator("malformed filter node".to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct QueryDescriptorSerde {
    #[serde(rename = "where")]
    conditions: Vec<LegacyCondition>,
    filters: Option<FilterNodeSerde>,
    limit: Option<u32>,
    limit_to_last: Option<u32>,
    order_by: Vec<OrderBy>,
    start_at: Option<CursorAnchor>,
    start_after: Option<CursorAnchor>,
    end_at: Option<CursorAnchor>,
    end_before: Option<CursorAnchor>,
}

impl TryFrom<QueryDescriptorSerde> for QueryDescriptor {
    type Error = CompileError;

    fn try_from(raw: QueryDescriptorSerde) -> Result<Self, Self::Error> {
        Ok(QueryDescriptor {
            legacy_conditions: raw.conditions,
            filter_tree: raw.filters.map(FilterNode::try_from).transpose()?,
            limit: raw.limit,
            limit_to_last: raw.limit_to_last,
            order_by: raw.order_by,
            start_at: raw.start_at,
            start_after: raw.start_after,
            end_at: raw.end_at,
            end_before: raw.end_before,
        })
    }
}

/// JSON形式的过滤树最多嵌套的组合节点层数 (serde_json 的递归上限为128层,
/// 每个组合节点占一个对象和一个数组). 在代码中直接构造的树不受此限制.
pub const MAX_JSON_FILTER_DEPTH: usize = 62;

/// 从JSON解析查询描述符
///
/// 过滤树的组合节点嵌套超过 [`MAX_JSON_FILTER_DEPTH`] 层时返回 `CompileError::Descriptor`.
///
/// # Errors
/// JSON不符合描述符结构时返回 `CompileError::Descriptor`; 过滤树节点无法识别时返回
/// `CompileError::InvalidOperator`.
pub fn parse_descriptor_json(json: &str) -> Result<QueryDescriptor, CompileError> {
    let raw: QueryDescriptorSerde = serde_json::from_str(json)?;
    QueryDescriptor::try_from(raw)
}
