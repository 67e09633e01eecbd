//! 字段路径：对文档中(可能嵌套的)字段的不透明引用

use serde::{Deserialize, Serialize};
use std::fmt;

/// 文档ID的保留字段名
pub const DOCUMENT_ID: &str = "__name__";

/// 字段路径按段保存, 只做相等比较, 编译器本身从不解析它
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "FieldPathSerde", into = "Vec<String>")]
pub struct FieldPath(Vec<String>);

/// 线上格式：点分字符串 `"a.b"` 或显式分段 `["a", "b.c"]`
#[derive(Deserialize)]
#[serde(untagged)]
enum FieldPathSerde {
    Dotted(String),
    Segments(Vec<String>),
}

impl From<FieldPathSerde> for FieldPath {
    fn from(raw: FieldPathSerde) -> Self {
        match raw {
            FieldPathSerde::Dotted(s) => FieldPath::parse(&s),
            FieldPathSerde::Segments(segments) => FieldPath(segments),
        }
    }
}

impl From<FieldPath> for Vec<String> {
    fn from(path: FieldPath) -> Self {
        path.0
    }
}

impl FieldPath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// 按 `.` 拆分; `__name__` 映射为文档ID路径
    pub fn parse(dotted: &str) -> Self {
        if dotted == DOCUMENT_ID {
            return Self::document_id();
        }
        Self(dotted.split('.').map(str::to_string).collect())
    }

    pub fn document_id() -> Self {
        Self(vec![DOCUMENT_ID.to_string()])
    }

    pub fn is_document_id(&self) -> bool {
        self.0.len() == 1 && self.0[0] == DOCUMENT_ID
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl From<&str> for FieldPath {
    fn from(dotted: &str) -> Self {
        FieldPath::parse(dotted)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dotted_and_segment_forms() {
        let dotted: FieldPath = serde_json::from_str(r#""address.city""#).unwrap();
        let segments: FieldPath = serde_json::from_str(r#"["address", "city"]"#).unwrap();
        assert_eq!(dotted, segments);
        assert_eq!(dotted.segments(), ["address", "city"]);
    }

    #[test]
    fn test_segment_form_keeps_dots() {
        let path: FieldPath = serde_json::from_str(r#"["a.b"]"#).unwrap();
        assert_eq!(path.segments().len(), 1);
        assert_ne!(path, FieldPath::parse("a.b"));
    }

    #[test]
    fn test_document_id() {
        assert!(FieldPath::parse("__name__").is_document_id());
        assert!(!FieldPath::parse("name").is_document_id());
    }
}
