//! The seam between the compiler and a concrete query object.
//!
//! Every stage consumes the query value and returns the next one, so a compiled query is
//! built by threading a single owned value through the pipeline.

pub mod memory;
pub mod recording;
pub mod sql;

use crate::descriptor::CursorAnchor;
use crate::field_path::FieldPath;
use crate::operator::FilterOperator;
use crate::value::Value;
use std::fmt;

pub use memory::MemoryQuery;
pub use recording::{RecordingQuery, Stage};
pub use sql::{SqlCompiler, SqlQuery};

/// The base handle a query starts from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryScope {
    /// A single collection, by its full path (`teams/t1/users`).
    Collection(String),
    /// Every collection with the given id, wherever it is nested.
    CollectionGroup(String),
}

impl QueryScope {
    /// The last segment of the collection path, or the group id.
    pub fn collection_id(&self) -> &str {
        match self {
            QueryScope::Collection(path) => path.trim_end_matches('/').rsplit('/').next().unwrap_or(path),
            QueryScope::CollectionGroup(id) => id,
        }
    }
}

impl fmt::Display for QueryScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryScope::Collection(path) => write!(f, "collection({})", path),
            QueryScope::CollectionGroup(id) => write!(f, "collectionGroup({})", id),
        }
    }
}

/// Positional cursor bounds, in the order the compiler applies them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CursorKind {
    StartAt,
    StartAfter,
    EndAt,
    EndBefore,
}

impl CursorKind {
    pub fn is_start(self) -> bool {
        matches!(self, CursorKind::StartAt | CursorKind::StartAfter)
    }

    /// Whether a row equal to the anchor is part of the result.
    pub fn is_inclusive(self) -> bool {
        matches!(self, CursorKind::StartAt | CursorKind::EndAt)
    }

    pub fn name(self) -> &'static str {
        match self {
            CursorKind::StartAt => "startAt",
            CursorKind::StartAfter => "startAfter",
            CursorKind::EndAt => "endAt",
            CursorKind::EndBefore => "endBefore",
        }
    }
}

impl fmt::Display for CursorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A backend query object the compiler can build stage by stage.
pub trait QueryBackend: Sized {
    /// Composite predicate produced by evaluating a filter tree.
    type Predicate;

    fn field_predicate(field_path: &FieldPath, op: FilterOperator, value: &Value) -> Self::Predicate;

    fn and_predicate(children: Vec<Self::Predicate>) -> Self::Predicate;

    fn or_predicate(children: Vec<Self::Predicate>) -> Self::Predicate;

    /// Narrows the query by a composite predicate.
    fn filter(self, predicate: Self::Predicate) -> Self;

    /// Narrows the query by a single flat condition.
    fn where_field(self, field_path: &FieldPath, op: FilterOperator, value: &Value) -> Self {
        self.filter(Self::field_predicate(field_path, op, value))
    }

    fn limit(self, limit: u32) -> Self;

    fn limit_to_last(self, limit: u32) -> Self;

    fn order_by(self, field_path: &FieldPath, descending: bool) -> Self;

    fn cursor(self, kind: CursorKind, anchor: &CursorAnchor) -> Self;
}

/// Backend-neutral predicate tree shared by the bundled backends.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Field {
        field_path: FieldPath,
        op: FilterOperator,
        value: Value,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Field { field_path, op, value } => {
                write!(f, "{} {} {}", field_path, op, serde_json::to_string(value).map_err(|_| fmt::Error)?)
            }
            Predicate::And(children) => write_joined(f, children, " AND "),
            Predicate::Or(children) => write_joined(f, children, " OR "),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, children: &[Predicate], sep: &str) -> fmt::Result {
    f.write_str("(")?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{}", child)?;
    }
    f.write_str(")")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicate_display() {
        let predicate = Predicate::Or(vec![
            Predicate::Field {
                field_path: FieldPath::parse("status"),
                op: FilterOperator::Equal,
                value: Value::from("active"),
            },
            Predicate::And(vec![Predicate::Field {
                field_path: FieldPath::parse("age"),
                op: FilterOperator::GreaterThanOrEqual,
                value: Value::Integer(18),
            }]),
        ]);
        assert_eq!(predicate.to_string(), r#"(status == "active" OR (age >= 18))"#);
    }

    #[test]
    fn test_scope_collection_id() {
        assert_eq!(QueryScope::Collection("teams/t1/users".into()).collection_id(), "users");
        assert_eq!(QueryScope::Collection("users".into()).collection_id(), "users");
        assert_eq!(QueryScope::CollectionGroup("users".into()).collection_id(), "users");
    }

    #[test]
    fn test_cursor_kind_bounds() {
        assert!(CursorKind::StartAt.is_start() && CursorKind::StartAt.is_inclusive());
        assert!(CursorKind::StartAfter.is_start() && !CursorKind::StartAfter.is_inclusive());
        assert!(!CursorKind::EndAt.is_start() && CursorKind::EndAt.is_inclusive());
        assert!(!CursorKind::EndBefore.is_start() && !CursorKind::EndBefore.is_inclusive());
    }
}
