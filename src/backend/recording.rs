//! A backend that only records the stages applied to it.

use super::{CursorKind, Predicate, QueryBackend, QueryScope};
use crate::descriptor::CursorAnchor;
use crate::field_path::FieldPath;
use crate::operator::FilterOperator;
use crate::value::Value;
use std::fmt;

/// One applied stage, in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Filter(Predicate),
    Where {
        field_path: FieldPath,
        op: FilterOperator,
        value: Value,
    },
    Limit(u32),
    LimitToLast(u32),
    OrderBy {
        field_path: FieldPath,
        descending: bool,
    },
    Cursor {
        kind: CursorKind,
        anchor: CursorAnchor,
    },
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Filter(_) => "filter",
            Stage::Where { .. } => "where",
            Stage::Limit(_) => "limit",
            Stage::LimitToLast(_) => "limitToLast",
            Stage::OrderBy { .. } => "orderBy",
            Stage::Cursor { kind, .. } => kind.name(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordingQuery {
    scope: QueryScope,
    stages: Vec<Stage>,
}

impl RecordingQuery {
    pub fn new(scope: QueryScope) -> Self {
        Self { scope, stages: Vec::new() }
    }

    pub fn collection(path: impl Into<String>) -> Self {
        Self::new(QueryScope::Collection(path.into()))
    }

    pub fn collection_group(collection_id: impl Into<String>) -> Self {
        Self::new(QueryScope::CollectionGroup(collection_id.into()))
    }

    pub fn scope(&self) -> &QueryScope {
        &self.scope
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    fn push(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }
}

impl QueryBackend for RecordingQuery {
    type Predicate = Predicate;

    fn field_predicate(field_path: &FieldPath, op: FilterOperator, value: &Value) -> Predicate {
        Predicate::Field { field_path: field_path.clone(), op, value: value.clone() }
    }

    fn and_predicate(children: Vec<Predicate>) -> Predicate {
        Predicate::And(children)
    }

    fn or_predicate(children: Vec<Predicate>) -> Predicate {
        Predicate::Or(children)
    }

    fn filter(self, predicate: Predicate) -> Self {
        self.push(Stage::Filter(predicate))
    }

    fn where_field(self, field_path: &FieldPath, op: FilterOperator, value: &Value) -> Self {
        self.push(Stage::Where { field_path: field_path.clone(), op, value: value.clone() })
    }

    fn limit(self, limit: u32) -> Self {
        self.push(Stage::Limit(limit))
    }

    fn limit_to_last(self, limit: u32) -> Self {
        self.push(Stage::LimitToLast(limit))
    }

    fn order_by(self, field_path: &FieldPath, descending: bool) -> Self {
        self.push(Stage::OrderBy { field_path: field_path.clone(), descending })
    }

    fn cursor(self, kind: CursorKind, anchor: &CursorAnchor) -> Self {
        self.push(Stage::Cursor { kind, anchor: anchor.clone() })
    }
}

impl fmt::Display for RecordingQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.scope)?;
        for stage in &self.stages {
            match stage {
                Stage::Filter(predicate) => writeln!(f, "  .filter({})", predicate)?,
                Stage::Where { field_path, op, value } => writeln!(
                    f,
                    "  .where({} {} {})",
                    field_path,
                    op,
                    serde_json::to_string(value).map_err(|_| fmt::Error)?
                )?,
                Stage::Limit(n) => writeln!(f, "  .limit({})", n)?,
                Stage::LimitToLast(n) => writeln!(f, "  .limitToLast({})", n)?,
                Stage::OrderBy { field_path, descending } => writeln!(
                    f,
                    "  .orderBy({}, {})",
                    field_path,
                    if *descending { "desc" } else { "asc" }
                )?,
                Stage::Cursor { kind, anchor } => match anchor {
                    CursorAnchor::Values(values) => writeln!(
                        f,
                        "  .{}({})",
                        kind,
                        serde_json::to_string(values).map_err(|_| fmt::Error)?
                    )?,
                    CursorAnchor::Document { document } => {
                        writeln!(f, "  .{}(document {})", kind, document.id)?
                    }
                },
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stages_are_threaded_by_value() {
        let first = RecordingQuery::collection_group("posts").limit(3);
        let second = first.clone().order_by(&FieldPath::parse("at"), true);
        assert_eq!(first.stages().len(), 1);
        assert_eq!(second.stages().len(), 2);
        assert_eq!(second.scope(), &QueryScope::CollectionGroup("posts".to_string()));
    }

    #[test]
    fn test_explain_output() {
        let query = RecordingQuery::collection("users")
            .where_field(&FieldPath::parse("age"), FilterOperator::GreaterThanOrEqual, &Value::Integer(18))
            .order_by(&FieldPath::parse("age"), false)
            .cursor(CursorKind::StartAfter, &CursorAnchor::Values(vec![Value::Integer(21)]));
        assert_eq!(
            query.to_string(),
            "collection(users)\n  .where(age >= 18)\n  .orderBy(age, asc)\n  .startAfter([21])\n"
        );
    }
}
