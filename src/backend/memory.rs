//! In-memory backend: evaluates a compiled query against a list of document snapshots.

use super::{CursorKind, Predicate, QueryBackend, QueryScope};
use crate::descriptor::CursorAnchor;
use crate::field_path::FieldPath;
use crate::operator::FilterOperator;
use crate::snapshot::DocumentSnapshot;
use crate::value::{compare_values, get_field, values_equal, Value};
use std::borrow::Cow;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Limit {
    First(u32),
    Last(u32),
}

#[derive(Debug, Clone)]
pub struct MemoryQuery {
    documents: Vec<DocumentSnapshot>,
    filters: Vec<Predicate>,
    order: Vec<(FieldPath, bool)>,
    cursors: Vec<(CursorKind, CursorAnchor)>,
    limit: Option<Limit>,
}

impl MemoryQuery {
    /// Query over whatever documents are given, without scoping.
    pub fn new(documents: Vec<DocumentSnapshot>) -> Self {
        Self {
            documents,
            filters: Vec::new(),
            order: Vec::new(),
            cursors: Vec::new(),
            limit: None,
        }
    }

    pub fn scoped(scope: &QueryScope, documents: Vec<DocumentSnapshot>) -> Self {
        match scope {
            QueryScope::Collection(path) => Self::collection(path, documents),
            QueryScope::CollectionGroup(id) => Self::collection_group(id, documents),
        }
    }

    /// Documents whose parent is exactly `collection_path`.
    pub fn collection(collection_path: &str, documents: Vec<DocumentSnapshot>) -> Self {
        let prefix = format!("{}/", collection_path.trim_end_matches('/'));
        Self::new(
            documents
                .into_iter()
                .filter(|doc| doc.path.strip_prefix(&prefix).is_some_and(|rest| !rest.contains('/')))
                .collect(),
        )
    }

    /// Documents in any collection named `collection_id`.
    pub fn collection_group(collection_id: &str, documents: Vec<DocumentSnapshot>) -> Self {
        Self::new(
            documents
                .into_iter()
                .filter(|doc| doc.path.rsplit('/').nth(1) == Some(collection_id))
                .collect(),
        )
    }

    /// Run the query: filter, order, apply cursors, then limit.
    pub fn execute(&self) -> Vec<DocumentSnapshot> {
        let mut results: Vec<&DocumentSnapshot> = self
            .documents
            .iter()
            .filter(|doc| doc.data.is_some())
            .filter(|doc| self.filters.iter().all(|p| matches(doc, p)))
            .collect();

        // Ordering on a field excludes documents that lack it.
        results.retain(|doc| self.order.iter().all(|(path, _)| field_value(doc, path).is_some()));
        results.sort_by(|a, b| self.compare_documents(a, b));

        results.retain(|doc| {
            self.cursors.iter().all(|(kind, anchor)| {
                let position = self.position_against(doc, anchor);
                match kind {
                    CursorKind::StartAt => position != Ordering::Less,
                    CursorKind::StartAfter => position == Ordering::Greater,
                    CursorKind::EndAt => position != Ordering::Greater,
                    CursorKind::EndBefore => position == Ordering::Less,
                }
            })
        });

        match self.limit {
            Some(Limit::First(n)) => results.truncate(n as usize),
            Some(Limit::Last(n)) => {
                let skip = results.len().saturating_sub(n as usize);
                results.drain(..skip);
            }
            None => {}
        }

        results.into_iter().cloned().collect()
    }

    fn last_descending(&self) -> bool {
        self.order.last().is_some_and(|(_, descending)| *descending)
    }

    fn compare_documents(&self, a: &DocumentSnapshot, b: &DocumentSnapshot) -> Ordering {
        for (path, descending) in &self.order {
            let ord = match (field_value(a, path), field_value(b, path)) {
                (Some(x), Some(y)) => compare_values(&x, &y),
                _ => Ordering::Equal,
            };
            if ord != Ordering::Equal {
                return if *descending { ord.reverse() } else { ord };
            }
        }
        // Implicit document-id tiebreak follows the last declared direction. The path only
        // separates equal ids from different parents in a collection group.
        let ord = a.id().cmp(b.id()).then_with(|| a.path.cmp(&b.path));
        if self.last_descending() { ord.reverse() } else { ord }
    }

    /// Where `doc` sits relative to the cursor anchor in the declared ordering.
    fn position_against(&self, doc: &DocumentSnapshot, anchor: &CursorAnchor) -> Ordering {
        let bound: Vec<Cow<'_, Value>> = match anchor {
            CursorAnchor::Values(values) => values
                .iter()
                .zip(&self.order)
                .map(|(value, (path, _))| {
                    if path.is_document_id() {
                        document_id_operand(value)
                    } else {
                        Cow::Borrowed(value)
                    }
                })
                .collect(),
            CursorAnchor::Document { document } => self
                .order
                .iter()
                .map(|(path, _)| {
                    if path.is_document_id() {
                        Cow::Owned(Value::String(document.id.clone()))
                    } else {
                        get_field(&document.data, path).map_or(Cow::Owned(Value::Null), Cow::Borrowed)
                    }
                })
                .collect(),
        };

        for ((path, descending), anchor_value) in self.order.iter().zip(bound.iter()) {
            let Some(value) = field_value(doc, path) else {
                return Ordering::Less;
            };
            let ord = compare_values(&value, anchor_value);
            if ord != Ordering::Equal {
                return if *descending { ord.reverse() } else { ord };
            }
        }

        if let CursorAnchor::Document { document } = anchor {
            if !self.order.iter().any(|(path, _)| path.is_document_id()) {
                let ord = doc.id().cmp(document.id.as_str());
                return if self.last_descending() { ord.reverse() } else { ord };
            }
        }
        Ordering::Equal
    }
}

fn field_value<'a>(doc: &'a DocumentSnapshot, path: &FieldPath) -> Option<Cow<'a, Value>> {
    if path.is_document_id() {
        return Some(Cow::Owned(Value::String(doc.id().to_string())));
    }
    get_field(doc.data.as_ref()?, path).map(Cow::Borrowed)
}

/// Operands compared against the document id: a reference counts as its last path segment.
fn document_id_operand(value: &Value) -> Cow<'_, Value> {
    match value {
        Value::Reference(reference) => {
            let id = reference.path.rsplit('/').next().unwrap_or(&reference.path);
            Cow::Owned(Value::String(id.to_string()))
        }
        Value::Array(items) if items.iter().any(|item| matches!(item, Value::Reference(_))) => {
            Cow::Owned(Value::Array(items.iter().map(|item| document_id_operand(item).into_owned()).collect()))
        }
        other => Cow::Borrowed(other),
    }
}

fn candidates(value: &Value) -> &[Value] {
    value.as_array().unwrap_or(&[])
}

fn matches(doc: &DocumentSnapshot, predicate: &Predicate) -> bool {
    match predicate {
        Predicate::And(children) => children.iter().all(|p| matches(doc, p)),
        Predicate::Or(children) => children.iter().any(|p| matches(doc, p)),
        Predicate::Field { field_path, op, value } => {
            let Some(actual) = field_value(doc, field_path) else {
                return false;
            };
            let actual: &Value = &actual;
            let value = if field_path.is_document_id() {
                document_id_operand(value)
            } else {
                Cow::Borrowed(value)
            };
            let value: &Value = &value;
            match op {
                FilterOperator::Equal => values_equal(actual, value),
                FilterOperator::NotEqual => {
                    !matches!(actual, Value::Null) && !values_equal(actual, value)
                }
                FilterOperator::LessThan => same_type_cmp(actual, value) == Some(Ordering::Less),
                FilterOperator::LessThanOrEqual => {
                    matches!(same_type_cmp(actual, value), Some(Ordering::Less | Ordering::Equal))
                }
                FilterOperator::GreaterThan => same_type_cmp(actual, value) == Some(Ordering::Greater),
                FilterOperator::GreaterThanOrEqual => {
                    matches!(same_type_cmp(actual, value), Some(Ordering::Greater | Ordering::Equal))
                }
                FilterOperator::ArrayContains => actual
                    .as_array()
                    .is_some_and(|items| items.iter().any(|item| values_equal(item, value))),
                FilterOperator::ArrayContainsAny => actual.as_array().is_some_and(|items| {
                    items
                        .iter()
                        .any(|item| candidates(value).iter().any(|c| values_equal(item, c)))
                }),
                FilterOperator::In => candidates(value).iter().any(|c| values_equal(actual, c)),
                FilterOperator::NotIn => {
                    !matches!(actual, Value::Null)
                        && !candidates(value).iter().any(|c| values_equal(actual, c))
                }
            }
        }
    }
}

/// Range comparisons only match values of the same type class.
fn same_type_cmp(actual: &Value, expected: &Value) -> Option<Ordering> {
    (actual.type_order() == expected.type_order()).then(|| compare_values(actual, expected))
}

impl QueryBackend for MemoryQuery {
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

    fn filter(mut self, predicate: Predicate) -> Self {
        self.filters.push(predicate);
        self
    }

    fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(Limit::First(limit));
        self
    }

    fn limit_to_last(mut self, limit: u32) -> Self {
        self.limit = Some(Limit::Last(limit));
        self
    }

    fn order_by(mut self, field_path: &FieldPath, descending: bool) -> Self {
        self.order.push((field_path.clone(), descending));
        self
    }

    fn cursor(mut self, kind: CursorKind, anchor: &CursorAnchor) -> Self {
        self.cursors.push((kind, anchor.clone()));
        self
    }
}
