//! Filter-tree evaluator: folds a tree of conditions and AND/OR nodes into one predicate.

use crate::backend::QueryBackend;
use crate::descriptor::{Combinator, FilterNode};
use crate::error::CompileError;
use crate::operator::resolve_tree_operator;

/// Evaluate a filter tree into a single composite predicate for backend `B`.
///
/// Children are evaluated in input order. The first failing leaf aborts evaluation.
pub fn evaluate<B: QueryBackend>(node: &FilterNode) -> Result<B::Predicate, CompileError> {
    match node {
        FilterNode::Condition(leaf) => {
            let op = resolve_tree_operator(&leaf.operator)?;
            Ok(B::field_predicate(&leaf.field_path, op, &leaf.value))
        }
        FilterNode::Combinator(combinator) => {
            let children = combinator
                .children
                .iter()
                .map(evaluate::<B>)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(match combinator.operator {
                Combinator::And => B::and_predicate(children),
                Combinator::Or => B::or_predicate(children),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Predicate, RecordingQuery};
    use crate::field_path::FieldPath;
    use crate::operator::FilterOperator;
    use crate::value::Value;

    fn field(path: &str, op: FilterOperator, value: impl Into<Value>) -> Predicate {
        Predicate::Field { field_path: FieldPath::parse(path), op, value: value.into() }
    }

    #[test]
    fn test_leaf() {
        let node = FilterNode::condition("age", ">=", 18);
        let predicate = evaluate::<RecordingQuery>(&node).unwrap();
        assert_eq!(predicate, field("age", FilterOperator::GreaterThanOrEqual, 18));
    }

    #[test]
    fn test_nested_combinators_keep_child_order() {
        let node = FilterNode::and(vec![
            FilterNode::condition("a", "==", 1),
            FilterNode::or(vec![
                FilterNode::condition("b", "in", Value::Array(vec![Value::from("x")])),
                FilterNode::condition("c", "not-in", Value::Array(vec![Value::from("y")])),
            ]),
            FilterNode::condition("d", "array-contains", "z"),
        ]);
        let predicate = evaluate::<RecordingQuery>(&node).unwrap();
        assert_eq!(
            predicate,
            Predicate::And(vec![
                field("a", FilterOperator::Equal, 1),
                Predicate::Or(vec![
                    field("b", FilterOperator::In, Value::Array(vec![Value::from("x")])),
                    field("c", FilterOperator::NotIn, Value::Array(vec![Value::from("y")])),
                ]),
                field("d", FilterOperator::ArrayContains, "z"),
            ])
        );
    }

    #[test]
    fn test_unknown_operator_anywhere_fails() {
        let node = FilterNode::or(vec![
            FilterNode::condition("a", "==", 1),
            FilterNode::and(vec![FilterNode::condition("b", "like", "x%")]),
        ]);
        assert_eq!(
            evaluate::<RecordingQuery>(&node),
            Err(CompileError::InvalidOperator("like".to_string()))
        );
    }

    #[test]
    fn test_empty_combinator() {
        let predicate = evaluate::<RecordingQuery>(&FilterNode::and(vec![])).unwrap();
        assert_eq!(predicate, Predicate::And(vec![]));
    }

    #[test]
    fn test_deep_tree_does_not_overflow() {
        let mut node = FilterNode::condition("leaf", "==", true);
        for depth in 0..256 {
            node = if depth % 2 == 0 {
                FilterNode::and(vec![node])
            } else {
                FilterNode::or(vec![node])
            };
        }
        let mut predicate = evaluate::<RecordingQuery>(&node).unwrap();
        let mut levels = 0;
        loop {
            match predicate {
                Predicate::And(mut children) | Predicate::Or(mut children) => {
                    levels += 1;
                    predicate = children.remove(0);
                }
                Predicate::Field { .. } => break,
            }
        }
        assert_eq!(levels, 256);
    }
}
