//! Operator table: symbolic comparison/membership tokens to predicate constructors.

use crate::error::CompileError;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 比较运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterOperator {
    Equal,              // ==
    NotEqual,           // !=
    LessThan,           // <
    LessThanOrEqual,    // <=
    GreaterThan,        // >
    GreaterThanOrEqual, // >=
    ArrayContains,      // array-contains
    ArrayContainsAny,   // array-contains-any
    In,                 // in
    NotIn,              // not-in
}

impl FilterOperator {
    pub const ALL: [FilterOperator; 10] = [
        FilterOperator::Equal,
        FilterOperator::NotEqual,
        FilterOperator::LessThan,
        FilterOperator::LessThanOrEqual,
        FilterOperator::GreaterThan,
        FilterOperator::GreaterThanOrEqual,
        FilterOperator::ArrayContains,
        FilterOperator::ArrayContainsAny,
        FilterOperator::In,
        FilterOperator::NotIn,
    ];

    pub fn token(self) -> &'static str {
        match self {
            FilterOperator::Equal => "==",
            FilterOperator::NotEqual => "!=",
            FilterOperator::LessThan => "<",
            FilterOperator::LessThanOrEqual => "<=",
            FilterOperator::GreaterThan => ">",
            FilterOperator::GreaterThanOrEqual => ">=",
            FilterOperator::ArrayContains => "array-contains",
            FilterOperator::ArrayContainsAny => "array-contains-any",
            FilterOperator::In => "in",
            FilterOperator::NotIn => "not-in",
        }
    }

    /// Operators whose value is a list of candidates rather than a single operand.
    pub fn takes_list(self) -> bool {
        matches!(
            self,
            FilterOperator::ArrayContainsAny | FilterOperator::In | FilterOperator::NotIn
        )
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

pub fn resolve(token: &str) -> Option<FilterOperator> {
    FilterOperator::ALL.into_iter().find(|op| op.token() == token)
}

/// Resolution for leaves of a filter tree: an unknown token aborts compilation.
pub fn resolve_tree_operator(token: &str) -> Result<FilterOperator, CompileError> {
    resolve(token).ok_or_else(|| CompileError::InvalidOperator(token.to_string()))
}

/// Resolution for legacy flat conditions: an unknown token drops the condition.
///
/// Older clients may send operators this table does not know; those conditions are
/// skipped with a warning instead of failing the whole query.
pub fn resolve_legacy_operator(token: &str) -> Option<FilterOperator> {
    let resolved = resolve(token);
    if resolved.is_none() {
        warn!("skipping legacy condition with unsupported operator {:?}", token);
    }
    resolved
}
