//! Query compiler: applies a descriptor to a backend query in a fixed stage order.
//!
//! ```text
//! compile()
//!   ├─ filter tree   → evaluate() → one composite filter     (errors abort)
//!   ├─ legacy where  → where_field() per known operator      (unknown: skipped)
//!   ├─ limit
//!   ├─ limitToLast
//!   ├─ orderBy empty → return, no cursor stage
//!   ├─ orderBy       → order_by() per entry
//!   └─ cursors       → startAt, startAfter, endAt, endBefore
//! ```

use crate::backend::{CursorKind, QueryBackend};
use crate::descriptor::QueryDescriptor;
use crate::error::CompileError;
use crate::field_path::FieldPath;
use crate::filter::evaluate;
use crate::operator::resolve_legacy_operator;
use log::debug;

/// Something noteworthy that did not stop compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A legacy condition with an unknown operator was dropped.
    SkippedCondition { field_path: FieldPath, operator: String },
    /// Cursors were present but `orderBy` was empty, so none were applied.
    CursorsIgnored,
}

/// A compiled query together with the diagnostics gathered on the way.
#[derive(Debug)]
pub struct Compilation<B> {
    pub query: B,
    pub diagnostics: Vec<Diagnostic>,
}

/// Compile `descriptor` onto `base`, the collection or collection-group query.
///
/// # Errors
/// Returns `CompileError::InvalidOperator` when the filter tree contains an unknown
/// operator. The partially built query is dropped.
pub fn compile<B: QueryBackend>(descriptor: &QueryDescriptor, base: B) -> Result<B, CompileError> {
    compile_traced(descriptor, base).map(|compilation| compilation.query)
}

/// Same as [`compile`], also returning the diagnostics.
///
/// # Errors
/// See [`compile`].
pub fn compile_traced<B: QueryBackend>(
    descriptor: &QueryDescriptor,
    base: B,
) -> Result<Compilation<B>, CompileError> {
    let mut diagnostics = Vec::new();
    let mut query = base;

    if let Some(tree) = &descriptor.filter_tree {
        query = query.filter(evaluate::<B>(tree)?);
    }

    for condition in &descriptor.legacy_conditions {
        match resolve_legacy_operator(&condition.operator) {
            Some(op) => query = query.where_field(&condition.field_path, op, &condition.value),
            None => diagnostics.push(Diagnostic::SkippedCondition {
                field_path: condition.field_path.clone(),
                operator: condition.operator.clone(),
            }),
        }
    }

    if let Some(limit) = descriptor.limit {
        query = query.limit(limit);
    }
    if let Some(limit) = descriptor.limit_to_last {
        if descriptor.limit.is_some() {
            debug!("both limit and limitToLast set; backend keeps the last one applied");
        }
        query = query.limit_to_last(limit);
    }

    if descriptor.order_by.is_empty() {
        if descriptor.has_cursor() {
            debug!("cursors ignored: no orderBy declared");
            diagnostics.push(Diagnostic::CursorsIgnored);
        }
        return Ok(Compilation { query, diagnostics });
    }

    for order in &descriptor.order_by {
        query = query.order_by(&order.field_path, order.descending);
    }

    let cursors = [
        (CursorKind::StartAt, &descriptor.start_at),
        (CursorKind::StartAfter, &descriptor.start_after),
        (CursorKind::EndAt, &descriptor.end_at),
        (CursorKind::EndBefore, &descriptor.end_before),
    ];
    for (kind, anchor) in cursors {
        if let Some(anchor) = anchor {
            query = query.cursor(kind, anchor);
        }
    }

    Ok(Compilation { query, diagnostics })
}
