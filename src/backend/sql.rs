//! SQL backend that renders a compiled query to PostgreSQL using sea-query.
//!
//! Documents live in one row each: a text id, the full collection path, the collection id
//! and a JSONB `data` column. Field paths become `"data" #> '{a,b}'` lookups and values
//! become JSONB literals, so comparisons follow JSONB semantics.
//!
//! Ordering a field that holds values of mixed types follows PostgreSQL's JSONB order
//! (object > array > boolean > number > string > null), not the cross-type order of
//! [`crate::value::compare_values`] that `MemoryQuery` sorts by. Single-typed fields sort
//! the same in both backends.

use super::{CursorKind, Predicate, QueryBackend, QueryScope};
use crate::compiler::{compile_traced, Diagnostic};
use crate::config::{CompilerConfig, DocumentColumns, OptimizationConfig};
use crate::descriptor::{CursorAnchor, QueryDescriptor};
use crate::error::CompileError;
use crate::field_path::FieldPath;
use crate::operator::FilterOperator;
use crate::value::{get_field, Value as DocValue};
use log::debug;
use sea_query::{Asterisk, Expr, Iden, Order, PostgresQueryBuilder, SelectStatement, SimpleExpr};
use std::collections::HashMap;

/// Represents a table identifier for sea-query
#[derive(Debug, Clone)]
pub struct TableName(pub String);

impl Iden for TableName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        let _ = write!(s, "{}", self.0);
    }
}

/// Column identifier wrapper
#[derive(Debug, Clone)]
pub struct ColumnName(pub String);

impl Iden for ColumnName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        let _ = write!(s, "{}", self.0);
    }
}

/// Represents an optimization applied while rendering
#[derive(Debug, Clone, PartialEq)]
pub enum Optimization {
    OrToIn { field: String, value_count: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Limit {
    First(u32),
    Last(u32),
}

/// A query over the document table, built stage by stage and rendered on demand.
#[derive(Debug, Clone)]
pub struct SqlQuery {
    table: String,
    columns: DocumentColumns,
    optimization: OptimizationConfig,
    scope: QueryScope,
    filters: Vec<Predicate>,
    order: Vec<(FieldPath, bool)>,
    cursors: Vec<(CursorKind, CursorAnchor)>,
    limit: Option<Limit>,
}

/// A rendered statement.
///
/// When `reverse_results` is set the statement reads the last rows in reversed order;
/// the caller must reverse the fetched rows to restore the declared order.
#[derive(Debug, Clone)]
pub struct RenderedQuery {
    pub statement: SelectStatement,
    pub reverse_results: bool,
    pub optimizations: Vec<Optimization>,
}

impl SqlQuery {
    pub fn new(scope: QueryScope, config: &CompilerConfig) -> Self {
        Self {
            table: config.get_table_name(scope.collection_id()).to_string(),
            columns: config.columns.clone(),
            optimization: config.optimization.clone(),
            scope,
            filters: Vec::new(),
            order: Vec::new(),
            cursors: Vec::new(),
            limit: None,
        }
    }

    pub fn render(&self) -> RenderedQuery {
        let mut renderer = Renderer {
            columns: &self.columns,
            optimization: &self.optimization,
            optimizations: Vec::new(),
        };
        let reverse = matches!(self.limit, Some(Limit::Last(_)));

        let mut select = SelectStatement::new();
        select.column(Asterisk).from(TableName(self.table.clone()));
        select.and_where(renderer.scope(&self.scope));

        for predicate in &self.filters {
            let expr = renderer.predicate(predicate);
            select.and_where(expr);
        }

        // Ordering on a field excludes documents that lack it.
        for (path, _) in &self.order {
            if !path.is_document_id() {
                select.and_where(Expr::expr(renderer.field(path)).is_not_null());
            }
        }

        for (kind, anchor) in &self.cursors {
            select.and_where(renderer.cursor(*kind, anchor, &self.order));
        }

        for (path, descending) in &self.order {
            select.order_by_expr(renderer.field(path), direction(*descending != reverse));
        }
        if !self.order.iter().any(|(path, _)| path.is_document_id()) {
            let last_descending = self.order.last().is_some_and(|(_, descending)| *descending);
            select.order_by_expr(renderer.id_column(), direction(last_descending != reverse));
        }

        if let Some(Limit::First(n) | Limit::Last(n)) = self.limit {
            select.limit(u64::from(n));
        }

        RenderedQuery {
            statement: select,
            reverse_results: reverse,
            optimizations: renderer.optimizations,
        }
    }

    pub fn to_sql(&self) -> String {
        self.render().statement.to_string(PostgresQueryBuilder)
    }
}

fn direction(descending: bool) -> Order {
    if descending {
        Order::Desc
    } else {
        Order::Asc
    }
}

fn json_text(value: &DocValue) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

/// Postgres text[] literal for a path, e.g. `{address,city}`.
fn text_array(segments: &[String]) -> String {
    let items: Vec<String> = segments
        .iter()
        .map(|segment| {
            let plain = !segment.is_empty()
                && segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
            if plain {
                segment.clone()
            } else {
                format!("\"{}\"", segment.replace('\\', "\\\\").replace('"', "\\\""))
            }
        })
        .collect();
    format!("{{{}}}", items.join(","))
}

fn constant(b: bool) -> SimpleExpr {
    Expr::val(b).into()
}

struct Renderer<'a> {
    columns: &'a DocumentColumns,
    optimization: &'a OptimizationConfig,
    optimizations: Vec<Optimization>,
}

impl Renderer<'_> {
    fn id_column(&self) -> SimpleExpr {
        Expr::col(ColumnName(self.columns.id.clone())).into()
    }

    fn scope(&self, scope: &QueryScope) -> SimpleExpr {
        match scope {
            QueryScope::Collection(path) => Expr::col(ColumnName(self.columns.collection_path.clone()))
                .eq(Expr::val(path.trim_end_matches('/').to_string())),
            QueryScope::CollectionGroup(id) => {
                Expr::col(ColumnName(self.columns.collection_id.clone())).eq(Expr::val(id.clone()))
            }
        }
    }

    /// `"data" #> '{a,b}'`, or the id column for the document-id path.
    fn field(&self, path: &FieldPath) -> SimpleExpr {
        if path.is_document_id() {
            return self.id_column();
        }
        let data: SimpleExpr = Expr::col(ColumnName(self.columns.data.clone())).into();
        Expr::cust_with_exprs("$1 #> $2", [data, Expr::val(text_array(path.segments())).into()])
    }

    fn json(&self, value: &DocValue) -> SimpleExpr {
        Expr::cust_with_values("$1::jsonb", [json_text(value)])
    }

    /// Right-hand operand: text for the id column, JSONB otherwise.
    fn operand(&self, path: &FieldPath, value: &DocValue) -> SimpleExpr {
        if !path.is_document_id() {
            return self.json(value);
        }
        let id = match value {
            DocValue::String(s) => s.clone(),
            DocValue::Reference(reference) => {
                reference.path.rsplit('/').next().unwrap_or(&reference.path).to_string()
            }
            other => json_text(other),
        };
        Expr::val(id).into()
    }

    /// The field exists and is not JSON null.
    fn present(&self, path: &FieldPath, field: SimpleExpr) -> SimpleExpr {
        let not_missing = Expr::expr(field.clone()).is_not_null();
        if path.is_document_id() {
            return not_missing;
        }
        not_missing.and(Expr::expr(field).ne(self.json(&DocValue::Null)))
    }

    /// Range operators only match values of the same JSON type.
    fn same_type(&self, path: &FieldPath, field: SimpleExpr, value: &DocValue) -> SimpleExpr {
        if path.is_document_id() {
            return constant(true);
        }
        Expr::cust_with_exprs("jsonb_typeof($1) = jsonb_typeof($2)", [field, self.json(value)])
    }

    fn contains(&self, field: SimpleExpr, element: &DocValue) -> SimpleExpr {
        Expr::cust_with_exprs(
            "$1 @> $2",
            [field, self.json(&DocValue::Array(vec![element.clone()]))],
        )
    }

    fn comparison(&self, path: &FieldPath, op: FilterOperator, value: &DocValue) -> SimpleExpr {
        let field = self.field(path);
        let candidates = value.as_array().unwrap_or(&[]);
        match op {
            FilterOperator::Equal => Expr::expr(field).eq(self.operand(path, value)),
            FilterOperator::NotEqual => self
                .present(path, field.clone())
                .and(Expr::expr(field).ne(self.operand(path, value))),
            FilterOperator::LessThan => self
                .same_type(path, field.clone(), value)
                .and(Expr::expr(field).lt(self.operand(path, value))),
            FilterOperator::LessThanOrEqual => self
                .same_type(path, field.clone(), value)
                .and(Expr::expr(field).lte(self.operand(path, value))),
            FilterOperator::GreaterThan => self
                .same_type(path, field.clone(), value)
                .and(Expr::expr(field).gt(self.operand(path, value))),
            FilterOperator::GreaterThanOrEqual => self
                .same_type(path, field.clone(), value)
                .and(Expr::expr(field).gte(self.operand(path, value))),
            FilterOperator::ArrayContains => self.contains(field, value),
            FilterOperator::ArrayContainsAny => candidates
                .iter()
                .map(|candidate| self.contains(field.clone(), candidate))
                .reduce(SimpleExpr::or)
                .unwrap_or_else(|| constant(false)),
            FilterOperator::In => {
                if candidates.is_empty() {
                    return constant(false);
                }
                Expr::expr(field).is_in(candidates.iter().map(|c| self.operand(path, c)))
            }
            FilterOperator::NotIn => {
                let present = self.present(path, field.clone());
                if candidates.is_empty() {
                    return present;
                }
                present.and(Expr::expr(field).is_not_in(candidates.iter().map(|c| self.operand(path, c))))
            }
        }
    }

    fn predicate(&mut self, predicate: &Predicate) -> SimpleExpr {
        match predicate {
            Predicate::Field { field_path, op, value } => self.comparison(field_path, *op, value),
            Predicate::And(children) => children
                .iter()
                .map(|child| self.predicate(child))
                .reduce(SimpleExpr::and)
                .unwrap_or_else(|| constant(true)),
            Predicate::Or(children) => {
                if let Some(in_expr) = self.try_optimize_or_to_in(predicate) {
                    return in_expr;
                }
                children
                    .iter()
                    .map(|child| self.predicate(child))
                    .reduce(SimpleExpr::or)
                    .unwrap_or_else(|| constant(false))
            }
        }
    }

    /// Rewrite an OR of equalities on one field into a single IN
    fn try_optimize_or_to_in(&mut self, predicate: &Predicate) -> Option<SimpleExpr> {
        let mut values = Vec::new();
        let field_path = collect_equality_values(predicate, None, &mut values)?;

        if values.len() < self.optimization.max_or_conditions_for_in.max(2) {
            return None;
        }
        debug!("rewriting {} equalities on {} as IN", values.len(), field_path);
        let in_expr = Expr::expr(self.field(field_path))
            .is_in(values.iter().map(|value| self.operand(field_path, value)));
        self.optimizations.push(Optimization::OrToIn {
            field: field_path.to_string(),
            value_count: values.len(),
        });
        Some(in_expr)
    }

    /// Positional bound against the declared ordering, expanded lexicographically:
    /// `(f1 > v1) OR (f1 = v1 AND f2 > v2) OR ...`, plus the all-equal term when inclusive.
    fn cursor(&self, kind: CursorKind, anchor: &CursorAnchor, order: &[(FieldPath, bool)]) -> SimpleExpr {
        let mut bounds: Vec<(SimpleExpr, SimpleExpr, bool)> = match anchor {
            CursorAnchor::Values(values) => order
                .iter()
                .zip(values)
                .map(|((path, descending), value)| (self.field(path), self.operand(path, value), *descending))
                .collect(),
            CursorAnchor::Document { document } => order
                .iter()
                .map(|(path, descending)| {
                    let value = if path.is_document_id() {
                        DocValue::String(document.id.clone())
                    } else {
                        get_field(&document.data, path).cloned().unwrap_or(DocValue::Null)
                    };
                    (self.field(path), self.operand(path, &value), *descending)
                })
                .collect(),
        };

        if let CursorAnchor::Document { document } = anchor {
            if !order.iter().any(|(path, _)| path.is_document_id()) {
                let last_descending = order.last().is_some_and(|(_, descending)| *descending);
                bounds.push((self.id_column(), Expr::val(document.id.clone()).into(), last_descending));
            }
        }

        let mut alternatives: Vec<SimpleExpr> = Vec::with_capacity(bounds.len() + 1);
        for (i, (field, value, descending)) in bounds.iter().enumerate() {
            let field = Expr::expr(field.clone());
            // 升序时起始游标取大于, 降序时反过来
            let strict = if kind.is_start() != *descending {
                field.gt(value.clone())
            } else {
                field.lt(value.clone())
            };
            let term = bounds[..i]
                .iter()
                .map(|(f, v, _)| Expr::expr(f.clone()).eq(v.clone()))
                .chain(std::iter::once(strict))
                .reduce(SimpleExpr::and);
            alternatives.extend(term);
        }
        if kind.is_inclusive() {
            let all_equal = bounds
                .iter()
                .map(|(f, v, _)| Expr::expr(f.clone()).eq(v.clone()))
                .reduce(SimpleExpr::and)
                .unwrap_or_else(|| constant(true));
            alternatives.push(all_equal);
        }

        alternatives
            .into_iter()
            .reduce(SimpleExpr::or)
            .unwrap_or_else(|| constant(true))
    }
}

/// Recursively collect equality values from an OR tree over a single field
fn collect_equality_values<'a>(
    predicate: &'a Predicate,
    field: Option<&'a FieldPath>,
    values: &mut Vec<&'a DocValue>,
) -> Option<&'a FieldPath> {
    match predicate {
        Predicate::Field { field_path, op: FilterOperator::Equal, value } => {
            if field.is_some_and(|f| f != field_path) {
                return None;
            }
            values.push(value);
            Some(field_path)
        }
        Predicate::Or(children) => {
            let mut field = field;
            for child in children {
                field = Some(collect_equality_values(child, field, values)?);
            }
            field
        }
        _ => None, // Other predicate types break the equality pattern
    }
}

impl QueryBackend for SqlQuery {
    type Predicate = Predicate;

    fn field_predicate(field_path: &FieldPath, op: FilterOperator, value: &DocValue) -> Predicate {
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

/// Result of SQL compilation with optimization information
#[derive(Debug)]
pub struct CompileResult {
    pub sql: String,
    pub reverse_results: bool,
    pub optimizations: Vec<Optimization>,
    pub diagnostics: Vec<Diagnostic>,
}

/// SQL Compiler that turns query descriptors into SQL over the document table
#[derive(Debug, Clone, Default)]
pub struct SqlCompiler {
    config: CompilerConfig,
}

impl SqlCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: CompilerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Set table mapping for collection ids
    pub fn set_table_mapping(&mut self, mapping: HashMap<String, String>) {
        self.config.table_mapping = mapping;
    }

    pub fn base_query(&self, scope: QueryScope) -> SqlQuery {
        SqlQuery::new(scope, &self.config)
    }

    /// Compile a descriptor into SQL
    pub fn compile(
        &self,
        descriptor: &QueryDescriptor,
        scope: QueryScope,
    ) -> Result<CompileResult, CompileError> {
        let compilation = compile_traced(descriptor, self.base_query(scope))?;
        let rendered = compilation.query.render();
        Ok(CompileResult {
            sql: rendered.statement.to_string(PostgresQueryBuilder),
            reverse_results: rendered.reverse_results,
            optimizations: rendered.optimizations,
            diagnostics: compilation.diagnostics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OptimizationConfig;
    use crate::descriptor::{DocumentAnchor, FilterNode, LegacyCondition, OrderBy};

    fn users() -> QueryScope {
        QueryScope::Collection("users".to_string())
    }

    #[test]
    fn test_simple_filter_compilation() {
        let compiler = SqlCompiler::new();
        let descriptor = QueryDescriptor {
            legacy_conditions: vec![LegacyCondition::new("age", ">=", 18)],
            ..Default::default()
        };

        let result = compiler.compile(&descriptor, users()).unwrap();
        assert!(result.sql.contains(r#"FROM "documents""#));
        assert!(result.sql.contains(r#""collection_path" = 'users'"#));
        assert!(result.sql.contains(r#""data" #> '{age}'"#));
        assert!(result.sql.contains("'18'::jsonb"));
        assert!(result.sql.contains("jsonb_typeof"));
        assert!(!result.reverse_results);
    }

    #[test]
    fn test_nested_field_path() {
        let query = SqlCompiler::new()
            .base_query(users())
            .where_field(&FieldPath::parse("address.city"), FilterOperator::Equal, &DocValue::from("Oslo"));
        let sql = query.to_sql();
        assert!(sql.contains(r#""data" #> '{address,city}'"#));
        // 含双引号的字符串以 E'...' 形式转义
        assert!(sql.contains(r#"E'\"Oslo\"'::jsonb"#));
    }

    #[test]
    fn test_collection_group_and_table_mapping() {
        let mut compiler = SqlCompiler::new();
        let mut mapping = HashMap::new();
        mapping.insert("posts".to_string(), "post_docs".to_string());
        compiler.set_table_mapping(mapping);

        let result = compiler
            .compile(&QueryDescriptor::default(), QueryScope::CollectionGroup("posts".to_string()))
            .unwrap();
        assert!(result.sql.contains(r#"FROM "post_docs""#));
        assert!(result.sql.contains(r#""collection_id" = 'posts'"#));

        let result = compiler
            .compile(&QueryDescriptor::default(), QueryScope::Collection("teams/t1/posts".to_string()))
            .unwrap();
        assert!(result.sql.contains(r#"FROM "post_docs""#));
        assert!(result.sql.contains(r#""collection_path" = 'teams/t1/posts'"#));
    }

    #[test]
    fn test_or_to_in_optimization() {
        let config = CompilerConfig {
            optimization: OptimizationConfig { max_or_conditions_for_in: 2 },
            ..Default::default()
        };
        let compiler = SqlCompiler::from_config(config);
        let descriptor = QueryDescriptor {
            filter_tree: Some(FilterNode::or(vec![
                FilterNode::condition("status", "==", "Open"),
                FilterNode::or(vec![
                    FilterNode::condition("status", "==", "Pending"),
                    FilterNode::condition("status", "==", "Review"),
                ]),
            ])),
            ..Default::default()
        };

        let result = compiler.compile(&descriptor, users()).unwrap();
        assert_eq!(
            result.optimizations,
            vec![Optimization::OrToIn { field: "status".to_string(), value_count: 3 }]
        );
        assert!(result.sql.contains(" IN ("));
    }

    #[test]
    fn test_or_over_different_fields_is_not_rewritten() {
        let config = CompilerConfig {
            optimization: OptimizationConfig { max_or_conditions_for_in: 2 },
            ..Default::default()
        };
        let descriptor = QueryDescriptor {
            filter_tree: Some(FilterNode::or(vec![
                FilterNode::condition("status", "==", "active"),
                FilterNode::condition("role", "==", "admin"),
            ])),
            ..Default::default()
        };
        let result = SqlCompiler::from_config(config).compile(&descriptor, users()).unwrap();
        assert!(result.optimizations.is_empty());
        assert!(result.sql.contains(" OR "));
    }

    #[test]
    fn test_limit_to_last_reverses_order() {
        let descriptor = QueryDescriptor {
            order_by: vec![OrderBy::new("createdAt", false)],
            limit_to_last: Some(3),
            ..Default::default()
        };
        let result = SqlCompiler::new().compile(&descriptor, users()).unwrap();
        assert!(result.reverse_results);
        assert!(result.sql.contains(r#"ORDER BY "data" #> '{createdAt}' DESC"#));
        assert!(result.sql.contains("LIMIT 3"));
    }

    #[test]
    fn test_order_by_adds_existence_and_id_tiebreak() {
        let descriptor = QueryDescriptor {
            order_by: vec![OrderBy::new("score", true)],
            limit: Some(10),
            ..Default::default()
        };
        let result = SqlCompiler::new().compile(&descriptor, users()).unwrap();
        assert!(result.sql.contains(r#"("data" #> '{score}') IS NOT NULL"#));
        assert!(result.sql.contains(r#""id" DESC"#));
        assert!(result.sql.contains("LIMIT 10"));
    }

    #[test]
    fn test_start_after_values() {
        let descriptor = QueryDescriptor {
            order_by: vec![OrderBy::new("createdAt", false)],
            start_after: Some(CursorAnchor::Values(vec![DocValue::from("2024-01-01")])),
            ..Default::default()
        };
        let result = SqlCompiler::new().compile(&descriptor, users()).unwrap();
        assert!(result.sql.contains(r#"> (E'\"2024-01-01\"'::jsonb)"#));
    }

    #[test]
    fn test_document_anchor_uses_id_tiebreak() {
        let descriptor = QueryDescriptor {
            order_by: vec![OrderBy::new("score", false)],
            end_before: Some(CursorAnchor::Document {
                document: DocumentAnchor {
                    id: "doc123".to_string(),
                    data: serde_json::from_str(r#"{"score": 7}"#).unwrap(),
                },
            }),
            ..Default::default()
        };
        let result = SqlCompiler::new().compile(&descriptor, users()).unwrap();
        assert!(result.sql.contains("'7'::jsonb"));
        assert!(result.sql.contains(r#""id" < 'doc123'"#));
    }

    #[test]
    fn test_unknown_tree_operator_fails() {
        let descriptor = QueryDescriptor {
            filter_tree: Some(FilterNode::condition("name", "~=", "x")),
            ..Default::default()
        };
        assert_eq!(
            SqlCompiler::new().compile(&descriptor, users()).unwrap_err(),
            CompileError::InvalidOperator("~=".to_string())
        );
    }

    #[test]
    fn test_skipped_legacy_condition_is_reported() {
        let descriptor = QueryDescriptor {
            legacy_conditions: vec![LegacyCondition::new("name", "~=", "x")],
            ..Default::default()
        };
        let result = SqlCompiler::new().compile(&descriptor, users()).unwrap();
        assert_eq!(result.diagnostics.len(), 1);
        assert!(!result.sql.contains("'{name}'"));
    }
}
