//! Compiles declarative query descriptors into backend queries.
//!
//! A [`QueryDescriptor`] is applied to any [`QueryBackend`] by [`compile`]. Three backends
//! ship with the crate: [`SqlQuery`] renders PostgreSQL over a JSONB document table,
//! [`MemoryQuery`] evaluates against in-memory documents and [`RecordingQuery`] records the
//! stages it receives.

pub mod backend;
pub mod compiler;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod field_path;
pub mod filter;
pub mod logger;
pub mod operator;
pub mod options;
pub mod snapshot;
pub mod value;

pub use backend::sql::{CompileResult, Optimization};
pub use backend::{CursorKind, MemoryQuery, Predicate, QueryBackend, QueryScope, RecordingQuery, SqlCompiler, SqlQuery};
pub use compiler::{compile, compile_traced, Compilation, Diagnostic};
pub use config::CompilerConfig;
pub use descriptor::{parse_descriptor_json, CursorAnchor, FilterNode, QueryDescriptor};
pub use error::CompileError;
pub use field_path::FieldPath;
pub use filter::evaluate;
pub use operator::{resolve_legacy_operator, resolve_tree_operator, FilterOperator};
pub use options::{map_source, map_timestamp_behavior, ServerTimestampBehavior, Source};
pub use snapshot::{to_output_metadata, to_output_snapshot, DocumentSnapshot, OutputSnapshot, SnapshotMetadata};
pub use value::Value;
