//! Error types shared by the compiler, the filter evaluator and the enum mappers.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// Unknown operator token inside a filter tree, or a node of unrecognisable shape.
    #[error("invalid operator: {0}")]
    InvalidOperator(String),

    #[error("invalid source: {0}")]
    InvalidSource(String),

    #[error("invalid server timestamp behavior: {0}")]
    InvalidServerTimestampBehavior(String),

    /// The descriptor JSON could not be deserialized.
    #[error("invalid descriptor: {0}")]
    Descriptor(String),
}

impl From<serde_json::Error> for CompileError {
    fn from(err: serde_json::Error) -> Self {
        CompileError::Descriptor(err.to_string())
    }
}
