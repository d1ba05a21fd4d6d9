//! Flow error types.

use thiserror::Error;

use crate::field::FieldError;

/// Result type for flow operations.
pub type FlowResult<T> = Result<T, FlowError>;

/// Errors raised while composing or reading a flow.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FlowError {
    /// No more rows. Every read loop terminates on this; it is not a failure.
    #[error("end of stream")]
    EndOfStream,

    /// The store rejected or failed a statement. Never retried.
    #[error("query failed: {message}\nSQL: {sql}")]
    Execution { sql: String, message: String },

    /// Pagination, sort, predicates or aggregates changed after the first
    /// read without a `reset()` in between.
    #[error("flow already initialized; call reset() before changing it")]
    AlreadyInitialized,

    /// Referenced alias is not projected by the flow.
    #[error("unknown field alias: {0}")]
    UnknownField(String),

    /// A combined flow child other than the anchor has no join strategy.
    #[error("child {0} of combined flow has no join strategy")]
    MissingJoinStrategy(usize),

    /// A combined flow with no children cannot render.
    #[error("combined flow has no children")]
    Empty,

    #[error(transparent)]
    Field(#[from] FieldError),
}

impl FlowError {
    pub fn execution(sql: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Execution {
            sql: sql.into(),
            message: err.to_string(),
        }
    }

    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::EndOfStream)
    }
}
