//! Execution-provider error types.

use thiserror::Error;

/// Result type for execution-provider operations.
pub type ExecResult<T> = Result<T, ExecError>;

/// Errors raised by an [`Executor`](super::Executor).
#[derive(Error, Debug)]
pub enum ExecError {
    /// The SQLite driver rejected or failed the statement.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A count query returned something other than one integer.
    #[error("count query returned no usable value")]
    InvalidCount,

    /// Any other provider failure.
    #[error("{0}")]
    Other(String),
}
