//! Execution provider.
//!
//! Flows never talk to a database directly: they hand rendered SQL to an
//! [`Executor`] and read rows back through a forward-only [`RowCursor`].
//! [`SqliteExecutor`] is the bundled implementation.

mod error;
mod record;
mod sqlite;

pub use error::{ExecError, ExecResult};
pub use record::Record;
pub use sqlite::SqliteExecutor;

use std::collections::VecDeque;

use crate::sql::Dialect;

/// Runs SELECT statements.
pub trait Executor {
    /// Dialect the SQL handed to this executor must be rendered in.
    fn dialect(&self) -> Dialect;

    /// Execute `sql` and return a cursor over its rows.
    fn query(&self, sql: &str) -> ExecResult<Box<dyn RowCursor>>;

    /// Execute a single-value count query.
    fn count(&self, sql: &str) -> ExecResult<u64>;
}

/// Forward-only row iterator. `Ok(None)` once the result set is exhausted.
pub trait RowCursor {
    fn next_row(&mut self) -> ExecResult<Option<Record>>;
}

/// Cursor over rows already fetched into memory.
#[derive(Debug, Default)]
pub struct BufferedCursor {
    rows: VecDeque<Record>,
}

impl BufferedCursor {
    pub fn new(rows: impl IntoIterator<Item = Record>) -> Self {
        Self {
            rows: rows.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

impl RowCursor for BufferedCursor {
    fn next_row(&mut self) -> ExecResult<Option<Record>> {
        Ok(self.rows.pop_front())
    }
}
