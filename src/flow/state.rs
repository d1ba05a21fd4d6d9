//! State shared by every flow shape: pagination, sort, clauses, aggregate
//! registry and the read cursor.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{FlowError, FlowResult};
use crate::exec::RowCursor;
use crate::predicate::{PredicateId, WhereClause};
use crate::sql::SortDir;

/// Sort direction as it appears in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl From<SortOrder> for SortDir {
    fn from(order: SortOrder) -> Self {
        match order {
            SortOrder::Asc => SortDir::Asc,
            SortOrder::Desc => SortDir::Desc,
        }
    }
}

/// One ORDER BY entry, by output alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub alias: String,
    #[serde(default)]
    pub order: SortOrder,
}

impl SortSpec {
    pub fn asc(alias: &str) -> Self {
        Self {
            alias: alias.into(),
            order: SortOrder::Asc,
        }
    }

    pub fn desc(alias: &str) -> Self {
        Self {
            alias: alias.into(),
            order: SortOrder::Desc,
        }
    }
}

/// Read lifecycle: `Uninitialized -> Streaming -> Exhausted`.
pub(crate) enum Cursor {
    Uninitialized,
    Streaming {
        sql: String,
        count: u64,
        rows: Box<dyn RowCursor>,
    },
    Exhausted {
        count: u64,
    },
}

impl Cursor {
    pub(crate) fn count(&self) -> Option<u64> {
        match self {
            Cursor::Uninitialized => None,
            Cursor::Streaming { count, .. } | Cursor::Exhausted { count } => Some(*count),
        }
    }
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cursor::Uninitialized => f.write_str("Uninitialized"),
            Cursor::Streaming { count, .. } => write!(f, "Streaming({count})"),
            Cursor::Exhausted { count } => write!(f, "Exhausted({count})"),
        }
    }
}

/// Pagination, ordering and filtering attached to one flow node.
///
/// Cloning yields an uninitialized copy: cursors are never shared.
#[derive(Debug)]
pub struct FlowState {
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
    pub(crate) sort: Vec<SortSpec>,
    pub(crate) clauses: Vec<WhereClause>,
    pub(crate) aggregates: Vec<String>,
    pub(crate) cursor: Cursor,
}

impl Default for FlowState {
    fn default() -> Self {
        Self {
            limit: None,
            offset: None,
            sort: Vec::new(),
            clauses: Vec::new(),
            aggregates: Vec::new(),
            cursor: Cursor::Uninitialized,
        }
    }
}

impl Clone for FlowState {
    fn clone(&self) -> Self {
        Self {
            limit: self.limit,
            offset: self.offset,
            sort: self.sort.clone(),
            clauses: self.clauses.clone(),
            aggregates: self.aggregates.clone(),
            cursor: Cursor::Uninitialized,
        }
    }
}

impl FlowState {
    pub fn is_initialized(&self) -> bool {
        !matches!(self.cursor, Cursor::Uninitialized)
    }

    pub(crate) fn ensure_mutable(&self) -> FlowResult<()> {
        if self.is_initialized() {
            Err(FlowError::AlreadyInitialized)
        } else {
            Ok(())
        }
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    pub fn sort(&self) -> &[SortSpec] {
        &self.sort
    }

    pub fn clauses(&self) -> &[WhereClause] {
        &self.clauses
    }

    pub fn aggregates(&self) -> &[String] {
        &self.aggregates
    }

    pub(crate) fn remove_clause(&mut self, id: PredicateId) -> bool {
        let before = self.clauses.len();
        self.clauses.retain(|clause| clause.id() != id);
        self.clauses.len() != before
    }

    /// LIMIT/OFFSET to render once the row count is known.
    ///
    /// An offset without a limit fetches the remaining tail. The count and
    /// the main query are separate statements, so a write landing between
    /// them can leave this limit stale.
    pub(crate) fn pagination(&self, count: u64) -> (Option<u64>, Option<u64>) {
        match (self.limit, self.offset) {
            (None, None) => (None, None),
            (Some(limit), None) => (Some(limit), Some(0)),
            (None, Some(offset)) => (Some(count.saturating_sub(offset)), Some(offset)),
            (Some(limit), Some(offset)) => (Some(limit), Some(offset)),
        }
    }
}
