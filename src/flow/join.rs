//! Join strategies: how a child flow attaches to the flows before it.

use serde::{Deserialize, Serialize};

use super::Flow;
use crate::predicate::WhereClause;
use crate::sql::{conjunction, table_col, Expr, ExprExt, JoinType};

/// SQL join kind used to attach a child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinKind {
    Inner,
    #[default]
    Left,
}

impl From<JoinKind> for JoinType {
    fn from(kind: JoinKind) -> Self {
        match kind {
            JoinKind::Inner => JoinType::Inner,
            JoinKind::Left => JoinType::Left,
        }
    }
}

/// A column on a specific table alias.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(table: &str, column: &str) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }

    pub fn to_expr(&self) -> Expr {
        table_col(&self.table, &self.column)
    }
}

/// Computes the ON clause for one child.
///
/// `pairs` equate a column already in the FROM list with a column of the
/// child. Absorbed clauses and the child's own join clauses are ANDed into
/// the ON clause so an outer join keeps its unmatched rows.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinStrategy {
    kind: JoinKind,
    pairs: Vec<(ColumnRef, ColumnRef)>,
    absorbed: Vec<WhereClause>,
}

impl JoinStrategy {
    pub fn new(kind: JoinKind) -> Self {
        Self {
            kind,
            pairs: Vec::new(),
            absorbed: Vec::new(),
        }
    }

    pub fn left() -> Self {
        Self::new(JoinKind::Left)
    }

    pub fn inner() -> Self {
        Self::new(JoinKind::Inner)
    }

    /// `parent = child`.
    pub fn on(mut self, parent: ColumnRef, child: ColumnRef) -> Self {
        self.pairs.push((parent, child));
        self
    }

    /// Fold an extra condition into the ON clause.
    pub fn absorb(&mut self, clause: WhereClause) {
        self.absorbed.push(clause);
    }

    pub fn kind(&self) -> JoinKind {
        self.kind
    }

    pub fn pairs(&self) -> &[(ColumnRef, ColumnRef)] {
        &self.pairs
    }

    /// ON clause: key equalities, absorbed clauses, then `extra`.
    ///
    /// `None` renders as `ON 1 = 1` by the caller; a join without pairs only
    /// makes sense with extra conditions.
    pub fn on_condition(&self, extra: Vec<Expr>) -> Option<Expr> {
        let keys = self
            .pairs
            .iter()
            .map(|(parent, child)| child.to_expr().eq(parent.to_expr()));
        let absorbed = self.absorbed.iter().map(WhereClause::join_condition);
        conjunction(keys.chain(absorbed).chain(extra))
    }
}

/// A child flow and the strategy attaching it. The anchor has no strategy.
#[derive(Debug, Clone)]
pub struct JoinDescription {
    pub flow: Flow,
    pub strategy: Option<JoinStrategy>,
}

impl JoinDescription {
    pub fn anchor(flow: Flow) -> Self {
        Self {
            flow,
            strategy: None,
        }
    }

    pub fn joined(flow: Flow, strategy: JoinStrategy) -> Self {
        Self {
            flow,
            strategy: Some(strategy),
        }
    }
}
