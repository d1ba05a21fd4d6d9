//! Relationship tests against a filtered satellite table.

use serde::{Deserialize, Serialize};

use super::{null_inclusive, Operator, Predicate, PredicateId, PredicateResult, PredicateValue};
use crate::field::FieldType;
use crate::sql::{conjunction, table_col, Expr, ExprExt, Join, JoinType, Query, TableRef};

const MEMBER_TABLE: &str = "member";
const MEMBER_KEY: &str = "member_key";

/// Whether the correlated set must contain or exclude the row's key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipMode {
    #[default]
    Contains,
    Excludes,
}

/// "Rows of `target` matching `conditions` contain (or exclude) this key."
///
/// In WHERE position it renders as a LEFT JOIN against
/// `(SELECT DISTINCT key FROM target WHERE ...)` plus an `IS [NOT] NULL`
/// test on the joined key.
///
/// Folded into a JOIN's ON clause it does not use that join form: an ON
/// clause cannot bring a join of its own, so it renders as
/// `column [NOT] IN (SELECT DISTINCT key ...)` instead. Both forms select
/// the same rows, and exclusion keeps rows whose column is NULL in both.
#[derive(Debug, Clone, PartialEq)]
pub struct MembershipPredicate {
    id: PredicateId,
    outer_table: Option<String>,
    outer_column: String,
    target_table: String,
    target_key: String,
    conditions: Vec<Predicate>,
    mode: MembershipMode,
    join_clause: bool,
}

impl MembershipPredicate {
    pub fn new(
        outer_table: Option<&str>,
        outer_column: &str,
        target_table: &str,
        target_key: &str,
        mode: MembershipMode,
    ) -> Self {
        Self {
            id: PredicateId::next(),
            outer_table: outer_table.map(String::from),
            outer_column: outer_column.into(),
            target_table: target_table.into(),
            target_key: target_key.into(),
            conditions: Vec::new(),
            mode,
            join_clause: false,
        }
    }

    /// Restrict the correlated set with `column <op> value` on the target.
    pub fn with_condition(
        mut self,
        column: &str,
        operator: Operator,
        value: impl Into<PredicateValue>,
        field_type: FieldType,
    ) -> PredicateResult<Self> {
        let condition = Predicate::new(Some(MEMBER_TABLE), column, operator, value, field_type)?;
        self.conditions.push(condition);
        Ok(self)
    }

    pub fn as_join_clause(mut self) -> Self {
        self.join_clause = true;
        self
    }

    pub fn id(&self) -> PredicateId {
        self.id
    }

    pub fn mode(&self) -> MembershipMode {
        self.mode
    }

    pub fn is_join_clause(&self) -> bool {
        self.join_clause
    }

    /// Alias of the derived table in the outer FROM list.
    pub fn alias(&self) -> String {
        format!("membership_{}", self.id)
    }

    fn outer_expr(&self) -> Expr {
        match &self.outer_table {
            Some(table) => table_col(table, &self.outer_column),
            None => crate::sql::col(&self.outer_column),
        }
    }

    /// `SELECT DISTINCT member.key FROM target AS member WHERE ...`.
    pub fn member_query(&self) -> Query {
        let key = table_col(MEMBER_TABLE, &self.target_key);
        let filters = self
            .conditions
            .iter()
            .map(Predicate::to_expr)
            .chain(std::iter::once(key.clone().is_not_null()));

        let mut query = Query::new()
            .select(vec![key.alias(MEMBER_KEY)])
            .distinct()
            .from(TableRef::new(&self.target_table).with_alias(MEMBER_TABLE));
        if let Some(filter) = conjunction(filters) {
            query = query.filter(filter);
        }
        query
    }

    /// LEFT JOIN exposing the member key next to the outer row.
    pub fn join(&self) -> Join {
        let alias = self.alias();
        Join {
            join_type: JoinType::Left,
            table: TableRef::derived(self.member_query(), &alias),
            on: Some(table_col(&alias, MEMBER_KEY).eq(self.outer_expr())),
        }
    }

    /// WHERE condition to pair with [`join`](Self::join).
    pub fn condition(&self) -> Expr {
        let key = table_col(&self.alias(), MEMBER_KEY);
        match self.mode {
            MembershipMode::Contains => key.is_not_null(),
            MembershipMode::Excludes => key.is_null(),
        }
    }

    /// Self-contained form for ON clauses. Exclusion keeps rows whose
    /// column is NULL, matching the LEFT JOIN form.
    pub fn subquery_condition(&self) -> Expr {
        let column = self.outer_expr();
        match self.mode {
            MembershipMode::Contains => column.in_subquery(self.member_query()),
            MembershipMode::Excludes => {
                null_inclusive(column.clone(), column.not_in_subquery(self.member_query()))
            }
        }
    }
}
