//! Filter conditions.
//!
//! A [`Predicate`] is a single `column <op> value(s)` condition on one table
//! alias. A [`MembershipPredicate`] tests whether a correlated set of rows in
//! another table contains (or excludes) the row's key. Both are wrapped in
//! [`WhereClause`], which is what flows store. Every clause carries a
//! [`PredicateId`] assigned at construction; flows remove clauses by id.
//!
//! # Null-inclusive negation
//!
//! Negative operators (`!=`, `NOT IN`, `NOT LIKE`) also match rows where the
//! column is NULL: `status != 'closed'` keeps rows without a status. Plain SQL
//! would drop them. Reports built on this engine rely on that behavior, so
//! it is applied on every negative comparison (see [`null_inclusive`]).

mod membership;

pub use membership::{MembershipMode, MembershipPredicate};

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::field::{FieldSpecification, FieldType, SqlWrapper};
use crate::sql::{
    lit_bool, lit_float, lit_int, lit_str, table_col, Expr, ExprExt, Join,
};
use crate::value::Value;

/// Errors raised while building a predicate.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PredicateError {
    #[error("unknown operator: {0}")]
    UnknownOperator(String),

    #[error("operator {operator} requires {expected}")]
    InvalidArity {
        operator: Operator,
        expected: &'static str,
    },

    #[error("value {value:?} is not a valid {field_type:?}")]
    InvalidValue { value: String, field_type: FieldType },

    #[error("operator {0} needs a value")]
    MissingValue(Operator),
}

pub type PredicateResult<T> = Result<T, PredicateError>;

/// Stable identity of a clause. Clones keep the identity of the original.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PredicateId(u64);

impl PredicateId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        PredicateId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for PredicateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Comparison operators accepted by filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    NotIn,
    Like,
    NotLike,
    IsNull,
    IsNotNull,
    Between,
    Contains,
    StartsWith,
    EndsWith,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
            Operator::Between => "BETWEEN",
            Operator::Contains => "contains",
            Operator::StartsWith => "starts with",
            Operator::EndsWith => "ends with",
        }
    }

    /// Operators subject to null-inclusive negation.
    pub fn is_negative(&self) -> bool {
        matches!(self, Operator::Ne | Operator::NotIn | Operator::NotLike)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = PredicateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s
            .trim()
            .to_ascii_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        Ok(match normalized.as_str() {
            "=" | "==" | "eq" => Operator::Eq,
            "!=" | "<>" | "ne" => Operator::Ne,
            "<" | "lt" => Operator::Lt,
            "<=" | "lte" => Operator::Lte,
            ">" | "gt" => Operator::Gt,
            ">=" | "gte" => Operator::Gte,
            "in" => Operator::In,
            "not in" => Operator::NotIn,
            "like" => Operator::Like,
            "not like" => Operator::NotLike,
            "is null" | "null" => Operator::IsNull,
            "is not null" | "not null" => Operator::IsNotNull,
            "between" | "bw" => Operator::Between,
            "contains" | "has" => Operator::Contains,
            "starts with" | "sw" => Operator::StartsWith,
            "ends with" | "ew" => Operator::EndsWith,
            _ => return Err(PredicateError::UnknownOperator(s.to_string())),
        })
    }
}

impl TryFrom<String> for Operator {
    type Error = PredicateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Operator> for String {
    fn from(op: Operator) -> Self {
        op.as_str().to_string()
    }
}

/// Scalar or list operand, as carried by the filter wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredicateValue {
    List(Vec<Value>),
    Single(Value),
}

impl Default for PredicateValue {
    fn default() -> Self {
        PredicateValue::Single(Value::Null)
    }
}

impl From<Value> for PredicateValue {
    fn from(value: Value) -> Self {
        PredicateValue::Single(value)
    }
}

impl From<Vec<Value>> for PredicateValue {
    fn from(values: Vec<Value>) -> Self {
        PredicateValue::List(values)
    }
}

/// A single `column <op> value(s)` condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    id: PredicateId,
    table: Option<String>,
    column: String,
    operator: Operator,
    operands: Vec<Expr>,
    field_type: FieldType,
    join_clause: bool,
    wrapper: Option<SqlWrapper>,
}

impl Predicate {
    /// Build a predicate on `table.column`.
    ///
    /// Array input promotes `=` to `IN` and `!=` to `NOT IN`; scalars given
    /// to `IN`/`NOT IN` become one-element lists. Values are checked against
    /// `field_type` here, so rendering never fails.
    pub fn new(
        table: Option<&str>,
        column: &str,
        operator: Operator,
        value: impl Into<PredicateValue>,
        field_type: FieldType,
    ) -> PredicateResult<Self> {
        let value = value.into();
        let (operator, values) = normalize(operator, value)?;
        let operands = match operator {
            Operator::IsNull | Operator::IsNotNull => Vec::new(),
            Operator::Contains | Operator::StartsWith | Operator::EndsWith => {
                vec![lit_str(&like_pattern(operator, &values[0]))]
            }
            _ => values
                .iter()
                .map(|v| literal(v, field_type))
                .collect::<PredicateResult<Vec<_>>>()?,
        };

        Ok(Self {
            id: PredicateId::next(),
            table: table.map(String::from),
            column: column.into(),
            operator,
            operands,
            field_type,
            join_clause: false,
            wrapper: None,
        })
    }

    /// Build a predicate on a field, inheriting its table, type and wrapper.
    pub fn for_field(
        field: &FieldSpecification,
        operator: Operator,
        value: impl Into<PredicateValue>,
    ) -> PredicateResult<Self> {
        let mut predicate = Self::new(
            field.table.as_deref(),
            &field.name,
            operator,
            value,
            field.field_type,
        )?;
        predicate.wrapper = field.wrapper.clone();
        Ok(predicate)
    }

    /// Mark this predicate as eligible for a JOIN's ON clause.
    pub fn as_join_clause(mut self) -> Self {
        self.join_clause = true;
        self
    }

    pub fn with_wrapper(mut self, wrapper: SqlWrapper) -> Self {
        self.wrapper = Some(wrapper);
        self
    }

    pub fn id(&self) -> PredicateId {
        self.id
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn is_join_clause(&self) -> bool {
        self.join_clause
    }

    fn column_expr(&self) -> Expr {
        let column = match &self.table {
            Some(table) => table_col(table, &self.column),
            None => crate::sql::col(&self.column),
        };
        match &self.wrapper {
            Some(wrapper) => wrapper.apply(column),
            None => column,
        }
    }

    /// Render the condition.
    pub fn to_expr(&self) -> Expr {
        let column = self.column_expr();
        let first = || self.operands[0].clone();
        match self.operator {
            Operator::Eq => column.eq(first()),
            Operator::Lt => column.lt(first()),
            Operator::Lte => column.lte(first()),
            Operator::Gt => column.gt(first()),
            Operator::Gte => column.gte(first()),
            Operator::Like => column.like(first()),
            Operator::In => column.in_list(self.operands.clone()),
            Operator::Between => column.between(first(), self.operands[1].clone()),
            Operator::IsNull => column.is_null(),
            Operator::IsNotNull => column.is_not_null(),
            Operator::Contains | Operator::StartsWith | Operator::EndsWith => {
                column.like_escape(first(), LIKE_ESCAPE)
            }
            Operator::Ne => null_inclusive(column.clone(), column.ne(first())),
            Operator::NotIn => null_inclusive(column.clone(), column.not_in_list(self.operands.clone())),
            Operator::NotLike => null_inclusive(column.clone(), column.not_like(first())),
        }
    }
}

/// Null-inclusive negation: `(condition OR column IS NULL)`.
pub fn null_inclusive(column: Expr, condition: Expr) -> Expr {
    condition.or(column.is_null()).paren()
}

const LIKE_ESCAPE: char = '\\';

fn like_pattern(operator: Operator, value: &Value) -> String {
    let escaped = value
        .as_text()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    match operator {
        Operator::StartsWith => format!("{}%", escaped),
        Operator::EndsWith => format!("%{}", escaped),
        _ => format!("%{}%", escaped),
    }
}

fn normalize(operator: Operator, value: PredicateValue) -> PredicateResult<(Operator, Vec<Value>)> {
    match (operator, value) {
        (Operator::IsNull | Operator::IsNotNull, _) => Ok((operator, Vec::new())),

        (Operator::Eq, PredicateValue::List(values)) => Ok((Operator::In, values)),
        (Operator::Ne, PredicateValue::List(values)) => Ok((Operator::NotIn, values)),
        (Operator::In | Operator::NotIn, PredicateValue::List(values)) => Ok((operator, values)),
        (Operator::In | Operator::NotIn, PredicateValue::Single(Value::Null)) => {
            Err(PredicateError::MissingValue(operator))
        }
        (Operator::In | Operator::NotIn, PredicateValue::Single(value)) => {
            Ok((operator, vec![value]))
        }

        (Operator::Between, PredicateValue::List(values)) if values.len() == 2 => {
            Ok((operator, values))
        }
        (Operator::Between, _) => Err(PredicateError::InvalidArity {
            operator,
            expected: "exactly two values",
        }),

        (_, PredicateValue::List(_)) => Err(PredicateError::InvalidArity {
            operator,
            expected: "a single value",
        }),
        (_, PredicateValue::Single(Value::Null)) => Err(PredicateError::MissingValue(operator)),
        (_, PredicateValue::Single(value)) => Ok((operator, vec![value])),
    }
}

/// Escape a value as a typed literal.
fn literal(value: &Value, field_type: FieldType) -> PredicateResult<Expr> {
    let invalid = || PredicateError::InvalidValue {
        value: value.as_text(),
        field_type,
    };

    if field_type.is_string_like() {
        return match value {
            Value::Null => Err(invalid()),
            other => Ok(lit_str(&other.as_text())),
        };
    }

    match field_type {
        FieldType::Boolean => match value {
            Value::Bool(b) => Ok(lit_bool(*b)),
            Value::Int(n @ (0 | 1)) => Ok(lit_bool(*n == 1)),
            Value::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => Ok(lit_bool(true)),
                "0" | "false" | "no" => Ok(lit_bool(false)),
                _ => Err(invalid()),
            },
            _ => Err(invalid()),
        },
        FieldType::Integer | FieldType::File => value.as_i64().map(lit_int).ok_or_else(invalid),
        _ => match value {
            Value::Int(n) => Ok(lit_int(*n)),
            other => other
                .as_f64()
                .filter(|f| f.is_finite())
                .map(lit_float)
                .ok_or_else(invalid),
        },
    }
}

/// A clause stored on a flow.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereClause {
    Predicate(Predicate),
    Membership(MembershipPredicate),
}

impl WhereClause {
    pub fn id(&self) -> PredicateId {
        match self {
            WhereClause::Predicate(p) => p.id(),
            WhereClause::Membership(m) => m.id(),
        }
    }

    pub fn is_join_clause(&self) -> bool {
        match self {
            WhereClause::Predicate(p) => p.is_join_clause(),
            WhereClause::Membership(m) => m.is_join_clause(),
        }
    }

    /// Condition for the WHERE clause.
    pub fn condition(&self) -> Expr {
        match self {
            WhereClause::Predicate(p) => p.to_expr(),
            WhereClause::Membership(m) => m.condition(),
        }
    }

    /// Condition for a JOIN's ON clause. A membership test cannot reference
    /// a table joined after the ON it sits in, so it folds in as a
    /// subquery test instead of a join.
    pub fn join_condition(&self) -> Expr {
        match self {
            WhereClause::Predicate(p) => p.to_expr(),
            WhereClause::Membership(m) => m.subquery_condition(),
        }
    }

    /// Extra joins the WHERE form of this clause needs in the FROM list.
    pub fn joins(&self) -> Vec<Join> {
        match self {
            WhereClause::Predicate(_) => Vec::new(),
            WhereClause::Membership(m) => vec![m.join()],
        }
    }
}

impl From<Predicate> for WhereClause {
    fn from(predicate: Predicate) -> Self {
        WhereClause::Predicate(predicate)
    }
}

impl From<MembershipPredicate> for WhereClause {
    fn from(membership: MembershipPredicate) -> Self {
        WhereClause::Membership(membership)
    }
}
