//! SQL generation module.
//!
//! A type-safe SQL builder that renders SELECT statements for several
//! dialects. Flows compose [`query::Query`] values; nothing else in the
//! crate concatenates SQL text by hand.
//!
//! - [`query`] - SELECT query builder (including derived tables)
//! - [`expr`] - Expression AST and builder DSL
//! - [`token`] - Token types for SQL generation
//! - [`dialect`] - SQL dialect implementations

pub mod dialect;
pub mod expr;
pub mod query;
pub mod token;

pub mod test_utils;

// Re-export commonly used types at the sql module level
pub use dialect::{Dialect, SqlDialect};
pub use expr::{
    col, conjunction, count_star, lit_bool, lit_float, lit_int, lit_str, max, min, star,
    table_col, wrapped, CompareOp, Expr, ExprExt, Literal, LogicalOp,
};
pub use query::{Join, JoinType, LimitOffset, OrderByExpr, Query, SelectExpr, SortDir, TableFactor, TableRef};
pub use token::{Token, TokenStream};
