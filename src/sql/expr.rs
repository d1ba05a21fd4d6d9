//! Expression AST for report queries.
//!
//! Only the shapes a composed report read needs: column references,
//! literals, comparisons, `IN`/`BETWEEN`/`LIKE`/`IS NULL` tests, aggregate
//! calls and configured `%s` templates.

use super::dialect::Dialect;
use super::query::{Query, SelectExpr};
use super::token::{Token, TokenStream};

/// A SQL expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `table.column` or bare `column`.
    Column {
        table: Option<String>,
        column: String,
    },

    Literal(Literal),

    /// `left op right`.
    Compare {
        left: Box<Expr>,
        op: CompareOp,
        right: Box<Expr>,
    },

    /// `left AND right` / `left OR right`.
    Logical {
        left: Box<Expr>,
        op: LogicalOp,
        right: Box<Expr>,
    },

    /// `name(args...)`, name upper-cased on output.
    Function { name: String, args: Vec<Expr> },

    /// `expr [NOT] IN (values...)`.
    In {
        expr: Box<Expr>,
        values: Vec<Expr>,
        negated: bool,
    },

    /// `expr [NOT] IN (SELECT ...)`.
    InSubquery {
        expr: Box<Expr>,
        subquery: Box<Query>,
        negated: bool,
    },

    /// `expr BETWEEN low AND high`, bounds inclusive.
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
    },

    /// `expr IS [NOT] NULL`.
    IsNull { expr: Box<Expr>, negated: bool },

    /// `expr [NOT] LIKE pattern [ESCAPE 'c']`.
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
        escape: Option<char>,
    },

    /// `*` or `table.*`.
    Star { table: Option<String> },

    Paren(Box<Expr>),

    /// Expression embedded in a `%s` template, e.g. `MONTH(%s)`.
    ///
    /// Every `%s` is replaced by the rendered inner expression and the rest
    /// of the template is emitted verbatim. Templates come from field
    /// configuration, never from filter input.
    Wrapped { template: String, inner: Box<Expr> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,
}

impl CompareOp {
    fn token(self) -> Token {
        match self {
            CompareOp::Eq => Token::Eq,
            CompareOp::Ne => Token::Ne,
            CompareOp::Lt => Token::Lt,
            CompareOp::Gt => Token::Gt,
            CompareOp::Lte => Token::Lte,
            CompareOp::Gte => Token::Gte,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

impl Expr {
    /// Token stream for the default dialect.
    pub fn to_tokens(&self) -> TokenStream {
        self.to_tokens_for_dialect(Dialect::default())
    }

    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        match self {
            Expr::Column { table, column } => {
                if let Some(t) = table {
                    ts.push(Token::Ident(t.clone())).push(Token::Dot);
                }
                ts.push(Token::Ident(column.clone()));
            }

            Expr::Literal(lit) => {
                ts.push(match lit {
                    Literal::Int(n) => Token::LitInt(*n),
                    Literal::Float(f) => Token::LitFloat(*f),
                    Literal::String(s) => Token::LitString(s.clone()),
                    Literal::Bool(b) => Token::LitBool(*b),
                    Literal::Null => Token::LitNull,
                });
            }

            Expr::Compare { left, op, right } => {
                ts.append(&left.to_tokens_for_dialect(dialect))
                    .space()
                    .push(op.token())
                    .space()
                    .append(&right.to_tokens_for_dialect(dialect));
            }

            Expr::Logical { left, op, right } => {
                let keyword = match op {
                    LogicalOp::And => Token::And,
                    LogicalOp::Or => Token::Or,
                };
                ts.append(&left.to_tokens_for_dialect(dialect))
                    .space()
                    .push(keyword)
                    .space()
                    .append(&right.to_tokens_for_dialect(dialect));
            }

            Expr::Function { name, args } => {
                ts.push(Token::FunctionName(name.clone())).lparen();
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        ts.comma().space();
                    }
                    ts.append(&arg.to_tokens_for_dialect(dialect));
                }
                ts.rparen();
            }

            Expr::In {
                expr,
                values,
                negated,
            } => {
                // `x IN ()` is not valid SQL: an empty set matches nothing,
                // its negation everything.
                if values.is_empty() {
                    ts.push(Token::LitBool(*negated));
                } else {
                    ts.append(&expr.to_tokens_for_dialect(dialect));
                    if *negated {
                        ts.space().push(Token::Not);
                    }
                    ts.space().push(Token::In).space().lparen();
                    for (i, value) in values.iter().enumerate() {
                        if i > 0 {
                            ts.comma().space();
                        }
                        ts.append(&value.to_tokens_for_dialect(dialect));
                    }
                    ts.rparen();
                }
            }

            Expr::InSubquery {
                expr,
                subquery,
                negated,
            } => {
                ts.append(&expr.to_tokens_for_dialect(dialect));
                if *negated {
                    ts.space().push(Token::Not);
                }
                ts.space()
                    .push(Token::In)
                    .space()
                    .lparen()
                    .append(&subquery.to_tokens_for_dialect(dialect))
                    .rparen();
            }

            Expr::Between { expr, low, high } => {
                ts.append(&expr.to_tokens_for_dialect(dialect))
                    .space()
                    .push(Token::Between)
                    .space()
                    .append(&low.to_tokens_for_dialect(dialect))
                    .space()
                    .push(Token::And)
                    .space()
                    .append(&high.to_tokens_for_dialect(dialect));
            }

            Expr::IsNull { expr, negated } => {
                ts.append(&expr.to_tokens_for_dialect(dialect))
                    .space()
                    .push(if *negated {
                        Token::IsNotNull
                    } else {
                        Token::IsNull
                    });
            }

            Expr::Like {
                expr,
                pattern,
                negated,
                escape,
            } => {
                ts.append(&expr.to_tokens_for_dialect(dialect))
                    .space()
                    .push(if *negated { Token::NotLike } else { Token::Like })
                    .space()
                    .append(&pattern.to_tokens_for_dialect(dialect));
                if let Some(c) = escape {
                    ts.space()
                        .push(Token::Escape)
                        .space()
                        .push(Token::LitString(c.to_string()));
                }
            }

            Expr::Star { table } => {
                if let Some(t) = table {
                    ts.push(Token::Ident(t.clone())).push(Token::Dot);
                }
                ts.push(Token::Star);
            }

            Expr::Paren(inner) => {
                ts.lparen()
                    .append(&inner.to_tokens_for_dialect(dialect))
                    .rparen();
            }

            Expr::Wrapped { template, inner } => {
                let rendered = inner.to_tokens_for_dialect(dialect);
                let mut parts = template.split("%s").peekable();
                while let Some(part) = parts.next() {
                    if !part.is_empty() {
                        ts.push(Token::Raw(part.to_string()));
                    }
                    if parts.peek().is_some() {
                        ts.append(&rendered);
                    }
                }
            }
        }

        ts
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens_for_dialect(dialect).serialize(dialect)
    }
}

// =============================================================================
// Constructors
// =============================================================================

pub fn col(name: &str) -> Expr {
    Expr::Column {
        table: None,
        column: name.into(),
    }
}

/// `table.column`.
pub fn table_col(table: &str, column: &str) -> Expr {
    Expr::Column {
        table: Some(table.into()),
        column: column.into(),
    }
}

pub fn lit_int(n: i64) -> Expr {
    Expr::Literal(Literal::Int(n))
}

pub fn lit_float(f: f64) -> Expr {
    Expr::Literal(Literal::Float(f))
}

pub fn lit_str(s: &str) -> Expr {
    Expr::Literal(Literal::String(s.into()))
}

pub fn lit_bool(b: bool) -> Expr {
    Expr::Literal(Literal::Bool(b))
}

pub fn star() -> Expr {
    Expr::Star { table: None }
}

fn call(name: &str, args: Vec<Expr>) -> Expr {
    Expr::Function {
        name: name.into(),
        args,
    }
}

pub fn count_star() -> Expr {
    call("COUNT", vec![star()])
}

pub fn min(expr: Expr) -> Expr {
    call("MIN", vec![expr])
}

pub fn max(expr: Expr) -> Expr {
    call("MAX", vec![expr])
}

/// Embed an expression in a `%s` template.
pub fn wrapped(template: &str, inner: Expr) -> Expr {
    Expr::Wrapped {
        template: template.into(),
        inner: Box::new(inner),
    }
}

/// AND together a list of conditions; `None` when the list is empty.
pub fn conjunction(conditions: impl IntoIterator<Item = Expr>) -> Option<Expr> {
    conditions
        .into_iter()
        .reduce(|acc, condition| acc.and(condition))
}

// =============================================================================
// Builder trait
// =============================================================================

/// Fluent construction: `table_col("o", "amount").gt(100)`.
pub trait ExprExt: Sized {
    fn into_expr(self) -> Expr;

    fn eq(self, other: impl Into<Expr>) -> Expr {
        compare(self.into_expr(), CompareOp::Eq, other.into())
    }

    fn ne(self, other: impl Into<Expr>) -> Expr {
        compare(self.into_expr(), CompareOp::Ne, other.into())
    }

    fn gt(self, other: impl Into<Expr>) -> Expr {
        compare(self.into_expr(), CompareOp::Gt, other.into())
    }

    fn gte(self, other: impl Into<Expr>) -> Expr {
        compare(self.into_expr(), CompareOp::Gte, other.into())
    }

    fn lt(self, other: impl Into<Expr>) -> Expr {
        compare(self.into_expr(), CompareOp::Lt, other.into())
    }

    fn lte(self, other: impl Into<Expr>) -> Expr {
        compare(self.into_expr(), CompareOp::Lte, other.into())
    }

    fn and(self, other: impl Into<Expr>) -> Expr {
        logical(self.into_expr(), LogicalOp::And, other.into())
    }

    fn or(self, other: impl Into<Expr>) -> Expr {
        logical(self.into_expr(), LogicalOp::Or, other.into())
    }

    fn like(self, pattern: impl Into<Expr>) -> Expr {
        like(self.into_expr(), pattern.into(), false, None)
    }

    fn not_like(self, pattern: impl Into<Expr>) -> Expr {
        like(self.into_expr(), pattern.into(), true, None)
    }

    /// LIKE matching `%` and `_` literally when preceded by `escape`.
    fn like_escape(self, pattern: impl Into<Expr>, escape: char) -> Expr {
        like(self.into_expr(), pattern.into(), false, Some(escape))
    }

    #[allow(clippy::wrong_self_convention)]
    fn is_null(self) -> Expr {
        Expr::IsNull {
            expr: Box::new(self.into_expr()),
            negated: false,
        }
    }

    #[allow(clippy::wrong_self_convention)]
    fn is_not_null(self) -> Expr {
        Expr::IsNull {
            expr: Box::new(self.into_expr()),
            negated: true,
        }
    }

    fn in_list(self, values: Vec<Expr>) -> Expr {
        Expr::In {
            expr: Box::new(self.into_expr()),
            values,
            negated: false,
        }
    }

    fn not_in_list(self, values: Vec<Expr>) -> Expr {
        Expr::In {
            expr: Box::new(self.into_expr()),
            values,
            negated: true,
        }
    }

    fn in_subquery(self, subquery: Query) -> Expr {
        Expr::InSubquery {
            expr: Box::new(self.into_expr()),
            subquery: Box::new(subquery),
            negated: false,
        }
    }

    fn not_in_subquery(self, subquery: Query) -> Expr {
        Expr::InSubquery {
            expr: Box::new(self.into_expr()),
            subquery: Box::new(subquery),
            negated: true,
        }
    }

    fn between(self, low: impl Into<Expr>, high: impl Into<Expr>) -> Expr {
        Expr::Between {
            expr: Box::new(self.into_expr()),
            low: Box::new(low.into()),
            high: Box::new(high.into()),
        }
    }

    fn paren(self) -> Expr {
        Expr::Paren(Box::new(self.into_expr()))
    }

    /// Projection of this expression under `name`.
    fn alias(self, name: &str) -> SelectExpr {
        SelectExpr {
            expr: self.into_expr(),
            alias: Some(name.into()),
        }
    }
}

impl ExprExt for Expr {
    fn into_expr(self) -> Expr {
        self
    }
}

fn compare(left: Expr, op: CompareOp, right: Expr) -> Expr {
    Expr::Compare {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}

fn logical(left: Expr, op: LogicalOp, right: Expr) -> Expr {
    Expr::Logical {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}

fn like(expr: Expr, pattern: Expr, negated: bool, escape: Option<char>) -> Expr {
    Expr::Like {
        expr: Box::new(expr),
        pattern: Box::new(pattern),
        negated,
        escape,
    }
}

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        lit_int(n)
    }
}

impl From<i32> for Expr {
    fn from(n: i32) -> Self {
        lit_int(i64::from(n))
    }
}

impl From<f64> for Expr {
    fn from(f: f64) -> Self {
        lit_float(f)
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        lit_str(s)
    }
}

impl From<String> for Expr {
    fn from(s: String) -> Self {
        Expr::Literal(Literal::String(s))
    }
}

impl From<bool> for Expr {
    fn from(b: bool) -> Self {
        lit_bool(b)
    }
}
