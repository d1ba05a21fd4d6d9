//! # reportflow
//!
//! Composes report reads out of declarative sources, joins, filters and
//! output handlers, and compiles them into one paginated SQL statement.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │           ReportConfig (TOML / JSON definition)          │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [report]
//! ┌─────────────────────────────────────────────────────────┐
//! │  Sources (entity + lazy satellites)   Filter binders     │
//! │  Join plan (BFS from the anchor)      Output handlers    │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [flow]
//! ┌─────────────────────────────────────────────────────────┐
//! │     Flow tree: Table / Combined / Subquery + clauses     │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [sql]
//! ┌─────────────────────────────────────────────────────────┐
//! │          SELECT statement for the target dialect         │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [exec]
//! ┌─────────────────────────────────────────────────────────┐
//! │          Records → formatted output rows                 │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod exec;
pub mod field;
pub mod filter;
pub mod flow;
pub mod output;
pub mod predicate;
pub mod report;
pub mod schema;
pub mod source;
pub mod sql;
pub mod value;

pub use error::{ConfigResult, ConfigurationError, ReportError, ReportResult};
pub use report::Report;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::config::{FilterConfig, JoinConfig, OutputConfig, ReportConfig, SourceConfig};
    pub use crate::error::{ConfigResult, ConfigurationError, ReportError, ReportResult};
    pub use crate::exec::{Executor, Record, SqliteExecutor};
    pub use crate::field::{FieldSpecification, FieldType};
    pub use crate::filter::{FilterBinder, FilterInput, FilterParams};
    pub use crate::flow::{
        CombinedFlow, Flow, FlowError, JoinKind, JoinStrategy, SortOrder, SortSpec, SubqueryFlow,
        TableFlow,
    };
    pub use crate::output::{OutputHandler, OutputRow, OutputValue};
    pub use crate::predicate::{MembershipMode, MembershipPredicate, Operator, Predicate};
    pub use crate::report::Report;
    pub use crate::schema::{
        ColumnSpec, EntityCatalog, SchemaProvider, SqliteSchemaProvider, StaticSchemaProvider,
    };
    pub use crate::source::{Aggregation, Source, Sources};
    pub use crate::sql::Dialect;
    pub use crate::value::Value;
}
