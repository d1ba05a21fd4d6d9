//! Flow engine.
//!
//! A [`Flow`] renders itself as one SELECT statement and iterates the rows
//! it produces. There are three shapes:
//!
//! - [`TableFlow`] - one physical table
//! - [`CombinedFlow`] - an anchor plus joined children, rendered as one flat
//!   FROM list however deeply the children nest
//! - [`SubqueryFlow`] - any flow wrapped as a derived table
//!
//! Clauses stay on the node they were attached to. At render time a child's
//! plain clauses are pulled up into the statement's WHERE and its join
//! clauses go into the ON clause that attaches it, so removing a clause from
//! a child removes it from the next rendering.
//!
//! # Reading
//!
//! ```ignore
//! flow.set_limit(Some(50))?;
//! flow.add_sort(SortSpec::desc("orders_date"))?;
//! loop {
//!     match flow.retrieve_next_record(&executor) {
//!         Ok(record) => handle(record),
//!         Err(FlowError::EndOfStream) => break,
//!         Err(err) => return Err(err.into()),
//!     }
//! }
//! ```

mod combined;
mod error;
mod join;
mod state;
mod subquery;
mod table;

pub use combined::CombinedFlow;
pub use error::{FlowError, FlowResult};
pub use join::{ColumnRef, JoinDescription, JoinKind, JoinStrategy};
pub use state::{FlowState, SortOrder, SortSpec};
pub use subquery::SubqueryFlow;
pub use table::TableFlow;

use tracing::debug;

use state::Cursor;

use crate::exec::{Executor, Record};
use crate::field::{DataSpecification, FieldSpecification};
use crate::predicate::{PredicateId, WhereClause};
use crate::sql::{col, conjunction, Dialect, Expr, ExprExt, Join, OrderByExpr, Query, TableRef};

const COUNT_ALIAS: &str = "count_query";

/// A composable, executable query node.
#[derive(Debug, Clone)]
pub enum Flow {
    Table(TableFlow),
    Combined(CombinedFlow),
    Subquery(SubqueryFlow),
}

/// A flow flattened into the pieces of one SELECT statement.
#[derive(Debug, Clone)]
pub(crate) struct Composition {
    pub select: Vec<FieldSpecification>,
    pub from: TableRef,
    pub joins: Vec<Join>,
    pub filters: Vec<Expr>,
    /// Join clauses, destined for the ON clause attaching this node. The
    /// root moves them into WHERE.
    pub on_extra: Vec<Expr>,
    pub group_by: Vec<Expr>,
}

impl Composition {
    pub fn new(from: TableRef) -> Self {
        Self {
            select: Vec::new(),
            from,
            joins: Vec::new(),
            filters: Vec::new(),
            on_extra: Vec::new(),
            group_by: Vec::new(),
        }
    }
}

impl Flow {
    pub fn state(&self) -> &FlowState {
        match self {
            Flow::Table(flow) => &flow.state,
            Flow::Combined(flow) => &flow.state,
            Flow::Subquery(flow) => &flow.state,
        }
    }

    fn state_mut(&mut self) -> &mut FlowState {
        match self {
            Flow::Table(flow) => &mut flow.state,
            Flow::Combined(flow) => &mut flow.state,
            Flow::Subquery(flow) => &mut flow.state,
        }
    }

    /// Fields this flow projects, in SELECT order.
    pub fn fields(&self) -> Vec<FieldSpecification> {
        match self {
            Flow::Table(flow) => flow.fields().fields().cloned().collect(),
            Flow::Combined(flow) => flow.fields(),
            Flow::Subquery(flow) => flow.fields(),
        }
    }

    /// Projected fields keyed by alias.
    pub fn data_specification(&self) -> DataSpecification {
        match self {
            Flow::Table(flow) => flow.fields().clone(),
            Flow::Combined(flow) => flow.data_specification(),
            Flow::Subquery(flow) => {
                let mut spec = DataSpecification::new();
                for field in flow.fields() {
                    if spec.push(field).is_err() {
                        tracing::warn!("duplicate alias in derived projection");
                    }
                }
                spec
            }
        }
    }

    pub fn has_field(&self, alias: &str) -> bool {
        self.fields().iter().any(|field| field.alias == alias)
    }

    pub fn as_table(&self) -> Option<&TableFlow> {
        match self {
            Flow::Table(flow) => Some(flow),
            _ => None,
        }
    }

    pub fn as_table_mut(&mut self) -> Option<&mut TableFlow> {
        match self {
            Flow::Table(flow) => Some(flow),
            _ => None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.state().is_initialized()
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    pub fn set_limit(&mut self, limit: Option<u64>) -> FlowResult<()> {
        let state = self.state_mut();
        state.ensure_mutable()?;
        state.limit = limit;
        Ok(())
    }

    pub fn set_offset(&mut self, offset: Option<u64>) -> FlowResult<()> {
        let state = self.state_mut();
        state.ensure_mutable()?;
        state.offset = offset;
        Ok(())
    }

    /// Append an ORDER BY entry. The alias must be projected by this flow.
    pub fn add_sort(&mut self, sort: SortSpec) -> FlowResult<()> {
        self.state().ensure_mutable()?;
        if !self.has_field(&sort.alias) {
            return Err(FlowError::UnknownField(sort.alias));
        }
        self.state_mut().sort.push(sort);
        Ok(())
    }

    pub fn clear_sort(&mut self) -> FlowResult<()> {
        let state = self.state_mut();
        state.ensure_mutable()?;
        state.sort.clear();
        Ok(())
    }

    /// Attach a clause and return its identity.
    pub fn add_clause(&mut self, clause: impl Into<WhereClause>) -> FlowResult<PredicateId> {
        let clause = clause.into();
        let state = self.state_mut();
        state.ensure_mutable()?;
        let id = clause.id();
        state.clauses.push(clause);
        Ok(id)
    }

    /// Detach the clause with identity `id`. Returns whether it was attached.
    pub fn remove_clause(&mut self, id: PredicateId) -> FlowResult<bool> {
        let state = self.state_mut();
        state.ensure_mutable()?;
        Ok(state.remove_clause(id))
    }

    pub fn has_clause(&self, id: PredicateId) -> bool {
        self.state().clauses.iter().any(|clause| clause.id() == id)
    }

    /// Register `alias` as a GROUP BY key. Idempotent.
    pub fn add_aggregate(&mut self, alias: &str) -> FlowResult<()> {
        self.state().ensure_mutable()?;
        if !self.has_field(alias) {
            return Err(FlowError::UnknownField(alias.into()));
        }
        let state = self.state_mut();
        if !state.aggregates.iter().any(|a| a == alias) {
            state.aggregates.push(alias.into());
        }
        Ok(())
    }

    /// Drop `alias` from the GROUP BY keys. Returns whether it was present.
    pub fn remove_aggregate(&mut self, alias: &str) -> FlowResult<bool> {
        let state = self.state_mut();
        state.ensure_mutable()?;
        let before = state.aggregates.len();
        state.aggregates.retain(|a| a != alias);
        Ok(state.aggregates.len() != before)
    }

    pub fn is_aggregate(&self, alias: &str) -> bool {
        self.state().aggregates.iter().any(|a| a == alias)
    }

    /// Return to the uninitialized state so the flow can be changed and
    /// read again.
    pub fn reset(&mut self) {
        self.state_mut().cursor = Cursor::Uninitialized;
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    pub(crate) fn compose(&self) -> FlowResult<Composition> {
        let mut composition = match self {
            Flow::Table(flow) => flow.compose(),
            Flow::Combined(flow) => flow.compose()?,
            Flow::Subquery(flow) => flow.compose()?,
        };

        let state = self.state();
        for clause in &state.clauses {
            if clause.is_join_clause() {
                composition.on_extra.push(clause.join_condition());
            } else {
                composition.joins.extend(clause.joins());
                composition.filters.push(clause.condition());
            }
        }

        for alias in &state.aggregates {
            let field = composition
                .select
                .iter()
                .find(|field| &field.alias == alias)
                .ok_or_else(|| FlowError::UnknownField(alias.clone()))?;
            composition.group_by.push(field.column_expr());
        }

        Ok(composition)
    }

    /// The statement without LIMIT/OFFSET.
    pub fn query(&self) -> FlowResult<Query> {
        let composition = self.compose()?;

        let mut query = if composition.select.is_empty() {
            Query::new().select_star()
        } else {
            Query::new().select(
                composition
                    .select
                    .iter()
                    .map(|field| field.column_expr().alias(&field.alias))
                    .collect(),
            )
        };

        query = query.from(composition.from);
        query.joins = composition.joins;
        query.where_clause = conjunction(composition.filters.into_iter().chain(composition.on_extra));
        query.group_by = composition.group_by;

        let mut order_by = Vec::new();
        for sort in &self.state().sort {
            if !composition.select.iter().any(|f| f.alias == sort.alias) {
                return Err(FlowError::UnknownField(sort.alias.clone()));
            }
            order_by.push(OrderByExpr {
                expr: col(&sort.alias),
                dir: Some(sort.order.into()),
            });
        }
        Ok(query.order_by(order_by))
    }

    /// `SELECT COUNT(*) AS count FROM (<query>) AS count_query`.
    pub fn count_query(&self) -> FlowResult<Query> {
        Ok(self.query()?.count_query(COUNT_ALIAS))
    }

    /// The statement with pagination resolved against `count`.
    pub fn paged_query(&self, count: u64) -> FlowResult<Query> {
        let mut query = self.query()?;
        let (limit, offset) = self.state().pagination(count);
        if let Some(limit) = limit {
            query = query.limit(limit);
        }
        if let Some(offset) = offset {
            query = query.offset(offset);
        }
        Ok(query)
    }

    pub fn to_sql(&self, dialect: Dialect) -> FlowResult<String> {
        Ok(self.query()?.to_sql(dialect))
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Run the count query, then the main query. Idempotent.
    pub fn initialize(&mut self, exec: &dyn Executor) -> FlowResult<()> {
        if self.is_initialized() {
            return Ok(());
        }
        let dialect = exec.dialect();

        let count_sql = self.count_query()?.to_sql(dialect);
        let count = exec
            .count(&count_sql)
            .map_err(|err| FlowError::execution(&count_sql, err))?;

        let sql = self.paged_query(count)?.to_sql(dialect);
        debug!(%sql, count, "initializing flow");
        let rows = exec
            .query(&sql)
            .map_err(|err| FlowError::execution(&sql, err))?;

        self.state_mut().cursor = Cursor::Streaming { sql, count, rows };
        Ok(())
    }

    /// Total rows matching the flow, ignoring pagination.
    pub fn record_count(&mut self, exec: &dyn Executor) -> FlowResult<u64> {
        self.initialize(exec)?;
        self.state()
            .cursor
            .count()
            .ok_or(FlowError::AlreadyInitialized)
    }

    /// Next row, initializing on first use. After the last row every call
    /// returns [`FlowError::EndOfStream`].
    pub fn retrieve_next_record(&mut self, exec: &dyn Executor) -> FlowResult<Record> {
        self.initialize(exec)?;
        let state = self.state_mut();
        let next = match &mut state.cursor {
            Cursor::Streaming { sql, rows, .. } => rows
                .next_row()
                .map_err(|err| FlowError::execution(sql.as_str(), err))?,
            Cursor::Exhausted { .. } | Cursor::Uninitialized => return Err(FlowError::EndOfStream),
        };

        match next {
            Some(record) => Ok(record),
            None => {
                let count = state.cursor.count().unwrap_or_default();
                state.cursor = Cursor::Exhausted { count };
                Err(FlowError::EndOfStream)
            }
        }
    }
}

impl From<TableFlow> for Flow {
    fn from(flow: TableFlow) -> Self {
        Flow::Table(flow)
    }
}

impl From<CombinedFlow> for Flow {
    fn from(flow: CombinedFlow) -> Self {
        Flow::Combined(flow)
    }
}

impl From<SubqueryFlow> for Flow {
    fn from(flow: SubqueryFlow) -> Self {
        Flow::Subquery(flow)
    }
}

/// `1 = 1`, for joins with nothing to compare.
pub(crate) fn always_true() -> Expr {
    crate::sql::lit_int(1).eq(crate::sql::lit_int(1))
}
