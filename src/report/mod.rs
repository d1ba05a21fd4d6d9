//! Report orchestration.
//!
//! A [`Report`] owns the sources of one definition, the filter binders and
//! the output handlers. Each read compiles the sources into one root flow
//! (the bare source flow when there is only one), runs it and formats every
//! record through the handlers in declaration order.
//!
//! Request state (filter values, pagination, sort, aggregation toggles)
//! can change between reads. Once a read has started, changes are rejected
//! until [`Report::reset`].

mod plan;

pub use plan::{plan_joins, PlannedJoin};

use serde::Serialize;
use tracing::{debug, info};

use crate::config::ReportConfig;
use crate::error::{ConfigResult, ConfigurationError, ReportResult};
use crate::exec::Executor;
use crate::filter::{validate_required, FilterBinder, FilterParams};
use crate::flow::{CombinedFlow, Flow, FlowError, JoinStrategy, SortSpec};
use crate::output::{OutputHandler, OutputRow};
use crate::schema::SchemaProvider;
use crate::source::{Source, Sources};
use crate::sql::Dialect;

/// SQL a report would run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Explain {
    pub sql: String,
    pub count_sql: String,
}

/// Output column header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub alias: String,
    pub title: String,
}

pub struct Report {
    id: String,
    dialect: Dialect,
    anchor: String,
    sources: Sources,
    joins: Vec<PlannedJoin>,
    filters: Vec<Box<dyn FilterBinder>>,
    outputs: Vec<Box<dyn OutputHandler>>,
    params: FilterParams,
    limit: Option<u64>,
    offset: Option<u64>,
    sort: Vec<SortSpec>,
    root: Option<Flow>,
}

impl std::fmt::Debug for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Report")
            .field("id", &self.id)
            .field("anchor", &self.anchor)
            .field("sources", &self.sources.names().collect::<Vec<_>>())
            .field("joins", &self.joins)
            .finish_non_exhaustive()
    }
}

impl Report {
    /// Build a report, resolving every entity through `provider`.
    pub fn from_config(config: &ReportConfig, provider: &dyn SchemaProvider) -> ConfigResult<Self> {
        config.validate()?;
        let id = config.key()?;
        let anchor = config.anchor()?.name.clone();

        let mut sources = Sources::new();
        for declared in &config.sources {
            let mut source = Source::from_provider(&declared.name, declared.entity(), provider)?;
            if let Some(aggregation) = &declared.aggregation {
                source.set_aggregation(aggregation.clone())?;
            }
            sources.insert(source);
        }

        let joins = plan_joins(&config.sources, &config.joins)?;
        check_join_columns(&sources, &joins)?;

        let mut filters = config.build_filters();
        for filter in &mut filters {
            filter.initialize(&mut sources)?;
        }
        let mut outputs = config.build_outputs();
        for output in &mut outputs {
            output.initialize(&mut sources).map_err(|err| match err {
                ConfigurationError::Resolution(cause) => ConfigurationError::InvalidOutput {
                    alias: output.alias().to_string(),
                    reason: cause.to_string(),
                },
                other => other,
            })?;
        }

        info!(
            report = %id,
            sources = sources.len(),
            joins = joins.len(),
            filters = filters.len(),
            outputs = outputs.len(),
            "compiled report"
        );

        let mut report = Self {
            id,
            dialect: config.dialect,
            anchor,
            sources,
            joins,
            filters,
            outputs,
            params: FilterParams::new(),
            limit: None,
            offset: None,
            sort: Vec::new(),
            root: None,
        };
        report.limit = config.limit;
        for sort in &config.sort {
            report.check_sort(sort)?;
        }
        report.sort = config.sort.clone();
        Ok(report)
    }

    /// Build a report whose entities are declared inline.
    pub fn from_inline_config(config: &ReportConfig) -> ConfigResult<Self> {
        Self::from_config(config, &config.schema_provider())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn sources(&self) -> &Sources {
        &self.sources
    }

    pub fn joins(&self) -> &[PlannedJoin] {
        &self.joins
    }

    pub fn columns(&self) -> Vec<Column> {
        self.outputs
            .iter()
            .map(|output| Column {
                alias: output.alias().to_string(),
                title: output.title().to_string(),
            })
            .collect()
    }

    // =========================================================================
    // Request state
    // =========================================================================

    fn ensure_mutable(&mut self) -> ReportResult<()> {
        match &self.root {
            Some(root) if root.is_initialized() => Err(FlowError::AlreadyInitialized.into()),
            _ => {
                self.root = None;
                Ok(())
            }
        }
    }

    /// Replace the request's filter values. Filters absent from `params`
    /// are cleared.
    pub fn set_filters(&mut self, params: FilterParams) -> ReportResult<()> {
        self.ensure_mutable()?;
        self.params = params;
        Ok(())
    }

    pub fn set_limit(&mut self, limit: Option<u64>) -> ReportResult<()> {
        self.ensure_mutable()?;
        self.limit = limit;
        Ok(())
    }

    pub fn set_offset(&mut self, offset: Option<u64>) -> ReportResult<()> {
        self.ensure_mutable()?;
        self.offset = offset;
        Ok(())
    }

    fn check_sort(&self, sort: &SortSpec) -> ConfigResult<()> {
        let known = self
            .sources
            .iter()
            .any(|source| source.aliases().iter().any(|alias| alias == &sort.alias));
        if known {
            Ok(())
        } else {
            Err(ConfigurationError::InvalidOutput {
                alias: sort.alias.clone(),
                reason: "sort key is not a projected column".into(),
            })
        }
    }

    pub fn add_sort(&mut self, sort: SortSpec) -> ReportResult<()> {
        self.ensure_mutable()?;
        self.check_sort(&sort)?;
        self.sort.push(sort);
        Ok(())
    }

    pub fn clear_sort(&mut self) -> ReportResult<()> {
        self.ensure_mutable()?;
        self.sort.clear();
        Ok(())
    }

    /// Group rows by the column of output `alias`.
    pub fn enable_aggregation(&mut self, alias: &str) -> ReportResult<()> {
        self.ensure_mutable()?;
        let aggregatable = find_output(&mut self.outputs, alias)?
            .as_aggregatable()
            .ok_or_else(|| ConfigurationError::InvalidOutput {
                alias: alias.to_string(),
                reason: "output cannot be aggregated".into(),
            })?;
        aggregatable.enable_aggregation(&mut self.sources)
    }

    pub fn disable_aggregation(&mut self, alias: &str) -> ReportResult<()> {
        self.ensure_mutable()?;
        match find_output(&mut self.outputs, alias)?.as_aggregatable() {
            Some(aggregatable) => aggregatable.disable_aggregation(&mut self.sources),
            None => Ok(()),
        }
    }

    /// Whether output `alias` is currently a GROUP BY key.
    pub fn is_aggregated(&mut self, alias: &str) -> bool {
        find_output(&mut self.outputs, alias)
            .ok()
            .and_then(|output| output.as_aggregatable())
            .is_some_and(|aggregatable| aggregatable.is_aggregated())
    }

    /// Drop the compiled flow and any open cursor. Request state is kept.
    pub fn reset(&mut self) {
        self.root = None;
    }

    // =========================================================================
    // Compilation
    // =========================================================================

    fn apply_filters(&mut self) -> ReportResult<()> {
        for filter in &mut self.filters {
            filter.set_filter(&mut self.sources, &self.params)?;
        }
        validate_required(&self.filters)?;
        Ok(())
    }

    /// One flow for the whole report.
    fn compose(&mut self) -> ReportResult<Flow> {
        let anchor = self.sources.require_mut(&self.anchor)?.flow()?.clone();
        if self.joins.is_empty() {
            return Ok(anchor);
        }

        let mut combined = CombinedFlow::new(anchor);
        for join in &self.joins {
            let parent = self.sources.require(&join.parent)?;
            let child = self.sources.require(&join.child)?;
            let mut strategy = JoinStrategy::new(join.kind);
            for (parent_column, child_column) in &join.columns {
                strategy = strategy.on(
                    parent.join_reference(parent_column),
                    child.join_reference(child_column),
                );
            }
            let flow = self.sources.require_mut(&join.child)?.flow()?.clone();
            debug!(parent = %join.parent, child = %join.child, "joining source");
            combined.join(flow, strategy);
        }
        Ok(combined.into())
    }

    /// The root flow with filters and request state applied.
    fn prepare(&mut self) -> ReportResult<&mut Flow> {
        if self.root.is_none() {
            self.apply_filters()?;
            let mut root = self.compose()?;
            root.set_limit(self.limit)?;
            root.set_offset(self.offset)?;
            for sort in &self.sort {
                root.add_sort(sort.clone())?;
            }
            self.root = Some(root);
        }
        self.root
            .as_mut()
            .ok_or_else(|| FlowError::Empty.into())
    }

    /// The statements a read would run, with pagination as requested.
    pub fn explain(&mut self) -> ReportResult<Explain> {
        let dialect = self.dialect;
        let (limit, offset) = (self.limit, self.offset);
        let root = self.prepare()?;

        let mut query = root.query()?;
        if let Some(limit) = limit {
            query = query.limit(limit);
        }
        if let Some(offset) = offset {
            query = query.offset(offset);
        }
        Ok(Explain {
            sql: query.to_sql(dialect),
            count_sql: root.count_query()?.to_sql(dialect),
        })
    }

    // =========================================================================
    // Reading
    // =========================================================================

    /// Rows matching the filters, ignoring pagination.
    pub fn record_count(&mut self, exec: &dyn Executor) -> ReportResult<u64> {
        Ok(self.prepare()?.record_count(exec)?)
    }

    /// Next formatted row. [`FlowError::EndOfStream`] (see
    /// [`ReportError::is_end_of_stream`](crate::error::ReportError::is_end_of_stream)) ends the read.
    pub fn next_row(&mut self, exec: &dyn Executor) -> ReportResult<OutputRow> {
        let record = self.prepare()?.retrieve_next_record(exec)?;
        let mut row = OutputRow::new();
        for output in &self.outputs {
            row.push(output.alias(), output.format(&record)?);
        }
        Ok(row)
    }

    /// Every remaining row.
    pub fn rows(&mut self, exec: &dyn Executor) -> ReportResult<Vec<OutputRow>> {
        let mut rows = Vec::new();
        loop {
            match self.next_row(exec) {
                Ok(row) => rows.push(row),
                Err(err) if err.is_end_of_stream() => break,
                Err(err) => return Err(err),
            }
        }
        info!(report = %self.id, rows = rows.len(), "read report");
        Ok(rows)
    }
}

/// Every join column must exist on its source, and the child side may only
/// compare columns the first table of its flow carries.
fn check_join_columns(sources: &Sources, joins: &[PlannedJoin]) -> ConfigResult<()> {
    for join in joins {
        let invalid = |reason: String| ConfigurationError::InvalidJoin {
            from: join.parent.clone(),
            to: join.child.clone(),
            reason,
        };
        let parent = sources.require(&join.parent)?;
        let child = sources.require(&join.child)?;
        for (parent_column, child_column) in &join.columns {
            if parent.catalog().column(parent_column).is_none() {
                return Err(invalid(format!("{} has no column {}", join.parent, parent_column)));
            }
            if child.catalog().column(child_column).is_none() {
                return Err(invalid(format!("{} has no column {}", join.child, child_column)));
            }
            if !child.joinable_on(child_column) {
                return Err(invalid(format!(
                    "{} is aggregated; only its group keys can be joined on, not {}",
                    join.child, child_column
                )));
            }
        }
    }
    Ok(())
}

fn find_output<'a>(
    outputs: &'a mut [Box<dyn OutputHandler>],
    alias: &str,
) -> ConfigResult<&'a mut Box<dyn OutputHandler>> {
    outputs
        .iter_mut()
        .find(|output| output.alias() == alias)
        .ok_or_else(|| ConfigurationError::InvalidOutput {
            alias: alias.to_string(),
            reason: "no such output".into(),
        })
}
