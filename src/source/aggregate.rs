//! Per-group extremum ("row holding the latest X per Y").

use serde::{Deserialize, Serialize};

use super::{FieldResolutionError, FieldResolutionResult};
use crate::field::{FieldSpecification, SqlWrapper};
use crate::flow::{ColumnRef, Flow, JoinStrategy, SubqueryFlow, TableFlow};
use crate::predicate::WhereClause;
use crate::schema::EntityCatalog;

/// Aggregate function picking the group representative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFunction {
    Min,
    Max,
}

impl AggregateFunction {
    pub fn name(&self) -> &'static str {
        match self {
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
        }
    }

    pub fn wrapper(&self) -> SqlWrapper {
        SqlWrapper::function(&self.name().to_ascii_uppercase())
    }
}

/// Aggregation parameters of a source: keep, per `group_by` key, only the
/// entity rows whose `target` equals the group's MIN/MAX.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    pub function: AggregateFunction,
    pub target: String,
    pub group_by: Vec<String>,
}

impl Aggregation {
    pub fn max(target: &str, group_by: &[&str]) -> Self {
        Self::new(AggregateFunction::Max, target, group_by)
    }

    pub fn min(target: &str, group_by: &[&str]) -> Self {
        Self::new(AggregateFunction::Min, target, group_by)
    }

    fn new(function: AggregateFunction, target: &str, group_by: &[&str]) -> Self {
        Self {
            function,
            target: target.into(),
            group_by: group_by.iter().map(|key| key.to_string()).collect(),
        }
    }

    pub fn derived_alias(source: &str) -> String {
        format!("{}_agg", source)
    }

    pub fn key_alias(source: &str, column: &str) -> String {
        format!("{}_agg_{}", source, column)
    }

    pub fn value_alias(&self, source: &str) -> String {
        format!("{}_agg_{}_{}", source, self.function.name(), self.target)
    }

    pub fn is_key(&self, column: &str) -> bool {
        self.group_by.iter().any(|key| key == column)
    }

    pub(crate) fn validate(&self, source: &str, catalog: &EntityCatalog) -> FieldResolutionResult<()> {
        let invalid = |reason: String| FieldResolutionError::InvalidAggregation {
            source_name: source.into(),
            reason,
        };
        if self.group_by.is_empty() {
            return Err(invalid("no group-by keys".into()));
        }
        if self.is_key(&self.target) {
            return Err(invalid(format!("{} is both target and key", self.target)));
        }
        for column in self.group_by.iter().chain(std::iter::once(&self.target)) {
            if catalog.column(column).is_none() {
                return Err(invalid(format!("unknown column {}", column)));
            }
        }
        Ok(())
    }

    /// `(SELECT keys, FN(target) FROM entity WHERE <entity filters> GROUP BY keys) AS <source>_agg`.
    ///
    /// The inner table reuses the entity alias so the entity's clauses
    /// render unchanged inside the derived table.
    pub(crate) fn derived_flow(
        &self,
        source: &str,
        catalog: &EntityCatalog,
        entity_alias: &str,
        entity_clauses: &[WhereClause],
    ) -> FieldResolutionResult<SubqueryFlow> {
        let mut raw = TableFlow::new(&catalog.table, entity_alias);
        if let Some(schema) = &catalog.schema {
            raw = raw.with_schema(schema);
        }

        for key in &self.group_by {
            let alias = Self::key_alias(source, key);
            raw.add_field(&alias, column_field(catalog, key, &alias))
                .map_err(|_| FieldResolutionError::AliasConflict(alias.clone()))?;
        }
        let value_alias = self.value_alias(source);
        let value = column_field(catalog, &self.target, &value_alias).with_wrapper(self.function.wrapper());
        raw.add_field(&value_alias, value)
            .map_err(|_| FieldResolutionError::AliasConflict(value_alias.clone()))?;

        let mut inner = Flow::from(raw);
        for clause in entity_clauses.iter().filter(|clause| !clause.is_join_clause()) {
            inner.add_clause(clause.clone())?;
        }
        for key in &self.group_by {
            inner.add_aggregate(&Self::key_alias(source, key))?;
        }

        Ok(SubqueryFlow::new(inner, &Self::derived_alias(source)))
    }

    /// INNER join of the entity back onto the derived table on every key
    /// and on `target = aggregated value`.
    pub(crate) fn join_back(&self, source: &str, entity_alias: &str) -> JoinStrategy {
        let derived = Self::derived_alias(source);
        let strategy = self.group_by.iter().fold(JoinStrategy::inner(), |strategy, key| {
            strategy.on(
                ColumnRef::new(&derived, &Self::key_alias(source, key)),
                ColumnRef::new(entity_alias, key),
            )
        });
        strategy.on(
            ColumnRef::new(&derived, &self.value_alias(source)),
            ColumnRef::new(entity_alias, &self.target),
        )
    }
}

/// Stored column as a field, ignoring any computed-column wrapper.
fn column_field(catalog: &EntityCatalog, column: &str, alias: &str) -> FieldSpecification {
    let mut field = match catalog.column(column) {
        Some(spec) => spec.to_field(alias),
        None => FieldSpecification::new(column, Default::default()).with_alias(alias),
    };
    field.wrapper = None;
    field
}
