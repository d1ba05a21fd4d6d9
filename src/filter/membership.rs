//! Relationship filters ("has / has no related row with ...").

use super::{Binding, FilterBinder, FilterParams};
use crate::error::{ConfigResult, ConfigurationError, ReportResult};
use crate::field::FieldType;
use crate::predicate::{MembershipMode, MembershipPredicate, Operator};
use crate::source::Sources;

/// Keeps rows whose key appears (or does not appear) among the rows of a
/// related table matching the request's values.
///
/// `=`/`IN` select contains, `!=`/`NOT IN` select excludes.
#[derive(Debug, Clone)]
pub struct MembershipFilter {
    name: String,
    path: String,
    table: String,
    key: String,
    column: String,
    column_type: FieldType,
    required: bool,
    join_clause: bool,
    binding: Binding,
}

impl MembershipFilter {
    /// Filter `name`: `source.path` must be among `table.key` where
    /// `table.column` matches the request.
    pub fn new(name: &str, source: &str, path: &str, table: &str, key: &str, column: &str) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            table: table.into(),
            key: key.into(),
            column: column.into(),
            column_type: FieldType::String,
            required: false,
            join_clause: false,
            binding: Binding::new(source),
        }
    }

    pub fn with_column_type(mut self, field_type: FieldType) -> Self {
        self.column_type = field_type;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn join_clause(mut self) -> Self {
        self.join_clause = true;
        self
    }
}

impl FilterBinder for MembershipFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_required(&self) -> bool {
        self.required
    }

    fn initialize(&mut self, sources: &mut Sources) -> ConfigResult<()> {
        self.binding.resolve(sources, &self.path)?;
        Ok(())
    }

    fn set_filter(&mut self, sources: &mut Sources, params: &FilterParams) -> ReportResult<()> {
        self.reset_filter(sources)?;
        let Some(input) = params.get(&self.name) else {
            return Ok(());
        };

        let mode = match input.op {
            Operator::Eq | Operator::In => MembershipMode::Contains,
            Operator::Ne | Operator::NotIn => MembershipMode::Excludes,
            other => {
                return Err(ConfigurationError::InvalidFilter {
                    name: self.name.clone(),
                    reason: format!("operator {} not supported for membership", other),
                }
                .into())
            }
        };

        let field = &self.binding.field(&self.name)?.field;
        let mut membership =
            MembershipPredicate::new(field.table.as_deref(), &field.name, &self.table, &self.key, mode)
                .with_condition(&self.column, Operator::In, input.value.clone(), self.column_type)?;
        if self.join_clause {
            membership = membership.as_join_clause();
        }
        self.binding.attach(sources, membership.into())
    }

    fn reset_filter(&mut self, sources: &mut Sources) -> ReportResult<()> {
        self.binding.retract(sources)
    }

    fn is_active(&self) -> bool {
        self.binding.attached.is_some()
    }
}
