//! `field <op> value` filters.

use super::{Binding, FilterBinder, FilterParams};
use crate::error::{ConfigResult, ReportResult};
use crate::predicate::Predicate;
use crate::source::Sources;

/// Compares one field with the request's operator and value.
#[derive(Debug, Clone)]
pub struct ValueFilter {
    name: String,
    path: String,
    required: bool,
    join_clause: bool,
    binding: Binding,
}

impl ValueFilter {
    /// Filter `name` on `path` of source `source`.
    pub fn new(name: &str, source: &str, path: &str) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            required: false,
            join_clause: false,
            binding: Binding::new(source),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Place the clause in the ON clause joining the field's table, so an
    /// outer join keeps rows without a match.
    pub fn join_clause(mut self) -> Self {
        self.join_clause = true;
        self
    }
}

impl FilterBinder for ValueFilter {
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

        let field = &self.binding.field(&self.name)?.field;
        let mut predicate = Predicate::for_field(field, input.op, input.value.clone())?;
        if self.join_clause {
            predicate = predicate.as_join_clause();
        }
        self.binding.attach(sources, predicate.into())
    }

    fn reset_filter(&mut self, sources: &mut Sources) -> ReportResult<()> {
        self.binding.retract(sources)
    }

    fn is_active(&self) -> bool {
        self.binding.attached.is_some()
    }
}
