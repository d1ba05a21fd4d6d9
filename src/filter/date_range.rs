//! Inclusive date ranges.

use super::{Binding, FilterBinder, FilterParams};
use crate::error::{ConfigResult, ReportResult};
use crate::predicate::{Operator, Predicate, PredicateValue};
use crate::source::Sources;
use crate::value::Value;

/// Restricts a date field to `[from, to]`.
///
/// The value is a two-element array; a null bound leaves that side open,
/// and two null bounds attach nothing. A single scalar means "on or after".
#[derive(Debug, Clone)]
pub struct DateRangeFilter {
    name: String,
    path: String,
    required: bool,
    binding: Binding,
}

impl DateRangeFilter {
    pub fn new(name: &str, source: &str, path: &str) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            required: false,
            binding: Binding::new(source),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

fn bounds(value: &PredicateValue) -> (Value, Value) {
    match value {
        PredicateValue::List(values) => (
            values.first().cloned().unwrap_or_default(),
            values.get(1).cloned().unwrap_or_default(),
        ),
        PredicateValue::Single(value) => (value.clone(), Value::Null),
    }
}

impl FilterBinder for DateRangeFilter {
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
        let predicate = match bounds(&input.value) {
            (Value::Null, Value::Null) => return Ok(()),
            (from, Value::Null) => Predicate::for_field(field, Operator::Gte, from)?,
            (Value::Null, to) => Predicate::for_field(field, Operator::Lte, to)?,
            (from, to) => Predicate::for_field(field, Operator::Between, vec![from, to])?,
        };
        self.binding.attach(sources, predicate.into())
    }

    fn reset_filter(&mut self, sources: &mut Sources) -> ReportResult<()> {
        self.binding.retract(sources)
    }

    fn is_active(&self) -> bool {
        self.binding.attached.is_some()
    }
}
