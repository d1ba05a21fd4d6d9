//! Filter binders.
//!
//! A binder connects one external filter parameter to the flow node owning
//! the filtered column. [`FilterBinder::set_filter`] always retracts the
//! clause it attached last time before attaching a new one, so applying the
//! same binder on every page request never accumulates clauses.
//!
//! Wire format: `{ "<filter name>": { "op": "<operator>", "value": <scalar|array> } }`.

mod date_range;
mod membership;
mod value;

pub use date_range::DateRangeFilter;
pub use membership::MembershipFilter;
pub use value::ValueFilter;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigResult, ConfigurationError, ReportResult};
use crate::predicate::{Operator, PredicateId, PredicateValue, WhereClause};
use crate::source::{FieldRef, Sources};

/// One filter parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterInput {
    #[serde(default = "default_operator")]
    pub op: Operator,
    #[serde(default)]
    pub value: PredicateValue,
}

fn default_operator() -> Operator {
    Operator::Eq
}

impl FilterInput {
    pub fn new(op: Operator, value: impl Into<PredicateValue>) -> Self {
        Self {
            op,
            value: value.into(),
        }
    }
}

/// Filter parameters of one request, keyed by filter name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterParams(BTreeMap<String, FilterInput>);

impl FilterParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, input: FilterInput) -> Self {
        self.insert(name, input);
        self
    }

    pub fn insert(&mut self, name: &str, input: FilterInput) {
        self.0.insert(name.into(), input);
    }

    pub fn get(&self, name: &str) -> Option<&FilterInput> {
        self.0.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Attaches and retracts one filter's clause.
pub trait FilterBinder {
    /// Key of this filter in [`FilterParams`].
    fn name(&self) -> &str;

    fn is_required(&self) -> bool;

    /// Resolve the filtered field, attaching its table if needed.
    fn initialize(&mut self, sources: &mut Sources) -> ConfigResult<()>;

    /// Replace the attached clause with one built from `params`. Without a
    /// parameter for this filter the binder ends up inactive.
    fn set_filter(&mut self, sources: &mut Sources, params: &FilterParams) -> ReportResult<()>;

    /// Retract the attached clause, if any.
    fn reset_filter(&mut self, sources: &mut Sources) -> ReportResult<()>;

    /// A clause is currently attached.
    fn is_active(&self) -> bool;
}

/// Fail with [`ConfigurationError::MissingRequiredFilter`] for the first
/// required binder with nothing attached.
pub fn validate_required(binders: &[Box<dyn FilterBinder>]) -> ConfigResult<()> {
    match binders.iter().find(|b| b.is_required() && !b.is_active()) {
        Some(binder) => Err(ConfigurationError::MissingRequiredFilter(binder.name().into())),
        None => Ok(()),
    }
}

/// The resolved field a binder filters on and the clause it attached.
#[derive(Debug, Clone, Default)]
pub(crate) struct Binding {
    pub source: String,
    pub field: Option<FieldRef>,
    pub attached: Option<PredicateId>,
}

impl Binding {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.into(),
            field: None,
            attached: None,
        }
    }

    pub fn resolve(&mut self, sources: &mut Sources, path: &str) -> ConfigResult<&FieldRef> {
        let source = sources
            .get_mut(&self.source)
            .ok_or_else(|| ConfigurationError::UnknownSource(self.source.clone()))?;
        Ok(self.field.insert(source.ensure_field(path)?))
    }

    pub fn field(&self, name: &str) -> ReportResult<&FieldRef> {
        self.field.as_ref().ok_or_else(|| {
            ConfigurationError::InvalidFilter {
                name: name.into(),
                reason: "filter used before initialize()".into(),
            }
            .into()
        })
    }

    pub fn attach(&mut self, sources: &mut Sources, clause: WhereClause) -> ReportResult<()> {
        let target = match &self.field {
            Some(field) => field.target.clone(),
            None => return Ok(()),
        };
        let source = sources.require_mut(&self.source)?;
        self.attached = Some(source.add_clause(&target, clause)?);
        Ok(())
    }

    pub fn retract(&mut self, sources: &mut Sources) -> ReportResult<()> {
        if let Some(id) = self.attached.take() {
            sources.require_mut(&self.source)?.remove_clause(id)?;
        }
        Ok(())
    }
}
