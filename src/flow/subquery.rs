//! Derived-table flow.

use super::{Composition, Flow, FlowResult, FlowState};
use crate::field::FieldSpecification;
use crate::sql::TableRef;

/// Wraps a flow as `(SELECT ...) AS alias`.
///
/// The inner flow renders with its own clauses and GROUP BY keys; only the
/// outer statement's pagination applies. Outside, every inner field is
/// exposed as a plain column of the derived alias, named by its inner alias.
#[derive(Debug, Clone)]
pub struct SubqueryFlow {
    inner: Box<Flow>,
    alias: String,
    pub(crate) state: FlowState,
}

impl SubqueryFlow {
    pub fn new(inner: impl Into<Flow>, alias: &str) -> Self {
        Self {
            inner: Box::new(inner.into()),
            alias: alias.into(),
            state: FlowState::default(),
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn inner(&self) -> &Flow {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut Flow {
        &mut self.inner
    }

    pub(crate) fn fields(&self) -> Vec<FieldSpecification> {
        self.inner
            .fields()
            .into_iter()
            .map(|field| FieldSpecification {
                name: field.alias.clone(),
                table: Some(self.alias.clone()),
                wrapper: None,
                ..field
            })
            .collect()
    }

    pub(crate) fn compose(&self) -> FlowResult<Composition> {
        let inner = self.inner.query()?;
        let mut composition = Composition::new(TableRef::derived(inner, &self.alias));
        composition.select = self.fields();
        Ok(composition)
    }
}
