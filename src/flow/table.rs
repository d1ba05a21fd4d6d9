//! Leaf flow over one physical table.

use super::{Composition, FlowState};
use crate::field::{DataSpecification, FieldResult, FieldSpecification};
use crate::sql::TableRef;

/// One table, its alias, and the fields projected from it.
#[derive(Debug, Clone)]
pub struct TableFlow {
    table: String,
    schema: Option<String>,
    alias: String,
    fields: DataSpecification,
    pub(crate) state: FlowState,
}

impl TableFlow {
    pub fn new(table: &str, alias: &str) -> Self {
        Self {
            table: table.into(),
            schema: None,
            alias: alias.into(),
            fields: DataSpecification::new(),
            state: FlowState::default(),
        }
    }

    pub fn with_schema(mut self, schema: &str) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn fields(&self) -> &DataSpecification {
        &self.fields
    }

    /// Project `field` from this table under `name`. The field is rebound
    /// to this flow's alias.
    pub fn add_field(&mut self, name: &str, field: FieldSpecification) -> FieldResult<()> {
        let field = FieldSpecification {
            table: Some(self.alias.clone()),
            ..field
        };
        self.fields.add(name, field)
    }

    /// Project `field` under its own alias.
    pub fn push_field(&mut self, field: FieldSpecification) -> FieldResult<()> {
        let name = field.alias.clone();
        self.add_field(&name, field)
    }

    pub fn remove_field(&mut self, name: &str) -> Option<FieldSpecification> {
        self.fields.remove(name)
    }

    fn table_ref(&self) -> TableRef {
        let table = TableRef::new(&self.table).with_alias(&self.alias);
        match &self.schema {
            Some(schema) => table.with_schema(schema),
            None => table,
        }
    }

    pub(crate) fn compose(&self) -> Composition {
        let mut composition = Composition::new(self.table_ref());
        composition.select = self.fields.fields().cloned().collect();
        composition
    }
}
