//! Entity and satellite catalogs.

use serde::{Deserialize, Serialize};

use crate::field::{FieldOption, FieldSpecification, FieldType, SqlWrapper};

fn default_key() -> String {
    "id".into()
}

/// One column as the schema describes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,
    /// Computed column: `%s` template applied to the stored column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrapper: Option<SqlWrapper>,
}

impl ColumnSpec {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            title: None,
            options: Vec::new(),
            wrapper: None,
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_options(mut self, options: Vec<FieldOption>) -> Self {
        self.options = options;
        self
    }

    /// Field for this column, projected under `alias`.
    pub fn to_field(&self, alias: &str) -> FieldSpecification {
        let mut field = FieldSpecification::new(&self.name, self.field_type)
            .with_alias(alias)
            .with_options(self.options.clone());
        if let Some(title) = &self.title {
            field.title = title.clone();
        }
        field.wrapper = self.wrapper.clone();
        field
    }
}

/// How a satellite relates to its entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SatelliteKind {
    #[default]
    Detail,
    CustomGroup,
}

/// A table that can be joined onto an entity on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SatelliteTable {
    pub name: String,
    pub table: String,
    /// Column of the satellite pointing at the entity.
    pub join_column: String,
    /// Column of the entity the satellite points at.
    #[serde(default = "default_key")]
    pub entity_column: String,
    #[serde(default)]
    pub kind: SatelliteKind,
    /// Several satellite rows per entity row. Such satellites are reduced
    /// to one row per entity before joining.
    #[serde(default)]
    pub multiple: bool,
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
}

impl SatelliteTable {
    pub fn new(name: &str, table: &str, join_column: &str) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            join_column: join_column.into(),
            entity_column: default_key(),
            kind: SatelliteKind::Detail,
            multiple: false,
            columns: Vec::new(),
        }
    }

    pub fn custom_group(mut self) -> Self {
        self.kind = SatelliteKind::CustomGroup;
        self
    }

    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    pub fn with_column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|column| column.name == name)
    }
}

/// Everything a source needs to know about one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityCatalog {
    pub name: String,
    pub table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default = "default_key")]
    pub key: String,
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
    #[serde(default)]
    pub satellites: Vec<SatelliteTable>,
}

impl EntityCatalog {
    pub fn new(name: &str, table: &str) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            schema: None,
            key: default_key(),
            columns: Vec::new(),
            satellites: Vec::new(),
        }
    }

    pub fn with_key(mut self, key: &str) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_satellite(mut self, satellite: SatelliteTable) -> Self {
        self.satellites.push(satellite);
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn satellite(&self, name: &str) -> Option<&SatelliteTable> {
        self.satellites.iter().find(|satellite| satellite.name == name)
    }

    pub fn custom_groups(&self) -> impl Iterator<Item = &SatelliteTable> {
        self.satellites
            .iter()
            .filter(|satellite| satellite.kind == SatelliteKind::CustomGroup)
    }
}
