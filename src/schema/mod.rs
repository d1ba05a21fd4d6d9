//! Schema providers.
//!
//! A [`SchemaProvider`] answers "what does entity X look like": its table,
//! key, columns and the satellite tables that can be joined onto it. Sources
//! populate their field catalog from here.
//!
//! - [`StaticSchemaProvider`] - catalogs declared in configuration
//! - [`SqliteSchemaProvider`] - introspects a SQLite database

mod catalog;
mod sqlite;

pub use catalog::{ColumnSpec, EntityCatalog, SatelliteKind, SatelliteTable};
pub use sqlite::SqliteSchemaProvider;

use std::collections::HashMap;

use thiserror::Error;

/// Result type for schema lookups.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors raised by schema providers.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    #[error("entity {entity} has no columns")]
    NoColumns { entity: String },

    #[error("schema introspection failed: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Source of entity catalogs.
pub trait SchemaProvider {
    fn entity(&self, name: &str) -> SchemaResult<EntityCatalog>;
}

/// Catalogs held in memory, usually from a report configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticSchemaProvider {
    entities: HashMap<String, EntityCatalog>,
}

impl StaticSchemaProvider {
    pub fn new(entities: impl IntoIterator<Item = EntityCatalog>) -> Self {
        Self {
            entities: entities
                .into_iter()
                .map(|entity| (entity.name.clone(), entity))
                .collect(),
        }
    }

    pub fn insert(&mut self, entity: EntityCatalog) {
        self.entities.insert(entity.name.clone(), entity);
    }

    pub fn with_entity(mut self, entity: EntityCatalog) -> Self {
        self.insert(entity);
        self
    }
}

impl SchemaProvider for StaticSchemaProvider {
    fn entity(&self, name: &str) -> SchemaResult<EntityCatalog> {
        self.entities
            .get(name)
            .cloned()
            .ok_or_else(|| SchemaError::UnknownEntity(name.into()))
    }
}

/// Try `primary` first and fall back to `secondary` for unknown entities.
pub struct LayeredSchemaProvider<'a> {
    primary: &'a dyn SchemaProvider,
    secondary: &'a dyn SchemaProvider,
}

impl<'a> LayeredSchemaProvider<'a> {
    pub fn new(primary: &'a dyn SchemaProvider, secondary: &'a dyn SchemaProvider) -> Self {
        Self { primary, secondary }
    }
}

impl SchemaProvider for LayeredSchemaProvider<'_> {
    fn entity(&self, name: &str) -> SchemaResult<EntityCatalog> {
        match self.primary.entity(name) {
            Err(SchemaError::UnknownEntity(_)) => self.secondary.entity(name),
            other => other,
        }
    }
}
