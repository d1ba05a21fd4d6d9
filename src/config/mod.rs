//! Report definitions.
//!
//! A report is declared in TOML (or the equivalent JSON):
//!
//! ```toml
//! id = "large-orders"
//! dialect = "sqlite"
//! database = "${DATA_DIR}/shop.db"
//! limit = 50
//!
//! [[sources]]
//! name = "orders"
//!
//! [[sources]]
//! name = "customers"
//!
//! [[joins]]
//! from = "orders"
//! to = "customers"
//! on = [{ from = "customer_id", to = "id" }]
//!
//! [[filters]]
//! kind = "value"
//! name = "amount"
//! source = "orders"
//! field = "amount"
//!
//! [[outputs]]
//! kind = "field"
//! alias = "customer"
//! source = "customers"
//! field = "name"
//!
//! [[sort]]
//! alias = "orders_date"
//! order = "desc"
//! ```
//!
//! `[[entities]]` may declare catalogs inline; otherwise they come from a
//! [`SchemaProvider`](crate::schema::SchemaProvider) such as the SQLite
//! introspector.

mod definitions;
mod env;

pub use definitions::{FilterConfig, JoinColumns, JoinConfig, OutputConfig, SourceConfig};
pub use env::expand_env_vars;

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cache::compute_hash;
use crate::error::{ConfigResult, ConfigurationError};
use crate::filter::FilterBinder;
use crate::flow::SortSpec;
use crate::output::OutputHandler;
use crate::schema::{EntityCatalog, StaticSchemaProvider};
use crate::sql::Dialect;

/// A complete report definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Stable identifier, used as the configuration cache key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub dialect: Dialect,

    /// SQLite database path; supports `${VAR}` expansion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<EntityCatalog>,

    /// The first source is the anchor every other source joins onto.
    pub sources: Vec<SourceConfig>,

    pub joins: Vec<JoinConfig>,

    pub filters: Vec<FilterConfig>,

    pub outputs: Vec<OutputConfig>,

    pub sort: Vec<SortSpec>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

impl ReportConfig {
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigurationError::Parse {
            format: "toml",
            message: e.to_string(),
        })
    }

    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        serde_json::from_str(content).map_err(|e| ConfigurationError::Parse {
            format: "json",
            message: e.to_string(),
        })
    }

    /// Load a definition; `.json` files are JSON, anything else TOML.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_toml_str(&content),
        }
    }

    /// Database path with environment variables expanded.
    pub fn database_path(&self) -> ConfigResult<Option<String>> {
        self.database.as_deref().map(expand_env_vars).transpose()
    }

    /// SHA-256 of the canonical JSON form.
    pub fn fingerprint(&self) -> ConfigResult<String> {
        compute_hash(self).map_err(|e| ConfigurationError::Parse {
            format: "json",
            message: e.to_string(),
        })
    }

    /// Cache key: the declared id, or the fingerprint for anonymous reports.
    pub fn key(&self) -> ConfigResult<String> {
        match &self.id {
            Some(id) => Ok(id.clone()),
            None => self.fingerprint(),
        }
    }

    pub fn anchor(&self) -> ConfigResult<&SourceConfig> {
        self.sources.first().ok_or(ConfigurationError::NoSources)
    }

    /// Schema provider over the inline `[[entities]]`.
    pub fn schema_provider(&self) -> StaticSchemaProvider {
        StaticSchemaProvider::new(self.entities.iter().cloned())
    }

    /// Checks that need no schema: unique names, known source references,
    /// unique output aliases.
    pub fn validate(&self) -> ConfigResult<()> {
        self.anchor()?;

        let mut names = HashSet::new();
        for source in &self.sources {
            if !names.insert(source.name.as_str()) {
                return Err(ConfigurationError::DuplicateSource(source.name.clone()));
            }
        }
        let known = |name: &str| -> ConfigResult<()> {
            if names.contains(name) {
                Ok(())
            } else {
                Err(ConfigurationError::UnknownSource(name.to_string()))
            }
        };

        for join in &self.joins {
            known(&join.from)?;
            known(&join.to)?;
            if join.on.is_empty() {
                return Err(ConfigurationError::InvalidJoin {
                    from: join.from.clone(),
                    to: join.to.clone(),
                    reason: "no join columns".into(),
                });
            }
        }
        for filter in &self.filters {
            known(filter.source())?;
        }

        let mut aliases = HashSet::new();
        for output in &self.outputs {
            known(output.source())?;
            if !aliases.insert(output.alias()) {
                return Err(ConfigurationError::DuplicateAlias(output.alias().to_string()));
            }
        }
        Ok(())
    }

    pub fn build_filters(&self) -> Vec<Box<dyn FilterBinder>> {
        self.filters.iter().map(FilterConfig::build).collect()
    }

    pub fn build_outputs(&self) -> Vec<Box<dyn OutputHandler>> {
        self.outputs.iter().map(OutputConfig::build).collect()
    }
}
