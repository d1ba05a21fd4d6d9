//! Output handlers.
//!
//! An [`OutputHandler`] turns the raw column(s) it reserved into one named
//! [`OutputValue`]. Handlers reserve their columns on the owning table
//! under their own alias during `initialize`, so two handlers can present
//! the same physical column differently.
//!
//! Handlers implementing [`AggregatableOutput`] can make their column a
//! GROUP BY key for a single request.

mod concat;
mod date;
mod field;
mod link;

pub use concat::ConcatOutput;
pub use date::DateOutput;
pub use field::{FieldOutput, OptionOutput};
pub use link::LinkOutput;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use thiserror::Error;

use crate::error::{ConfigResult, ConfigurationError, ReportResult};
use crate::exec::Record;
use crate::source::{FieldRef, Sources};
use crate::value::Value;

/// Result type for formatting.
pub type OutputResult<T> = Result<T, OutputError>;

/// Formatting failures. One failing value aborts the whole iteration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OutputError {
    #[error("column {0} missing from the result row")]
    MissingColumn(String),

    #[error("output {alias}: {value:?} is not a date")]
    InvalidDate { alias: String, value: String },
}

/// One formatted value of an output row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputValue {
    pub raw_value: Value,
    pub formatted_value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_value: Option<String>,
}

impl OutputValue {
    pub fn new(raw_value: Value, formatted_value: String) -> Self {
        Self {
            raw_value,
            formatted_value,
            html_value: None,
        }
    }

    pub fn with_html(mut self, html: String) -> Self {
        self.html_value = Some(html);
        self
    }
}

/// Formatted row: output alias to value, in handler order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputRow {
    values: Vec<(String, OutputValue)>,
}

impl OutputRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, alias: &str, value: OutputValue) {
        self.values.push((alias.into(), value));
    }

    pub fn get(&self, alias: &str) -> Option<&OutputValue> {
        self.values
            .iter()
            .find(|(key, _)| key == alias)
            .map(|(_, value)| value)
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Serialize for OutputRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (alias, value) in &self.values {
            map.serialize_entry(alias, value)?;
        }
        map.end()
    }
}

/// Formats one output column.
pub trait OutputHandler {
    /// Key of this output in [`OutputRow`].
    fn alias(&self) -> &str;

    fn title(&self) -> &str;

    /// Reserve the columns this handler reads.
    fn initialize(&mut self, sources: &mut Sources) -> ConfigResult<()>;

    fn format(&self, record: &Record) -> OutputResult<OutputValue>;

    fn as_aggregatable(&mut self) -> Option<&mut dyn AggregatableOutput> {
        None
    }
}

/// Handlers whose column can be toggled as a GROUP BY key.
pub trait AggregatableOutput {
    fn enable_aggregation(&mut self, sources: &mut Sources) -> ReportResult<()>;

    fn disable_aggregation(&mut self, sources: &mut Sources) -> ReportResult<()>;

    fn is_aggregated(&self) -> bool;
}

/// A column reserved under a handler-chosen alias.
#[derive(Debug, Clone)]
pub(crate) struct Reservation {
    pub source: String,
    pub path: String,
    pub alias: String,
    pub field: Option<FieldRef>,
}

impl Reservation {
    pub fn new(source: &str, path: &str, alias: &str) -> Self {
        Self {
            source: source.into(),
            path: path.into(),
            alias: alias.into(),
            field: None,
        }
    }

    pub fn reserve(&mut self, sources: &mut Sources) -> ConfigResult<&FieldRef> {
        let source = sources
            .get_mut(&self.source)
            .ok_or_else(|| ConfigurationError::UnknownSource(self.source.clone()))?;
        let field = source.ensure_field_in_source(&self.path, &self.alias)?;
        Ok(self.field.insert(field))
    }

    pub fn value<'r>(&self, record: &'r Record) -> OutputResult<&'r Value> {
        record
            .get(&self.alias)
            .ok_or_else(|| OutputError::MissingColumn(self.alias.clone()))
    }

    pub fn set_aggregate(&self, sources: &mut Sources, enabled: bool) -> ReportResult<()> {
        let source = sources.require_mut(&self.source)?;
        if enabled {
            source.add_aggregate(&self.alias)?;
        } else {
            source.remove_aggregate(&self.alias)?;
        }
        Ok(())
    }
}

pub(crate) fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
