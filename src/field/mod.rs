//! Typed field catalog.
//!
//! [`FieldSpecification`] describes one column a flow can project or filter
//! on; [`DataSpecification`] is the ordered, name/alias addressable set of
//! them that every flow carries.

mod data_spec;

pub use data_spec::{DataSpecification, FieldError, FieldResult};

use serde::{Deserialize, Serialize};

use crate::sql::{table_col, wrapped, Expr};
use crate::value::Value;

/// Semantic type of a field. Drives literal escaping and output formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Integer,
    Float,
    Money,
    #[default]
    String,
    Text,
    Date,
    Timestamp,
    Boolean,
    File,
}

impl FieldType {
    /// Types whose literals are quoted strings.
    pub fn is_string_like(&self) -> bool {
        matches!(
            self,
            FieldType::String | FieldType::Text | FieldType::Date | FieldType::Timestamp
        )
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            FieldType::Integer | FieldType::Float | FieldType::Money | FieldType::File
        )
    }

    /// Map a declared column type (SQLite affinity rules) to a field type.
    pub fn from_declared(decl: &str) -> Self {
        let decl = decl.to_ascii_uppercase();
        if decl.contains("BOOL") {
            FieldType::Boolean
        } else if decl.contains("INT") {
            FieldType::Integer
        } else if decl.contains("TIMESTAMP") || decl.contains("DATETIME") {
            FieldType::Timestamp
        } else if decl.contains("DATE") {
            FieldType::Date
        } else if decl.contains("DEC") || decl.contains("MONEY") {
            FieldType::Money
        } else if decl.contains("REAL") || decl.contains("FLOA") || decl.contains("DOUB") {
            FieldType::Float
        } else if decl.contains("TEXT") || decl.contains("CLOB") {
            FieldType::Text
        } else {
            FieldType::String
        }
    }
}

/// One enumerated option of a field: stored value and display label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOption {
    pub value: Value,
    pub label: String,
}

/// A `%s` template applied to a column reference, e.g. `MONTH(%s)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SqlWrapper(String);

impl SqlWrapper {
    /// Returns `None` when the template has no `%s` placeholder.
    pub fn new(template: &str) -> Option<Self> {
        template.contains("%s").then(|| Self(template.to_string()))
    }

    /// `NAME(%s)`.
    pub fn function(name: &str) -> Self {
        Self(format!("{}(%s)", name))
    }

    pub fn template(&self) -> &str {
        &self.0
    }

    pub fn apply(&self, inner: Expr) -> Expr {
        wrapped(&self.0, inner)
    }

    /// Wrap this template inside another one: `outer(self(%s))`.
    pub fn nest_in(&self, outer: &SqlWrapper) -> SqlWrapper {
        SqlWrapper(outer.0.replace("%s", &self.0))
    }
}

/// A typed column description.
///
/// `name` is the column as the owning table exposes it; `alias` is the
/// output key, unique across a whole composed query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpecification {
    pub name: String,
    pub alias: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,
    /// Alias of the table that owns the column, set once the field is
    /// placed in a flow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrapper: Option<SqlWrapper>,
}

impl FieldSpecification {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            alias: name.into(),
            field_type,
            title: inflector::cases::titlecase::to_title_case(name),
            options: Vec::new(),
            table: None,
            wrapper: None,
        }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = alias.into();
        self
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_options(mut self, options: Vec<FieldOption>) -> Self {
        self.options = options;
        self
    }

    pub fn with_table(mut self, table: &str) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn with_wrapper(mut self, wrapper: SqlWrapper) -> Self {
        self.wrapper = Some(wrapper);
        self
    }

    /// Clone under a different alias. Type, column and wrapper are kept so
    /// the same physical column can be projected under several roles.
    pub fn clone_as(&self, alias: &str) -> Self {
        let mut clone = self.clone();
        clone.alias = alias.into();
        clone
    }

    /// Bare column reference, without the wrapper.
    pub fn column_ref(&self) -> Expr {
        match &self.table {
            Some(table) => table_col(table, &self.name),
            None => crate::sql::col(&self.name),
        }
    }

    /// Column reference with the wrapper applied.
    pub fn column_expr(&self) -> Expr {
        let column = self.column_ref();
        match &self.wrapper {
            Some(wrapper) => wrapper.apply(column),
            None => column,
        }
    }

    /// Display label for an enumerated value, if the field has options.
    pub fn option_label(&self, value: &Value) -> Option<&str> {
        let wanted = value.as_text();
        self.options
            .iter()
            .find(|option| option.value == *value || option.value.as_text() == wanted)
            .map(|option| option.label.as_str())
    }
}
