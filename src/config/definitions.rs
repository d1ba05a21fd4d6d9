//! Declarative pieces of a report definition and their builders.

use serde::{Deserialize, Serialize};

use crate::field::FieldType;
use crate::filter::{DateRangeFilter, FilterBinder, MembershipFilter, ValueFilter};
use crate::flow::JoinKind;
use crate::output::{
    ConcatOutput, DateOutput, FieldOutput, LinkOutput, OptionOutput, OutputHandler,
};
use crate::source::Aggregation;

/// `[[sources]]`: a named instance of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    /// Entity in the schema catalog. Defaults to the source name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<Aggregation>,
}

impl SourceConfig {
    pub fn entity(&self) -> &str {
        self.entity.as_deref().unwrap_or(&self.name)
    }
}

/// One column pair of a join: `from.column = to.column`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinColumns {
    pub from: String,
    pub to: String,
}

/// `[[joins]]`: attaches source `to` onto the already joined source `from`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinConfig {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub kind: JoinKind,
    pub on: Vec<JoinColumns>,
}

/// `[[filters]]`, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterConfig {
    Value {
        name: String,
        source: String,
        field: String,
        #[serde(default)]
        required: bool,
        #[serde(default)]
        join_clause: bool,
    },
    Membership {
        name: String,
        source: String,
        field: String,
        table: String,
        key: String,
        column: String,
        #[serde(default)]
        column_type: FieldType,
        #[serde(default)]
        required: bool,
        #[serde(default)]
        join_clause: bool,
    },
    DateRange {
        name: String,
        source: String,
        field: String,
        #[serde(default)]
        required: bool,
    },
}

impl FilterConfig {
    pub fn name(&self) -> &str {
        match self {
            FilterConfig::Value { name, .. }
            | FilterConfig::Membership { name, .. }
            | FilterConfig::DateRange { name, .. } => name,
        }
    }

    pub fn source(&self) -> &str {
        match self {
            FilterConfig::Value { source, .. }
            | FilterConfig::Membership { source, .. }
            | FilterConfig::DateRange { source, .. } => source,
        }
    }

    pub fn build(&self) -> Box<dyn FilterBinder> {
        match self {
            FilterConfig::Value {
                name,
                source,
                field,
                required,
                join_clause,
            } => {
                let mut filter = ValueFilter::new(name, source, field);
                if *required {
                    filter = filter.required();
                }
                if *join_clause {
                    filter = filter.join_clause();
                }
                Box::new(filter)
            }
            FilterConfig::Membership {
                name,
                source,
                field,
                table,
                key,
                column,
                column_type,
                required,
                join_clause,
            } => {
                let mut filter = MembershipFilter::new(name, source, field, table, key, column)
                    .with_column_type(*column_type);
                if *required {
                    filter = filter.required();
                }
                if *join_clause {
                    filter = filter.join_clause();
                }
                Box::new(filter)
            }
            FilterConfig::DateRange {
                name,
                source,
                field,
                required,
            } => {
                let mut filter = DateRangeFilter::new(name, source, field);
                if *required {
                    filter = filter.required();
                }
                Box::new(filter)
            }
        }
    }
}

/// `[[outputs]]`, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutputConfig {
    Field {
        alias: String,
        source: String,
        field: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    Option {
        alias: String,
        source: String,
        field: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    Date {
        alias: String,
        source: String,
        field: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    Concat {
        alias: String,
        source: String,
        fields: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        separator: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    Link {
        alias: String,
        source: String,
        field: String,
        key: String,
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
}

impl OutputConfig {
    pub fn alias(&self) -> &str {
        match self {
            OutputConfig::Field { alias, .. }
            | OutputConfig::Option { alias, .. }
            | OutputConfig::Date { alias, .. }
            | OutputConfig::Concat { alias, .. }
            | OutputConfig::Link { alias, .. } => alias,
        }
    }

    pub fn source(&self) -> &str {
        match self {
            OutputConfig::Field { source, .. }
            | OutputConfig::Option { source, .. }
            | OutputConfig::Date { source, .. }
            | OutputConfig::Concat { source, .. }
            | OutputConfig::Link { source, .. } => source,
        }
    }

    pub fn build(&self) -> Box<dyn OutputHandler> {
        match self {
            OutputConfig::Field {
                alias,
                source,
                field,
                title,
            } => {
                let output = FieldOutput::new(alias, source, field);
                Box::new(match title {
                    Some(title) => output.with_title(title),
                    None => output,
                })
            }
            OutputConfig::Option {
                alias,
                source,
                field,
                title,
            } => {
                let output = OptionOutput::new(alias, source, field);
                Box::new(match title {
                    Some(title) => output.with_title(title),
                    None => output,
                })
            }
            OutputConfig::Date {
                alias,
                source,
                field,
                format,
                title,
            } => {
                let mut output = DateOutput::new(alias, source, field);
                if let Some(format) = format {
                    output = output.with_format(format);
                }
                if let Some(title) = title {
                    output = output.with_title(title);
                }
                Box::new(output)
            }
            OutputConfig::Concat {
                alias,
                source,
                fields,
                separator,
                title,
            } => {
                let paths: Vec<&str> = fields.iter().map(String::as_str).collect();
                let mut output = ConcatOutput::new(alias, source, &paths);
                if let Some(separator) = separator {
                    output = output.with_separator(separator);
                }
                if let Some(title) = title {
                    output = output.with_title(title);
                }
                Box::new(output)
            }
            OutputConfig::Link {
                alias,
                source,
                field,
                key,
                url,
                title,
            } => {
                let output = LinkOutput::new(alias, source, field, key, url);
                Box::new(match title {
                    Some(title) => output.with_title(title),
                    None => output,
                })
            }
        }
    }
}
