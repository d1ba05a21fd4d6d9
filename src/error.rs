//! Crate-level error taxonomy.
//!
//! Each layer has its own error enum; [`ReportError`] collects them for the
//! orchestrator and the CLI.

use thiserror::Error;

use crate::exec::ExecError;
use crate::field::FieldError;
use crate::flow::FlowError;
use crate::output::OutputError;
use crate::predicate::PredicateError;
use crate::schema::SchemaError;
use crate::source::FieldResolutionError;

/// Result type for configuration loading and report compilation.
pub type ConfigResult<T> = Result<T, ConfigurationError>;

/// Result type for report execution.
pub type ReportResult<T> = Result<T, ReportError>;

/// The report definition references something that does not exist or is
/// inconsistent. Fatal: the report cannot be built.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid {format} configuration: {message}")]
    Parse { format: &'static str, message: String },

    #[error("environment variable {0} is not set")]
    MissingEnvVar(String),

    #[error("no database configured")]
    MissingDatabase,

    #[error("report defines no sources")]
    NoSources,

    #[error("source {0} is defined twice")]
    DuplicateSource(String),

    #[error("unknown source: {0}")]
    UnknownSource(String),

    #[error("source {0} is not joined to the anchor source")]
    DisconnectedSource(String),

    #[error("invalid join {from} -> {to}: {reason}")]
    InvalidJoin {
        from: String,
        to: String,
        reason: String,
    },

    #[error("invalid filter {name}: {reason}")]
    InvalidFilter { name: String, reason: String },

    #[error("invalid output {alias}: {reason}")]
    InvalidOutput { alias: String, reason: String },

    #[error("alias {0} is used by more than one output")]
    DuplicateAlias(String),

    #[error("required filter {0} has no value")]
    MissingRequiredFilter(String),

    #[error(transparent)]
    Resolution(#[from] FieldResolutionError),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Any failure while building or running a report.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Flow(#[from] FlowError),

    #[error(transparent)]
    Resolution(#[from] FieldResolutionError),

    #[error(transparent)]
    Predicate(#[from] PredicateError),

    #[error(transparent)]
    Field(#[from] FieldError),

    #[error(transparent)]
    Output(#[from] OutputError),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error("failed to serialize output: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ReportError {
    /// The row stream is exhausted. Not a failure.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, ReportError::Flow(FlowError::EndOfStream))
    }
}
