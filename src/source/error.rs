//! Field resolution errors.

use thiserror::Error;

use crate::flow::FlowError;
use crate::schema::SatelliteKind;

/// Result type for source operations.
pub type FieldResolutionResult<T> = Result<T, FieldResolutionError>;

/// A referenced source, satellite or field could not be resolved.
///
/// Some callers treat this as "skip the optional attachment"; the
/// orchestrator propagates it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldResolutionError {
    #[error("unknown source: {0}")]
    UnknownSource(String),

    #[error("source {source_name} has no field {field}")]
    UnknownField { source_name: String, field: String },

    #[error("source {source_name} has no satellite {satellite}")]
    UnknownSatellite { source_name: String, satellite: String },

    #[error("satellite {satellite} of source {source_name} is not a {expected:?}")]
    WrongSatelliteKind {
        source_name: String,
        satellite: String,
        expected: SatelliteKind,
    },

    #[error("alias {0} is already used by another column")]
    AliasConflict(String),

    #[error("invalid aggregation on source {source_name}: {reason}")]
    InvalidAggregation { source_name: String, reason: String },

    #[error(transparent)]
    Flow(#[from] FlowError),
}
