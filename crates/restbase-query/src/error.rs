//! Error types for query parsing, validation and compilation.

use thiserror::Error;

/// Malformed query-string syntax. Always a client fault.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (near '{fragment}')")]
pub struct ParseError {
    /// The part of the query string that could not be parsed.
    pub fragment: String,
    /// What was wrong with it.
    pub message: String,
}

impl ParseError {
    /// Creates a new parse error for the given fragment.
    #[must_use]
    pub fn new(fragment: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            fragment: fragment.into(),
            message: message.into(),
        }
    }
}

/// Syntactically valid input that cannot be applied. Always a client fault.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Invalid value for '{column}' with operator '{operator}': {message}")]
    InvalidValue {
        column: String,
        operator: String,
        message: String,
    },

    #[error("Invalid st_dwithin value: {0}")]
    InvalidGeoFilter(String),

    #[error("Distance must not be negative, got {0}")]
    NegativeDistance(f64),

    #[error("Update requires at least one column to set")]
    EmptyUpdate,

    #[error("Query too complex: {0}")]
    QueryTooComplex(String),
}

impl ValidationError {
    pub(crate) fn invalid_value(
        column: impl Into<String>,
        operator: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            column: column.into(),
            operator: operator.into(),
            message: message.into(),
        }
    }
}

/// Internal invariant violation while rendering SQL. A server fault.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("Aggregation {0} requires a column")]
    MissingAggregateColumn(String),

    #[error("Invariant violated: {0}")]
    Invariant(String),
}

/// Any failure between the raw query string and a compiled statement.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Compile(#[from] CompileError),
}

impl QueryError {
    /// Returns `true` when the caller sent a bad request.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Parse(_) | Self::Validation(_))
    }
}

/// Result type alias for query operations.
pub type Result<T> = std::result::Result<T, QueryError>;
