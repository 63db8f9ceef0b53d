//! Execution errors and their classification.

use std::fmt;

use restbase_query::QueryError;
use sqlx_core::error::Error as SqlxError;

/// PostgreSQL error code for insufficient privilege (42501), raised by RLS
/// policy and grant violations.
pub const PG_INSUFFICIENT_PRIVILEGE: &str = "42501";

/// PostgreSQL error code for a cancelled statement (57014), raised when
/// `statement_timeout` expires.
pub const PG_QUERY_CANCELED: &str = "57014";

/// PostgreSQL error code for an undefined function or operator (42883),
/// e.g. `integer = text` when a value was bound without a type.
pub const PG_UNDEFINED_FUNCTION: &str = "42883";

/// PostgreSQL error code for invalid text input (22P02), e.g. `'abc'::integer`.
pub const PG_INVALID_TEXT_REPRESENTATION: &str = "22P02";

/// Whether a SQLSTATE means the request carried a value the database could
/// not use: any data exception (class 22), or an operator, column or type
/// mismatch the caller's values or names caused.
pub fn is_invalid_input_code(code: &str) -> bool {
    code.starts_with("22")
        || matches!(code, PG_UNDEFINED_FUNCTION | "42703" | "42804")
}

/// Checks if a sqlx error has a specific PostgreSQL error code.
pub fn has_pg_error_code(err: &SqlxError, code: &str) -> bool {
    if let SqlxError::Database(db_err) = err {
        db_err.code().as_deref() == Some(code)
    } else {
        false
    }
}

/// Checks if a sqlx error is a permission failure (42501).
pub fn is_permission_denied(err: &SqlxError) -> bool {
    has_pg_error_code(err, PG_INSUFFICIENT_PRIVILEGE)
}

/// How a caller should surface an [`RlsError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad request.
    Client,
    /// Authorization failure.
    Forbidden,
    /// Retryable: the pool or database is temporarily out of reach.
    Unavailable,
    /// Generic server failure.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client => write!(f, "client"),
            Self::Forbidden => write!(f, "forbidden"),
            Self::Unavailable => write!(f, "unavailable"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// Errors raised while running a request inside an RLS transaction.
#[derive(Debug, thiserror::Error)]
pub enum RlsError {
    /// No connection could be acquired or the transaction could not begin.
    #[error("Database unavailable: {message}")]
    Unavailable { message: String },

    /// The database rejected the statement for the current role.
    #[error("Permission denied: {detail}")]
    PermissionDenied { detail: String },

    /// The database could not interpret a value or name from the request.
    #[error("Invalid input ({code}): {message}")]
    InvalidInput { code: String, message: String },

    /// Any other database failure.
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    /// The transaction exceeded its time budget and was rolled back.
    #[error("Transaction timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The query could not be parsed or compiled.
    #[error(transparent)]
    Query(#[from] QueryError),
}

impl RlsError {
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn permission_denied(detail: impl Into<String>) -> Self {
        Self::PermissionDenied {
            detail: detail.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Query(err) if err.is_client_error() => ErrorCategory::Client,
            Self::InvalidInput { .. } => ErrorCategory::Client,
            Self::PermissionDenied { .. } => ErrorCategory::Forbidden,
            Self::Unavailable { .. } | Self::Timeout { .. } => ErrorCategory::Unavailable,
            Self::Query(_) | Self::Database(_) => ErrorCategory::Internal,
        }
    }

    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Unavailable
    }
}

impl From<SqlxError> for RlsError {
    /// Classifies a database error. Permission failures keep only a generic
    /// detail; the raw message is logged here and not returned.
    fn from(err: SqlxError) -> Self {
        if matches!(
            err,
            SqlxError::PoolTimedOut | SqlxError::PoolClosed | SqlxError::Io(_) | SqlxError::Tls(_)
        ) {
            return Self::unavailable(err.to_string());
        }

        if is_permission_denied(&err) {
            tracing::warn!(error = %err, "statement rejected by row-level security");
            return Self::permission_denied("insufficient privilege for this operation");
        }

        if let SqlxError::Database(db_err) = &err
            && let Some(code) = db_err.code()
            && is_invalid_input_code(&code)
        {
            tracing::debug!(error = %err, "statement rejected its input");
            return Self::InvalidInput {
                code: code.into_owned(),
                message: db_err.message().to_string(),
            };
        }

        if has_pg_error_code(&err, PG_QUERY_CANCELED) {
            tracing::warn!(error = %err, "statement cancelled");
        }
        Self::Database(err)
    }
}

/// Result type alias for RLS execution.
pub type Result<T> = std::result::Result<T, RlsError>;
