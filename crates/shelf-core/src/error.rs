//! Unified error type for photoshelf.
//!
//! Every crate funnels its failures into [`Error`]. Handlers derive the HTTP
//! status from [`Error::http_status`] and the client-facing text from
//! [`Error::public_message`], which never exposes storage or filesystem
//! details. The full error is logged server-side.

use std::fmt;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Unified error type covering all failure modes in photoshelf.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Request data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An identifier was not a positive integer.
    #[error("Invalid id: {0}")]
    InvalidId(String),

    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "photo", "blob").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// An upload exceeded the configured byte ceiling.
    #[error("Payload too large: limit is {limit} bytes")]
    PayloadTooLarge {
        /// The ceiling in bytes.
        limit: u64,
    },

    /// The metadata store was used before the connection pool became ready.
    #[error("Database pool is not initialized")]
    NotInitialized,

    /// The metadata store or blob store could not be reached.
    #[error("Store unavailable: {source}")]
    StoreUnavailable {
        /// The underlying error.
        source: BoxError,
    },

    /// The connection pool could not be established within the retry budget.
    #[error("Could not connect to database after {attempts} attempts: {source}")]
    Connection {
        /// How many attempts were made.
        attempts: u32,
        /// The error from the last attempt.
        source: BoxError,
    },

    /// The store rejected a write (CHECK, NOT NULL, UNIQUE...).
    #[error("Constraint violation: {source}")]
    ConstraintViolation {
        /// The underlying database error.
        source: BoxError,
    },

    /// Any other database failure.
    #[error("Database error: {source}")]
    Database {
        /// The underlying database error.
        source: BoxError,
    },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// A compensating action failed after the primary operation had already
    /// failed. Logged; callers still report the original error.
    #[error("Compensation '{action}' failed: {source}")]
    PartialFailure {
        /// The compensating action that was attempted.
        action: String,
        /// Why it failed.
        source: Box<Error>,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,
            Error::InvalidId(_) => 400,
            Error::NotFound { .. } => 404,
            Error::PayloadTooLarge { .. } => 413,
            Error::NotInitialized => 500,
            Error::StoreUnavailable { .. } => 500,
            Error::Connection { .. } => 500,
            Error::ConstraintViolation { .. } => 500,
            Error::Database { .. } => 500,
            Error::Io { .. } => 500,
            Error::PartialFailure { .. } => 500,
            Error::Internal(_) => 500,
        }
    }

    /// Stable machine-readable code for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::InvalidId(_) => "INVALID_ID",
            Error::NotFound { .. } => "NOT_FOUND",
            Error::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            Error::NotInitialized
            | Error::StoreUnavailable { .. }
            | Error::Connection { .. } => "STORE_UNAVAILABLE",
            Error::ConstraintViolation { .. }
            | Error::Database { .. }
            | Error::Io { .. }
            | Error::PartialFailure { .. }
            | Error::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to show to a client.
    pub fn public_message(&self) -> String {
        match self {
            Error::Validation(msg) => msg.clone(),
            Error::InvalidId(_) => "Invalid photo id".into(),
            Error::NotFound { entity, .. } => format!("{entity} not found"),
            Error::PayloadTooLarge { limit } => {
                format!("Uploaded file exceeds the {limit} byte limit")
            }
            Error::NotInitialized
            | Error::StoreUnavailable { .. }
            | Error::Connection { .. } => "Storage is temporarily unavailable".into(),
            _ => "Internal server error".into(),
        }
    }

    /// True for [`Error::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Database`].
    pub fn database(source: impl Into<BoxError>) -> Self {
        Error::Database {
            source: source.into(),
        }
    }

    /// Convenience constructor for [`Error::StoreUnavailable`].
    pub fn unavailable(source: impl Into<BoxError>) -> Self {
        Error::StoreUnavailable {
            source: source.into(),
        }
    }

    /// Convenience constructor for [`Error::ConstraintViolation`].
    pub fn constraint(source: impl Into<BoxError>) -> Self {
        Error::ConstraintViolation {
            source: source.into(),
        }
    }

    /// Convenience constructor for [`Error::PartialFailure`].
    pub fn partial(action: impl Into<String>, source: Error) -> Self {
        Error::PartialFailure {
            action: action.into(),
            source: Box::new(source),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
