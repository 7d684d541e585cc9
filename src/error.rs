//! Error taxonomy shared by the workflows and the HTTP layer.
//!
//! Every failure carries a machine-readable [`ErrorKind`] so the router can
//! map it to a status code without inspecting message text.

use thiserror::Error;

use crate::ingest::UploadFailure;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, ReaderError>;

#[derive(Error, Debug)]
pub enum ReaderError {
    /// Bad filename, unsupported extension, missing field.
    #[error("{0}")]
    Validation(String),

    /// Document, paragraph, or note does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Duplicate filename, or a note already exists for the paragraph.
    #[error("{0}")]
    Conflict(String),

    /// Parsing or LLM service failure, including missing credentials.
    #[error("{0}")]
    Service(String),

    /// Missing or wrong `x-token` on credential endpoints.
    #[error("{0}")]
    Unauthorized(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),

    /// Every file of an upload batch failed, for more than one reason.
    #[error("{message}")]
    BatchRejected {
        message: String,
        failures: Vec<UploadFailure>,
    },
}

/// Coarse error classification exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Service,
    Unauthorized,
    Internal,
}

impl ErrorKind {
    /// Wire code used in JSON error bodies.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Validation => "bad_request",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Service => "service_error",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Internal => "internal",
        }
    }
}

impl ReaderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReaderError::Validation(_) | ReaderError::BatchRejected { .. } => {
                ErrorKind::Validation
            }
            ReaderError::NotFound(_) => ErrorKind::NotFound,
            ReaderError::Conflict(_) => ErrorKind::Conflict,
            ReaderError::Service(_) => ErrorKind::Service,
            ReaderError::Unauthorized(_) => ErrorKind::Unauthorized,
            ReaderError::Database(_) | ReaderError::Io(_) | ReaderError::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Build a message-only error of the given kind.
    pub fn with_kind(kind: ErrorKind, message: String) -> Self {
        match kind {
            ErrorKind::Validation => ReaderError::Validation(message),
            ErrorKind::NotFound => ReaderError::NotFound(message),
            ErrorKind::Conflict => ReaderError::Conflict(message),
            ErrorKind::Service => ReaderError::Service(message),
            ErrorKind::Unauthorized => ReaderError::Unauthorized(message),
            ErrorKind::Internal => ReaderError::Internal(message),
        }
    }

    /// Per-file failures carried by a rejected batch.
    pub fn failures(&self) -> &[UploadFailure] {
        match self {
            ReaderError::BatchRejected { failures, .. } => failures,
            _ => &[],
        }
    }
}

impl From<reqwest::Error> for ReaderError {
    fn from(e: reqwest::Error) -> Self {
        ReaderError::Service(e.to_string())
    }
}

impl From<serde_json::Error> for ReaderError {
    fn from(e: serde_json::Error) -> Self {
        ReaderError::Internal(format!("serialization: {}", e))
    }
}

/// True when a database error is a UNIQUE constraint violation.
///
/// Used to turn races on filename or note-per-paragraph into conflicts.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}
