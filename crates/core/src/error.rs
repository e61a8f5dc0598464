//! Error taxonomy shared by every aura crate.
//!
//! Adapter crates define their own `thiserror` enums and convert into
//! [`CoreError`] at the boundary. [`ErrorReport`] is the structured payload
//! (kind, message, help text, detail map) handed to callers and logs.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unreachable: {0}")]
    Unreachable(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Partial failure: {0}")]
    Partial(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of a [`CoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    Validation,
    Unreachable,
    Unauthorized,
    NotFound,
    Conflict,
    Persistence,
    Partial,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Unreachable => "unreachable",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Persistence => "persistence",
            ErrorKind::Partial => "partial",
            ErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::NotFound { .. } => ErrorKind::NotFound,
            CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::Unreachable(_) => ErrorKind::Unreachable,
            CoreError::Unauthorized(_) => ErrorKind::Unauthorized,
            CoreError::Conflict(_) => ErrorKind::Conflict,
            CoreError::Persistence(_) => ErrorKind::Persistence,
            CoreError::Partial(_) => ErrorKind::Partial,
            CoreError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether the same call may succeed on a later attempt (next tick,
    /// next reconnect).
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Unreachable)
    }

    /// Operator-facing hint for resolving the error.
    pub fn help(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Validation => "Check the configuration file or request body for malformed values.",
            ErrorKind::Unreachable => {
                "Check that the remote service is running and reachable from this host."
            }
            ErrorKind::Unauthorized => "Check that the configured token is valid and not expired.",
            ErrorKind::NotFound => {
                "The item or poster set may have been deleted; refresh and try again."
            }
            ErrorKind::Conflict => {
                "The media item changed identity on the server; re-select it in the library."
            }
            ErrorKind::Persistence => "Check disk space and permissions on the database file.",
            ErrorKind::Partial => "Some files failed; see the per-file details.",
            ErrorKind::Internal => "Check the logs for details.",
        }
    }

    /// Build the structured report for this error.
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            message: self.to_string(),
            help: self.help().to_string(),
            detail: BTreeMap::new(),
        }
    }
}

/// Structured error payload: kind, message, help text and a detail map.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
    pub help: String,
    pub detail: BTreeMap<String, String>,
}

impl ErrorReport {
    /// Attach a key/value pair to the detail map.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.detail.insert(key.into(), value.to_string());
        self
    }
}

impl From<&CoreError> for ErrorReport {
    fn from(err: &CoreError) -> Self {
        err.report()
    }
}
