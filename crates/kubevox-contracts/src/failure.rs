//! Per-request failure taxonomy.
//!
//! These are not `Err` values: a failed dispatch is an ordinary
//! `InvocationResult` outcome that the orchestrator renders back to the
//! user. Each failure carries a human-readable `Display` and a stable
//! machine `tag()`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The proposed call could not be bound to a known, well-typed operation.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationFailure {
    /// The model named an operation that is not in the catalog.
    #[error("unknown operation '{name}'")]
    UnknownOperation { name: String },

    /// A required parameter was absent from the arguments.
    #[error("missing required parameter '{parameter}'")]
    MissingParameter { parameter: String },

    /// A value could not be coerced to the declared parameter type.
    #[error("parameter '{parameter}' expected {expected}, got {actual}")]
    TypeMismatch {
        parameter: String,
        expected: String,
        actual: String,
    },

    /// The argument payload was not a JSON object.
    #[error("malformed arguments: {reason}")]
    MalformedArguments { reason: String },
}

impl ValidationFailure {
    pub fn tag(&self) -> &'static str {
        match self {
            ValidationFailure::UnknownOperation { .. } => "unknown_operation",
            ValidationFailure::MissingParameter { .. } => "missing_parameter",
            ValidationFailure::TypeMismatch { .. } => "type_mismatch",
            ValidationFailure::MalformedArguments { .. } => "malformed_arguments",
        }
    }
}

/// The operation was valid but the cluster call failed.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionFailure {
    #[error("cluster unreachable: {reason}")]
    Unreachable { reason: String },

    #[error("permission denied: {reason}")]
    PermissionDenied { reason: String },

    #[error("not found: {reason}")]
    NotFound { reason: String },

    #[error("timed out after {after_ms} ms")]
    Timeout { after_ms: u64 },

    #[error("{reason}")]
    Unknown { reason: String },
}

impl ExecutionFailure {
    pub fn tag(&self) -> &'static str {
        match self {
            ExecutionFailure::Unreachable { .. } => "unreachable",
            ExecutionFailure::PermissionDenied { .. } => "permission_denied",
            ExecutionFailure::NotFound { .. } => "not_found",
            ExecutionFailure::Timeout { .. } => "timeout",
            ExecutionFailure::Unknown { .. } => "unknown",
        }
    }

    pub fn unknown(reason: impl Into<String>) -> Self {
        ExecutionFailure::Unknown {
            reason: reason.into(),
        }
    }
}

/// Either side of the taxonomy, as exposed by `InvocationResult::error_detail`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureDetail<'a> {
    Validation(&'a ValidationFailure),
    Execution(&'a ExecutionFailure),
}

impl FailureDetail<'_> {
    /// Machine tag, e.g. `missing_parameter` or `permission_denied`.
    pub fn tag(&self) -> &'static str {
        match self {
            FailureDetail::Validation(v) => v.tag(),
            FailureDetail::Execution(e) => e.tag(),
        }
    }

    /// Human-readable summary suitable for speaking back to the user.
    pub fn summary(&self) -> String {
        match self {
            FailureDetail::Validation(v) => v.to_string(),
            FailureDetail::Execution(e) => e.to_string(),
        }
    }
}
