//! Runtime error types for the KubeVox pipeline.
//!
//! `KubevoxError` covers start-up and infrastructure faults: catalog
//! authoring defects, collaborator failures, configuration problems.
//! Per-request validation and execution failures are NOT errors; they are
//! outcomes carried inside `InvocationResult` (see `failure`).

use thiserror::Error;

/// The unified error type for the KubeVox crates.
#[derive(Debug, Error)]
pub enum KubevoxError {
    /// An operation with this name is already in the catalog.
    #[error("operation '{name}' is already registered")]
    DuplicateOperation { name: String },

    /// A response template is malformed or names a value that will not
    /// exist at render time.
    #[error("invalid response template for '{operation}': {reason}")]
    InvalidTemplate { operation: String, reason: String },

    /// A parameter declaration is inconsistent (duplicate name, bad default).
    #[error("invalid parameter '{parameter}' on '{operation}': {reason}")]
    InvalidParameter {
        operation: String,
        parameter: String,
        reason: String,
    },

    /// Lookup of an operation that is not in the catalog.
    #[error("operation '{name}' not found")]
    NotFound { name: String },

    /// A placeholder could not be filled at render time. This indicates a
    /// catalog defect that registration should have rejected.
    #[error(
        "template resolution failed for '{operation}': \
         no value for placeholder '{placeholder}'"
    )]
    TemplateResolution {
        operation: String,
        placeholder: String,
    },

    /// The language-model backend failed or returned something unusable.
    #[error("language model error: {reason}")]
    Model { reason: String },

    /// Speech-to-text failed.
    #[error("transcription error: {reason}")]
    Transcription { reason: String },

    /// Text-to-speech failed.
    #[error("speech synthesis error: {reason}")]
    Speech { reason: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// Another utterance is still being processed.
    #[error("pipeline busy: an utterance is already in flight")]
    Busy,
}

/// Convenience alias used throughout the KubeVox crates.
pub type KubevoxResult<T> = Result<T, KubevoxError>;
