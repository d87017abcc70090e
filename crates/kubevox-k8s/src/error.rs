//! Control-plane error type and its mapping onto the execution taxonomy.

use thiserror::Error;

use kubevox_contracts::failure::ExecutionFailure;

#[derive(Debug, Error)]
pub enum ClusterError {
    /// The kubeconfig is missing, unreadable, or incomplete.
    #[error("kubeconfig error: {reason}")]
    Kubeconfig { reason: String },

    #[error("context '{name}' not found in kubeconfig")]
    ContextNotFound { name: String },

    /// A resource name that is not a valid Kubernetes object name.
    #[error("'{value}' is not a valid {kind} name")]
    InvalidName { kind: &'static str, value: String },

    #[error("cannot reach the API server: {reason}")]
    Unreachable { reason: String },

    #[error("request timed out after {after_ms} ms")]
    Timeout { after_ms: u64 },

    /// The API server answered with a non-success status.
    #[error("{message} (HTTP {status})")]
    Api { status: u16, message: String },

    #[error("unexpected response: {reason}")]
    Decode { reason: String },

    /// An argument the descriptor guarantees was not bound.
    #[error("argument '{name}' was not bound")]
    MissingArgument { name: &'static str },
}

impl From<ClusterError> for ExecutionFailure {
    fn from(err: ClusterError) -> Self {
        match err {
            ClusterError::Unreachable { reason } => ExecutionFailure::Unreachable { reason },
            ClusterError::Timeout { after_ms } => ExecutionFailure::Timeout { after_ms },
            ClusterError::Api { status, message } if status == 401 || status == 403 => {
                ExecutionFailure::PermissionDenied { reason: message }
            }
            ClusterError::Api {
                status: 404,
                message,
            } => ExecutionFailure::NotFound { reason: message },
            e @ (ClusterError::ContextNotFound { .. } | ClusterError::InvalidName { .. }) => {
                ExecutionFailure::NotFound {
                    reason: e.to_string(),
                }
            }
            e => ExecutionFailure::Unknown {
                reason: e.to_string(),
            },
        }
    }
}
