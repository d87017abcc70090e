//! Invocation requests and results.
//!
//! `InvocationRequest` is the model's proposed call, untyped at the
//! boundary. `InvocationResult` is what the dispatcher hands back to the
//! orchestrator after exactly one dispatch attempt.

use serde::{Deserialize, Serialize};

use crate::{
    failure::{ExecutionFailure, FailureDetail, ValidationFailure},
    operation::ParamValue,
};

/// Result fields returned by an invoker adapter, keyed by field name.
pub type ResultFields = serde_json::Map<String, serde_json::Value>;

/// Unique identifier for one dispatch attempt, carried through every log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub uuid::Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A function call proposed by the language model.
///
/// `arguments` is kept as raw JSON: the model usually emits an object, but
/// nothing here is trusted until the dispatcher has validated it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationRequest {
    pub operation_name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

impl InvocationRequest {
    pub fn new(operation_name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            operation_name: operation_name.into(),
            arguments,
        }
    }

    /// A request with an empty argument object.
    pub fn without_arguments(operation_name: impl Into<String>) -> Self {
        Self::new(operation_name, serde_json::Value::Object(Default::default()))
    }
}

/// The fully validated, typed argument set for one invocation.
///
/// Entries follow the descriptor's declaration order. Optional parameters
/// with no default and no supplied value are simply absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundArguments {
    entries: Vec<(String, ParamValue)>,
}

impl BoundArguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a bound value. Used by the dispatcher while binding.
    pub fn bind(&mut self, name: impl Into<String>, value: ParamValue) {
        self.entries.push((name.into(), value));
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ParamValue::as_str)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(ParamValue::as_i64)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(ParamValue::as_bool)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Coarse status of a dispatch, mirroring the variants of `Outcome`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvocationStatus {
    Success,
    ValidationFailed,
    ExecutionFailed,
}

/// What happened to one invocation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// The adapter ran and returned these result fields.
    Success { fields: ResultFields },
    /// The request never reached an adapter.
    ValidationFailed { failure: ValidationFailure },
    /// The adapter ran (or was started) and failed.
    ExecutionFailed { failure: ExecutionFailure },
}

/// The outcome of a single dispatch, consumed within one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationResult {
    pub request_id: RequestId,
    /// The operation name as proposed (may not exist in the catalog).
    pub operation: String,
    /// Carried from the descriptor; false when the operation is unknown.
    pub mutating: bool,
    /// Bound arguments, empty when validation failed.
    pub arguments: BoundArguments,
    pub outcome: Outcome,
}

impl InvocationResult {
    pub fn status(&self) -> InvocationStatus {
        match self.outcome {
            Outcome::Success { .. } => InvocationStatus::Success,
            Outcome::ValidationFailed { .. } => InvocationStatus::ValidationFailed,
            Outcome::ExecutionFailed { .. } => InvocationStatus::ExecutionFailed,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success { .. })
    }

    /// Result fields, present only on success.
    pub fn fields(&self) -> Option<&ResultFields> {
        match &self.outcome {
            Outcome::Success { fields } => Some(fields),
            _ => None,
        }
    }

    /// Failure detail, present only on failure.
    pub fn error_detail(&self) -> Option<FailureDetail<'_>> {
        match &self.outcome {
            Outcome::Success { .. } => None,
            Outcome::ValidationFailed { failure } => Some(FailureDetail::Validation(failure)),
            Outcome::ExecutionFailed { failure } => Some(FailureDetail::Execution(failure)),
        }
    }
}
